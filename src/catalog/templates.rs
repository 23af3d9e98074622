// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in topic templates of the platform.

use super::{PublishTemplate, TopicTemplate};
use crate::payload::RenderMode;

const fn sub(
    group: &'static str,
    name: &'static str,
    pattern: &'static str,
    for_thing: bool,
    for_server: bool,
    suggested: bool,
) -> TopicTemplate {
    TopicTemplate {
        name,
        group: Some(group),
        pattern,
        for_thing,
        for_server,
        suggested,
    }
}

const fn publish(
    name: &'static str,
    pattern: &'static str,
    for_thing: bool,
    for_server: bool,
    payload: &'static str,
) -> PublishTemplate {
    PublishTemplate {
        topic: TopicTemplate {
            name,
            group: None,
            pattern,
            for_thing,
            for_server,
            suggested: false,
        },
        payload_type: RenderMode::Json,
        payload,
    }
}

pub(super) const SUBSCRIBE_TEMPLATES: &[TopicTemplate] = &[
    sub("Common", "Property Reported", "$iothub/things/{thingId}/property", false, true, false),
    sub("Common", "Thing's Will", "$iothub/things/{thingId}/will/#", false, true, false),
    sub("Common", "Presence", "$iothub/things/{thingId}/presence", false, true, false),
    sub("Common", "Custom Topic", "$iothub/user/things/{thingId}/#", false, true, false),
    sub("NTP", "Request NTP", "$iothub/things/{thingId}/req", false, true, false),
    sub("NTP", "Response NTP", "$iothub/things/{thingId}/ntp/resp", true, false, false),
    sub("Direct Method", "Direct Method Request", "$iothub/things/{thingId}/methods/+/req", true, false, true),
    sub("Direct Method", "Direct Method Response", "$iothub/things/{thingId}/methods/+/resp", false, true, false),
    sub("Get Shadow", "Get Accepted", "$iothub/things/{thingId}/shadows/name/default/get/accepted", true, false, true),
    sub("Get Shadow", "Get Rejected", "$iothub/things/{thingId}/shadows/name/default/get/rejected", true, false, true),
    sub("Update Shadow", "Update Accepted", "$iothub/things/{thingId}/shadows/name/default/update/accepted", true, false, true),
    sub("Update Shadow", "Update Rejected", "$iothub/things/{thingId}/shadows/name/default/update/rejected", true, false, true),
    sub("Update Shadow", "Update Documents Notify", "$iothub/things/{thingId}/shadows/name/default/update/documents", true, true, true),
    sub("Update Shadow", "Update Delta Notify", "$iothub/things/{thingId}/shadows/name/default/update/delta", true, false, true),
];

pub(super) const PUBLISH_TEMPLATES: &[PublishTemplate] = &[
    publish("Get Shadow", "$iothub/things/{thingId}/shadows/name/default/get", true, false, "{}"),
    publish(
        "Update Shadow",
        "$iothub/things/{thingId}/shadows/name/default/update",
        true,
        false,
        r#"{"state":{"reported":{}},"clientToken":"{token}","version":0}"#,
    ),
    publish("Report Property", "$iothub/things/{thingId}/messages/property", true, false, "{}"),
    publish("Set Will", "$iothub/things/{thingId}/messages/will/#", true, false, "{}"),
    publish(
        "Presence",
        "$iothub/things/{thingId}/presence",
        false,
        true,
        r#"{"thingId":"{thingId}","timestamp":{now},"eventType":"connected","disconnectReason":"","remoteAddr":"<ip:port>"}"#,
    ),
    publish("Request NTP", "$iothub/things/{thingId}/req", true, false, r#"{"clientSendTime":{now}}"#),
    publish(
        "Response NTP",
        "$iothub/things/{thingId}/resp",
        false,
        true,
        r#"{"clientSendTime":{now},"serverRecvTime":{now},"serverSendTime":{now}}"#,
    ),
    publish(
        "OTA Task",
        "$iothub/things/{thingId}/ota/task",
        false,
        true,
        r#"{"clientToken":"{token}","taskId":"","type":"app","meta":{"version":"","md5":"","content-type":"application/octet-stream","content-length":0},"fileUrl":"http://"}"#,
    ),
    publish(
        "OTA Task Result",
        "$iothub/things/{thingId}/ota/task",
        true,
        false,
        r#"{"clientToken":"","taskId":"","status":"ongoing","progress":0,"timestamp":{now}}"#,
    ),
    publish("Custom Message", "$iothub/user/things/{thingId}/#", true, true, "{}"),
    publish(
        "Request Direct Method",
        "$iothub/things/{thingId}/methods/+/req",
        false,
        true,
        r#"{"clientToken":"{token}","data":{}}"#,
    ),
    publish(
        "Response Direct Method",
        "$iothub/things/{thingId}/methods/+/resp",
        true,
        false,
        r#"{"clientToken":"","code":200,"message":"OK","data":{}}"#,
    ),
];
