// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delivery options and MQTT v5 properties.
//!
//! Property structs mirror what the operator can fill in. Every field is
//! optional; the `stripped` methods drop unset values (and empty strings or
//! maps) so that only meaningful properties reach the transport.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// MQTT quality of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce,
    /// Acknowledged delivery.
    AtLeastOnce,
    /// Assured single delivery.
    ExactlyOnce,
}

impl QoS {
    /// Returns the QoS for a wire level, if valid.
    #[must_use]
    pub const fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    /// Returns the wire level.
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("invalid QoS level: {level}"))
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos.level()
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// MQTT v5 user properties.
pub type UserProperties = BTreeMap<String, String>;

fn strip_user_properties(props: Option<&UserProperties>) -> Option<UserProperties> {
    let kept: UserProperties = props?
        .iter()
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (!kept.is_empty()).then_some(kept)
}

fn strip_text(text: Option<&String>) -> Option<String> {
    text.filter(|t| !t.is_empty()).cloned()
}

/// Options for a subscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscribeOptions {
    /// Maximum QoS the subscriber accepts.
    pub qos: QoS,
    /// Do not receive own publications (v5).
    #[serde(rename = "nl", default, skip_serializing_if = "Option::is_none")]
    pub no_local: Option<bool>,
    /// Keep the retain flag as published (v5).
    #[serde(rename = "rap", default, skip_serializing_if = "Option::is_none")]
    pub retain_as_published: Option<bool>,
    /// When retained messages are sent (v5, 0 to 2).
    #[serde(rename = "rh", default, skip_serializing_if = "Option::is_none")]
    pub retain_handling: Option<u8>,
}

impl SubscribeOptions {
    /// Creates options with the given QoS.
    #[must_use]
    pub fn with_qos(qos: QoS) -> Self {
        Self {
            qos,
            ..Self::default()
        }
    }
}

/// MQTT v5 publish properties.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishProperties {
    /// Payload is UTF-8.
    pub payload_format_indicator: Option<bool>,
    /// Seconds before the broker discards the message.
    pub message_expiry_interval: Option<u32>,
    /// Topic alias to use instead of (or to register for) the topic.
    pub topic_alias: Option<u16>,
    /// Topic for a response.
    pub response_topic: Option<String>,
    /// Correlation data for request/response.
    pub correlation_data: Option<String>,
    /// Application properties.
    pub user_properties: Option<UserProperties>,
    /// Subscription identifier.
    pub subscription_identifier: Option<u32>,
    /// MIME type of the payload.
    pub content_type: Option<String>,
}

impl PublishProperties {
    /// Returns a copy without unset values, or `None` if nothing is set.
    #[must_use]
    pub fn stripped(&self) -> Option<Self> {
        let stripped = Self {
            payload_format_indicator: self.payload_format_indicator,
            message_expiry_interval: self.message_expiry_interval,
            topic_alias: self.topic_alias,
            response_topic: strip_text(self.response_topic.as_ref()),
            correlation_data: strip_text(self.correlation_data.as_ref()),
            user_properties: strip_user_properties(self.user_properties.as_ref()),
            subscription_identifier: self.subscription_identifier,
            content_type: strip_text(self.content_type.as_ref()),
        };
        (stripped != Self::default()).then_some(stripped)
    }
}

/// Options for a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    /// Delivery QoS.
    pub qos: QoS,
    /// Ask the broker to retain the message.
    pub retain: bool,
    /// MQTT v5 properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<PublishProperties>,
}

impl PublishOptions {
    /// Creates publish options.
    #[must_use]
    pub fn new(qos: QoS, retain: bool) -> Self {
        Self {
            qos,
            retain,
            properties: None,
        }
    }

    /// Sets the v5 properties.
    #[must_use]
    pub fn with_properties(mut self, properties: PublishProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Returns a copy with unset properties removed.
    #[must_use]
    pub fn stripped(&self) -> Self {
        Self {
            qos: self.qos,
            retain: self.retain,
            properties: self.properties.as_ref().and_then(PublishProperties::stripped),
        }
    }

    /// Returns the topic alias, if one is set.
    #[must_use]
    pub fn topic_alias(&self) -> Option<u16> {
        self.properties.as_ref().and_then(|p| p.topic_alias)
    }
}

/// MQTT v5 connect properties.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectProperties {
    /// Seconds the session outlives the connection.
    pub session_expiry_interval: Option<u32>,
    /// Maximum concurrent QoS 1/2 publications the client accepts.
    pub receive_maximum: Option<u16>,
    /// Largest packet the client accepts.
    pub maximum_packet_size: Option<u32>,
    /// Highest topic alias the client accepts.
    pub topic_alias_maximum: Option<u16>,
    /// Ask the broker for response information.
    pub request_response_information: Option<bool>,
    /// Ask the broker for reason strings and user properties on failures.
    pub request_problem_information: Option<bool>,
    /// Application properties.
    pub user_properties: Option<UserProperties>,
    /// Extended authentication method.
    pub authentication_method: Option<String>,
    /// Extended authentication data.
    pub authentication_data: Option<String>,
}

impl ConnectProperties {
    /// Returns a copy without unset values, or `None` if nothing is set.
    #[must_use]
    pub fn stripped(&self) -> Option<Self> {
        let stripped = Self {
            session_expiry_interval: self.session_expiry_interval,
            receive_maximum: self.receive_maximum,
            maximum_packet_size: self.maximum_packet_size,
            topic_alias_maximum: self.topic_alias_maximum,
            request_response_information: self.request_response_information,
            request_problem_information: self.request_problem_information,
            user_properties: strip_user_properties(self.user_properties.as_ref()),
            authentication_method: strip_text(self.authentication_method.as_ref()),
            authentication_data: strip_text(self.authentication_data.as_ref()),
        };
        (stripped != Self::default()).then_some(stripped)
    }
}

/// MQTT v5 last-will properties.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WillProperties {
    /// Payload is UTF-8.
    pub payload_format_indicator: Option<bool>,
    /// Seconds the broker waits before publishing the will.
    pub will_delay_interval: Option<u32>,
    /// Seconds before the broker discards the will message.
    pub message_expiry_interval: Option<u32>,
    /// MIME type of the payload.
    pub content_type: Option<String>,
    /// Topic for a response.
    pub response_topic: Option<String>,
    /// Correlation data for request/response.
    pub correlation_data: Option<String>,
    /// Application properties.
    pub user_properties: Option<UserProperties>,
}

impl WillProperties {
    /// Returns a copy without unset values, or `None` if nothing is set.
    #[must_use]
    pub fn stripped(&self) -> Option<Self> {
        let stripped = Self {
            payload_format_indicator: self.payload_format_indicator,
            will_delay_interval: self.will_delay_interval,
            message_expiry_interval: self.message_expiry_interval,
            content_type: strip_text(self.content_type.as_ref()),
            response_topic: strip_text(self.response_topic.as_ref()),
            correlation_data: strip_text(self.correlation_data.as_ref()),
            user_properties: strip_user_properties(self.user_properties.as_ref()),
        };
        (stripped != Self::default()).then_some(stripped)
    }
}
