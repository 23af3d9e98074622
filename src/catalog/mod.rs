// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Suggested topics.
//!
//! The platform defines a fixed set of topics per thing (shadow get/update,
//! direct methods, NTP, presence, ...). Templates carry a `{thingId}`
//! placeholder and are flagged for the roles that use them. Thing-role
//! profiles start out with the suggested subscriptions of their thing.
//!
//! # Examples
//!
//! ```
//! use tio_console::catalog::TopicCatalog;
//! use tio_console::config::Role;
//!
//! let catalog = TopicCatalog::builtin();
//! let subs = catalog.suggested_for_thing("pump-7");
//!
//! assert!(subs.iter().any(|s| s.topic == "$iothub/things/pump-7/shadows/name/default/update/delta"));
//! assert!(catalog.subscribe_topics(Role::Server).iter().all(|t| t.for_server));
//! ```

mod templates;

use crate::config::{QoS, Role, SubscribeOptions, Subscription};
use crate::payload::RenderMode;

/// Placeholder replaced by the thing id.
const THING_ID: &str = "{thingId}";

/// A topic with a `{thingId}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTemplate {
    /// Display name.
    pub name: &'static str,
    /// Group shown in suggestion lists.
    pub group: Option<&'static str>,
    /// Topic pattern.
    pub pattern: &'static str,
    /// Offered to thing-role sessions.
    pub for_thing: bool,
    /// Offered to server-role sessions.
    pub for_server: bool,
    /// Subscribed by default on new thing-role profiles.
    pub suggested: bool,
}

impl TopicTemplate {
    /// Returns the topic for a thing.
    #[must_use]
    pub fn resolve(&self, thing_id: &str) -> String {
        self.pattern.replace(THING_ID, thing_id)
    }

    /// Kept QoS 0 subscription to this topic for a thing.
    #[must_use]
    pub fn subscription(&self, thing_id: &str) -> Subscription {
        Subscription::new(self.resolve(thing_id), SubscribeOptions::with_qos(QoS::AtMostOnce))
            .with_name(self.name)
    }

    /// Returns `true` if sessions with this role are offered the topic.
    #[must_use]
    pub fn available_to(&self, role: Role) -> bool {
        match role {
            Role::Thing => self.for_thing,
            Role::Server => self.for_server,
        }
    }
}

/// A publishable topic with an example payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTemplate {
    /// Topic.
    pub topic: TopicTemplate,
    /// How the example payload is written.
    pub payload_type: RenderMode,
    payload: &'static str,
}

impl PublishTemplate {
    /// Returns the example payload for a thing.
    ///
    /// `{now}` becomes `now_ms` and `{token}` a fresh client token.
    #[must_use]
    pub fn payload(&self, thing_id: &str, now_ms: i64) -> String {
        self.payload
            .replace(THING_ID, thing_id)
            .replace("{now}", &now_ms.to_string())
            .replace("{token}", &uuid::Uuid::new_v4().simple().to_string())
    }
}

/// Role-scoped suggested topics.
#[derive(Debug, Clone)]
pub struct TopicCatalog {
    subscribe: Vec<TopicTemplate>,
    publish: Vec<PublishTemplate>,
}

impl Default for TopicCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TopicCatalog {
    /// Returns the platform's built-in catalog.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(
            templates::SUBSCRIBE_TEMPLATES.to_vec(),
            templates::PUBLISH_TEMPLATES.to_vec(),
        )
    }

    /// Creates a catalog from custom templates.
    #[must_use]
    pub fn new(subscribe: Vec<TopicTemplate>, publish: Vec<PublishTemplate>) -> Self {
        Self { subscribe, publish }
    }

    /// Returns an empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Subscribe templates offered to `role`.
    #[must_use]
    pub fn subscribe_topics(&self, role: Role) -> Vec<&TopicTemplate> {
        self.subscribe.iter().filter(|t| t.available_to(role)).collect()
    }

    /// Publish templates offered to `role`.
    #[must_use]
    pub fn publish_topics(&self, role: Role) -> Vec<&PublishTemplate> {
        self.publish
            .iter()
            .filter(|t| t.topic.available_to(role))
            .collect()
    }

    /// Default subscriptions for a new thing-role profile.
    ///
    /// Every entry is kept, uses QoS 0 and has a fresh id.
    #[must_use]
    pub fn suggested_for_thing(&self, thing_id: &str) -> Vec<Subscription> {
        self.subscribe
            .iter()
            .filter(|t| t.for_thing && t.suggested)
            .map(|t| t.subscription(thing_id))
            .collect()
    }

    /// Finds the subscribe template that resolves to `topic` for a thing.
    #[must_use]
    pub fn lookup(&self, thing_id: &str, topic: &str) -> Option<&TopicTemplate> {
        self.subscribe.iter().find(|t| t.resolve(thing_id) == topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_topics_for_thing() {
        let subs = TopicCatalog::builtin().suggested_for_thing("t1");
        let topics: Vec<&str> = subs.iter().map(|s| s.topic.as_str()).collect();

        assert_eq!(
            topics,
            vec![
                "$iothub/things/t1/methods/+/req",
                "$iothub/things/t1/shadows/name/default/get/accepted",
                "$iothub/things/t1/shadows/name/default/get/rejected",
                "$iothub/things/t1/shadows/name/default/update/accepted",
                "$iothub/things/t1/shadows/name/default/update/rejected",
                "$iothub/things/t1/shadows/name/default/update/documents",
                "$iothub/things/t1/shadows/name/default/update/delta",
            ]
        );
        assert!(subs.iter().all(|s| s.keep && s.opts.qos == QoS::AtMostOnce));
        assert_eq!(subs[0].name.as_deref(), Some("Direct Method Request"));
    }

    #[test]
    fn role_filters() {
        let catalog = TopicCatalog::builtin();
        let server: Vec<&str> = catalog
            .subscribe_topics(Role::Server)
            .iter()
            .map(|t| t.name)
            .collect();
        assert!(server.contains(&"Presence"));
        assert!(server.contains(&"Update Documents Notify"));
        assert!(!server.contains(&"Update Delta Notify"));

        let thing_pub: Vec<&str> = catalog
            .publish_topics(Role::Thing)
            .iter()
            .map(|t| t.topic.name)
            .collect();
        assert!(thing_pub.contains(&"Update Shadow"));
        assert!(!thing_pub.contains(&"OTA Task"));
    }

    #[test]
    fn lookup_resolves_topic() {
        let catalog = TopicCatalog::builtin();
        let template = catalog
            .lookup("t1", "$iothub/things/t1/shadows/name/default/get/accepted")
            .unwrap();
        assert_eq!(template.name, "Get Accepted");
        assert_eq!(template.group, Some("Get Shadow"));
        assert!(catalog.lookup("t1", "devices/42/status").is_none());
    }

    #[test]
    fn payload_placeholders() {
        let catalog = TopicCatalog::builtin();
        let ntp = catalog
            .publish_topics(Role::Thing)
            .into_iter()
            .find(|t| t.topic.name == "Request NTP")
            .unwrap();
        let payload = ntp.payload("t1", 42);
        assert_eq!(payload, r#"{"clientSendTime":42}"#);
        assert!(serde_json::from_str::<serde_json::Value>(&payload).is_ok());
        assert_eq!(ntp.payload_type, RenderMode::Json);
    }

    #[test]
    fn every_builtin_payload_is_json() {
        for template in TopicCatalog::builtin().publish {
            let payload = template.payload("t1", 1);
            assert!(
                serde_json::from_str::<serde_json::Value>(&payload).is_ok(),
                "{}: {payload}",
                template.topic.name
            );
        }
    }

    #[test]
    fn empty_catalog_suggests_nothing() {
        assert!(TopicCatalog::empty().suggested_for_thing("t").is_empty());
    }
}
