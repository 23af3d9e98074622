// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ConnectProperties, QoS, SubscribeOptions, Subscription, WillProperties};
use crate::event::{ConnectionId, ThingScope};

/// Who a session acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The session authenticates as a single thing; its username is the
    /// thing id.
    #[default]
    Thing,
    /// The session is a back-end observer of many things.
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thing => f.write_str("thing"),
            Self::Server => f.write_str("server"),
        }
    }
}

/// Transport scheme of the broker URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain TCP.
    Mqtt,
    /// TCP with TLS.
    Mqtts,
    /// WebSocket.
    Ws,
    /// WebSocket with TLS.
    Wss,
}

impl Protocol {
    /// Returns the URL scheme.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Mqtt => "mqtt",
            Self::Mqtts => "mqtts",
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }

    /// Returns `true` for WebSocket schemes.
    #[must_use]
    pub const fn is_websocket(self) -> bool {
        matches!(self, Self::Ws | Self::Wss)
    }

    /// Returns `true` for schemes that run over TLS.
    #[must_use]
    pub const fn is_secure(self) -> bool {
        matches!(self, Self::Mqtts | Self::Wss)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// MQTT protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MqttVersion {
    /// MQTT 3.1.1 (protocol level 4).
    #[serde(rename = "3.1.1")]
    V311,
    /// MQTT 5.0.
    #[default]
    #[serde(rename = "5.0")]
    V5,
}

impl MqttVersion {
    /// Returns the protocol level sent in CONNECT.
    #[must_use]
    pub const fn protocol_level(self) -> u8 {
        match self {
            Self::V311 => 4,
            Self::V5 => 5,
        }
    }
}

/// Where TLS trust material comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertType {
    /// Platform trust store.
    #[default]
    #[serde(rename = "")]
    Default,
    /// Server certificate signed by a public CA.
    Server,
    /// CA, client certificate and key supplied with the profile.
    #[serde(rename = "self")]
    SelfSigned,
}

/// TLS settings of a profile.
///
/// Certificates and keys are PEM text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsOptions {
    /// Use TLS.
    pub ssl: bool,
    /// Trust source.
    pub cert_type: CertType,
    /// Verify the broker certificate.
    pub reject_unauthorized: bool,
    /// CA certificate.
    pub ca: String,
    /// Client certificate.
    pub cert: String,
    /// Client private key.
    pub key: String,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            ssl: false,
            cert_type: CertType::Default,
            reject_unauthorized: true,
            ca: String::new(),
            cert: String::new(),
            key: String::new(),
        }
    }
}

/// Last-will clause.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WillConfig {
    /// Will topic; an empty topic disables the will.
    pub last_will_topic: String,
    /// Will payload.
    pub last_will_payload: String,
    /// Will QoS.
    pub last_will_qos: QoS,
    /// Retain the will message.
    pub last_will_retain: bool,
    /// MQTT v5 will properties.
    pub properties: Option<WillProperties>,
}

/// Publish options last used on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishDefaults {
    /// Last used QoS.
    pub qos: QoS,
    /// Last used retain flag.
    pub retain: bool,
}

/// Default WebSocket port of the platform broker.
pub const DEFAULT_PORT: u16 = 8083;

/// Default keep-alive, in seconds.
pub const DEFAULT_KEEPALIVE_SECS: u16 = 60;

/// Default connect timeout, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default delay between automatic reconnects, in milliseconds.
pub const DEFAULT_RECONNECT_PERIOD_MS: u64 = 4000;

/// A saved connection profile.
///
/// The `id` is assigned once and never changes; every other field is
/// replaced wholesale by edits. Serialized field names are camelCase so that
/// profiles saved by other console front-ends load unchanged.
///
/// # Examples
///
/// ```
/// use tio_console::config::{ConnectionConfig, Protocol, Role};
///
/// let config = ConnectionConfig::new("broker.local", 8083)
///     .with_protocol(Protocol::Ws)
///     .with_credentials("thing-42", "secret")
///     .with_role(Role::Thing);
///
/// assert_eq!(config.url(), "ws://broker.local:8083/");
/// assert_eq!(config.thing_id(), Some("thing-42"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// Stable profile id.
    pub id: ConnectionId,
    /// Display name.
    pub name: String,
    /// Session role.
    #[serde(rename = "userrole")]
    pub role: Role,
    /// MQTT client id.
    pub client_id: String,
    /// Append `_<epoch-ms>` to the client id on every connect.
    pub client_id_with_time: bool,
    /// Username; also the thing id for thing-role sessions.
    pub username: String,
    /// Password.
    pub password: String,
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// WebSocket path.
    pub path: String,
    /// Explicit scheme; derived from `tls.ssl` when absent.
    #[serde(default)]
    pub protocol: Option<Protocol>,
    /// TLS settings.
    #[serde(flatten)]
    pub tls: TlsOptions,
    /// Keep-alive, in seconds.
    pub keepalive: u16,
    /// Start a clean session.
    pub clean: bool,
    /// Connect timeout, in seconds.
    pub connect_timeout: u64,
    /// Reconnect automatically after a connection loss.
    pub reconnect: bool,
    /// Delay between automatic reconnects, in milliseconds.
    pub reconnect_period: u64,
    /// Protocol version.
    pub mqtt_version: MqttVersion,
    /// Last-will clause.
    pub will: Option<WillConfig>,
    /// MQTT v5 connect properties.
    pub properties: Option<ConnectProperties>,
    /// Declared subscriptions.
    pub subscriptions: Vec<Subscription>,
    /// Publish options last used on this profile.
    #[serde(rename = "pushProps")]
    pub publish_defaults: PublishDefaults,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            id: ConnectionId::new(),
            name: String::new(),
            role: Role::Thing,
            client_id: String::new(),
            client_id_with_time: false,
            username: String::new(),
            password: String::new(),
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            path: "/".to_string(),
            protocol: Some(Protocol::Ws),
            tls: TlsOptions::default(),
            keepalive: DEFAULT_KEEPALIVE_SECS,
            clean: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            reconnect: true,
            reconnect_period: DEFAULT_RECONNECT_PERIOD_MS,
            mqtt_version: MqttVersion::V5,
            will: None,
            properties: None,
            subscriptions: Vec::new(),
            publish_defaults: PublishDefaults::default(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a profile for the given broker with default settings.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the session role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Sets the MQTT client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets username and password.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the scheme explicitly.
    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Sets the WebSocket path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the TLS settings.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the keep-alive in seconds.
    #[must_use]
    pub fn with_keepalive(mut self, seconds: u16) -> Self {
        self.keepalive = seconds;
        self
    }

    /// Sets the clean-session flag.
    #[must_use]
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Configures automatic reconnects.
    #[must_use]
    pub fn with_reconnect(mut self, enabled: bool, period_ms: u64) -> Self {
        self.reconnect = enabled;
        self.reconnect_period = period_ms;
        self
    }

    /// Sets the protocol version.
    #[must_use]
    pub fn with_mqtt_version(mut self, version: MqttVersion) -> Self {
        self.mqtt_version = version;
        self
    }

    /// Sets the last-will clause.
    #[must_use]
    pub fn with_will(mut self, will: WillConfig) -> Self {
        self.will = Some(will);
        self
    }

    /// Sets the v5 connect properties.
    #[must_use]
    pub fn with_properties(mut self, properties: ConnectProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Appends a declared subscription.
    #[must_use]
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Returns the effective scheme.
    ///
    /// Profiles saved without a protocol fall back to `wss` or `ws`
    /// depending on the TLS flag.
    #[must_use]
    pub fn effective_protocol(&self) -> Protocol {
        self.protocol.unwrap_or(if self.tls.ssl {
            Protocol::Wss
        } else {
            Protocol::Ws
        })
    }

    /// Returns the broker URL.
    ///
    /// The path is only part of WebSocket URLs; a missing leading `/` is
    /// added.
    #[must_use]
    pub fn url(&self) -> String {
        let protocol = self.effective_protocol();
        let mut url = format!("{}://{}:{}", protocol.scheme(), self.host, self.port);
        if protocol.is_websocket() {
            if !self.path.starts_with('/') {
                url.push('/');
            }
            url.push_str(&self.path);
        }
        url
    }

    /// Returns the thing id for thing-role profiles.
    #[must_use]
    pub fn thing_id(&self) -> Option<&str> {
        match self.role {
            Role::Thing => Some(&self.username),
            Role::Server => None,
        }
    }

    /// Returns the scope used for this profile's events.
    #[must_use]
    pub fn scope(&self) -> ThingScope {
        match self.thing_id() {
            Some(id) => ThingScope::Thing(id.to_string()),
            None => ThingScope::Any,
        }
    }

    /// Returns the declared subscription for a filter.
    #[must_use]
    pub fn subscription(&self, topic: &str) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| s.topic == topic)
    }

    /// Updates the options of the declared subscription for `topic`, or
    /// declares `template` if there is none.
    pub fn upsert_subscription(&mut self, topic: &str, opts: SubscribeOptions, template: impl FnOnce() -> Subscription) {
        if let Some(existing) = self.subscriptions.iter_mut().find(|s| s.topic == topic) {
            existing.opts = opts;
        } else {
            self.subscriptions.push(template());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_match_console_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.port, 8083);
        assert_eq!(config.path, "/");
        assert_eq!(config.keepalive, 60);
        assert_eq!(config.connect_timeout, 10);
        assert!(config.reconnect);
        assert_eq!(config.reconnect_period, 4000);
        assert_eq!(config.mqtt_version, MqttVersion::V5);
        assert_eq!(config.role, Role::Thing);
        assert!(config.clean);
        assert!(config.tls.reject_unauthorized);
    }

    #[test]
    fn url_appends_path_for_websocket_only() {
        let config = ConnectionConfig::new("h", 1).with_path("mqtt");
        assert_eq!(config.url(), "ws://h:1/mqtt");

        let config = config.with_protocol(Protocol::Mqtt);
        assert_eq!(config.url(), "mqtt://h:1");

        let config = ConnectionConfig::new("h", 2)
            .with_protocol(Protocol::Wss)
            .with_path("/ws");
        assert_eq!(config.url(), "wss://h:2/ws");
    }

    #[test]
    fn missing_protocol_follows_tls_flag() {
        let mut config = ConnectionConfig::new("h", 8084);
        config.protocol = None;
        assert_eq!(config.effective_protocol(), Protocol::Ws);

        config.tls.ssl = true;
        assert_eq!(config.effective_protocol(), Protocol::Wss);
        assert_eq!(config.url(), "wss://h:8084/");
    }

    #[test]
    fn thing_scope_depends_on_role() {
        let config = ConnectionConfig::default().with_credentials("42", "");
        assert_eq!(config.scope(), ThingScope::Thing("42".to_string()));

        let config = config.with_role(Role::Server);
        assert_eq!(config.thing_id(), None);
        assert_eq!(config.scope(), ThingScope::Any);
    }

    #[test]
    fn loads_saved_profile() {
        let json = json!({
            "id": "a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8",
            "userrole": "server",
            "clientId": "console",
            "host": "broker",
            "port": 8084,
            "ssl": true,
            "certType": "self",
            "ca": "PEM",
            "mqttVersion": "3.1.1",
            "subscriptions": [{"id": "s", "topic": "a/#", "opts": {"qos": 1}, "keep": true}],
            "pushProps": {"qos": 2, "retain": true},
            "createAt": "2023-01-01 00:00:00:000"
        });

        let config: ConnectionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.role, Role::Server);
        assert_eq!(config.client_id, "console");
        assert!(config.tls.ssl);
        assert_eq!(config.tls.cert_type, CertType::SelfSigned);
        assert_eq!(config.mqtt_version, MqttVersion::V311);
        assert_eq!(config.subscriptions[0].opts.qos, QoS::AtLeastOnce);
        assert_eq!(config.publish_defaults.qos, QoS::ExactlyOnce);
        assert_eq!(config.keepalive, 60);
        assert_eq!(config.protocol, None);
        assert_eq!(config.effective_protocol(), Protocol::Wss);
    }

    #[test]
    fn profile_round_trips_through_json() {
        let config = ConnectionConfig::new("h", 1883)
            .with_protocol(Protocol::Mqtt)
            .with_subscription(Subscription::new("x", SubscribeOptions::default()));
        let json = serde_json::to_string(&config).unwrap();
        let back: ConnectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn upsert_updates_or_declares() {
        let mut config = ConnectionConfig::default();
        let opts = SubscribeOptions::with_qos(QoS::AtLeastOnce);

        config.upsert_subscription("a", opts, || Subscription::new("a", opts));
        assert_eq!(config.subscriptions.len(), 1);

        let stronger = SubscribeOptions::with_qos(QoS::ExactlyOnce);
        config.upsert_subscription("a", stronger, || unreachable!());
        assert_eq!(config.subscriptions.len(), 1);
        assert_eq!(config.subscription("a").unwrap().opts.qos, QoS::ExactlyOnce);
    }
}
