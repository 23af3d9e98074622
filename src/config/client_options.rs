// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport options derived from a connection profile.

use std::time::Duration;

use super::{CertType, ConnectProperties, ConnectionConfig, MqttVersion, Protocol, QoS, WillProperties};

/// TLS material handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    /// Verify the broker certificate.
    pub reject_unauthorized: bool,
    /// CA certificate (PEM), for self-signed setups.
    pub ca: Option<String>,
    /// Client certificate (PEM).
    pub cert: Option<String>,
    /// Client private key (PEM).
    pub key: Option<String>,
}

/// Last will handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    /// Will topic, never empty.
    pub topic: String,
    /// Will payload.
    pub payload: String,
    /// Will QoS.
    pub qos: QoS,
    /// Retain the will.
    pub retain: bool,
    /// v5 will properties without unset values.
    pub properties: Option<WillProperties>,
}

/// Everything a transport needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Broker URL, `{scheme}://{host}:{port}[{path}]`.
    pub url: String,
    /// Scheme.
    pub protocol: Protocol,
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client id as sent in CONNECT.
    pub client_id: String,
    /// Username, omitted when empty.
    pub username: Option<String>,
    /// Password, omitted when empty.
    pub password: Option<String>,
    /// Keep-alive interval.
    pub keepalive: Duration,
    /// Start a clean session.
    pub clean: bool,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Delay between automatic reconnects; zero disables them.
    pub reconnect_period: Duration,
    /// Protocol version.
    pub mqtt_version: MqttVersion,
    /// v5 connect properties without unset values.
    pub properties: Option<ConnectProperties>,
    /// TLS settings, present when TLS is on.
    pub tls: Option<TlsMaterial>,
    /// Last will, present when a will topic is set.
    pub will: Option<LastWill>,
    /// Restore subscriptions after an automatic reconnect.
    pub resubscribe: bool,
}

impl ClientOptions {
    /// Returns `true` if the transport should reconnect on its own.
    #[must_use]
    pub fn reconnects(&self) -> bool {
        !self.reconnect_period.is_zero()
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

impl ConnectionConfig {
    /// Derives transport options from this profile.
    ///
    /// `resubscribe` comes from the console settings.
    #[must_use]
    pub fn client_options(&self, resubscribe: bool) -> ClientOptions {
        self.client_options_at(chrono::Utc::now().timestamp_millis(), resubscribe)
    }

    pub(crate) fn client_options_at(&self, now_ms: i64, resubscribe: bool) -> ClientOptions {
        let protocol = self.effective_protocol();
        let is_v5 = self.mqtt_version == MqttVersion::V5;

        let client_id = if self.client_id_with_time {
            format!("{}_{now_ms}", self.client_id)
        } else {
            self.client_id.clone()
        };

        let tls = self.tls.ssl.then(|| {
            let self_signed = self.tls.cert_type == CertType::SelfSigned;
            let material = |pem: &str| if self_signed { non_empty(pem) } else { None };
            TlsMaterial {
                reject_unauthorized: self.tls.reject_unauthorized,
                ca: material(&self.tls.ca),
                cert: material(&self.tls.cert),
                key: material(&self.tls.key),
            }
        });

        let will = self
            .will
            .as_ref()
            .filter(|will| !will.last_will_topic.is_empty())
            .map(|will| LastWill {
                topic: will.last_will_topic.clone(),
                payload: will.last_will_payload.clone(),
                qos: will.last_will_qos,
                retain: will.last_will_retain,
                properties: if is_v5 {
                    will.properties.as_ref().and_then(WillProperties::stripped)
                } else {
                    None
                },
            });

        ClientOptions {
            url: self.url(),
            protocol,
            host: self.host.clone(),
            port: self.port,
            client_id,
            username: non_empty(&self.username),
            password: non_empty(&self.password),
            keepalive: Duration::from_secs(u64::from(self.keepalive)),
            clean: self.clean,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            reconnect_period: if self.reconnect {
                Duration::from_millis(self.reconnect_period)
            } else {
                Duration::ZERO
            },
            mqtt_version: self.mqtt_version,
            properties: if is_v5 {
                self.properties.as_ref().and_then(ConnectProperties::stripped)
            } else {
                None
            },
            tls,
            will,
            resubscribe,
        }
    }
}
