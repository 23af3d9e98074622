// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observable state of a connection delegate.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::config::{PublishProperties, QoS};
use crate::event::ConnectionId;
use crate::payload::RenderMode;

/// Lifecycle of a delegate's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ConnectionStatus {
    /// No session.
    #[default]
    Disconnected,
    /// A session was opened and waits for the broker.
    Connecting,
    /// The broker accepted the session.
    Connected,
    /// The session was lost and the transport is retrying.
    Reconnecting {
        /// Retry number, starting at 1.
        attempt: u32,
    },
    /// The session is being closed.
    Disconnecting,
    /// The delegate was torn down.
    Destroyed,
}

impl ConnectionStatus {
    /// Returns `true` if the session is usable.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` while a session exists in any form.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::Reconnecting { .. } | Self::Disconnecting
        )
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting ({attempt})"),
            Self::Disconnecting => f.write_str("disconnecting"),
            Self::Destroyed => f.write_str("destroyed"),
        }
    }
}

/// Whether a message was sent or received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the broker.
    In,
    /// Published by the console.
    Out,
}

/// One entry of a delegate's message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message id.
    pub id: String,
    /// Sent or received.
    pub direction: Direction,
    /// Topic.
    pub topic: String,
    /// Payload as shown to the operator.
    pub payload: String,
    /// QoS.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
    /// v5 properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PublishProperties>,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl Message {
    pub(crate) fn new(
        direction: Direction,
        topic: impl Into<String>,
        payload: impl Into<String>,
        qos: QoS,
        retain: bool,
        properties: Option<PublishProperties>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            direction,
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
            properties,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Returns `true` for published messages.
    #[must_use]
    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Out
    }

    /// Local time of the message as `YYYY-MM-DD HH:MM:SS:mmm`.
    #[must_use]
    pub fn created_at(&self) -> String {
        Local
            .timestamp_millis_opt(self.timestamp_ms)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S:%3f").to_string())
            .unwrap_or_default()
    }
}

/// Full state of a delegate, replaced on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateSnapshot {
    /// Connection the delegate belongs to.
    pub id: ConnectionId,
    /// Session lifecycle.
    pub status: ConnectionStatus,
    /// Reconnect attempts since the last stable connection.
    pub retry_count: u32,
    /// Filters known to the session and whether they are active.
    pub subscriptions: BTreeMap<String, bool>,
    /// Message log, oldest first.
    pub messages: Vec<Message>,
    /// Messages received while the connection was not focused.
    pub unread: usize,
    /// Rendering of received payloads.
    pub render_mode: RenderMode,
}

impl DelegateSnapshot {
    pub(crate) fn new(id: ConnectionId) -> Self {
        Self {
            id,
            status: ConnectionStatus::Disconnected,
            retry_count: 0,
            subscriptions: BTreeMap::new(),
            messages: Vec::new(),
            unread: 0,
            render_mode: RenderMode::default(),
        }
    }

    /// Filters currently active.
    #[must_use]
    pub fn active_subscriptions(&self) -> Vec<&str> {
        self.subscriptions
            .iter()
            .filter(|(_, active)| **active)
            .map(|(topic, _)| topic.as_str())
            .collect()
    }
}
