// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-session event types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConnectionId;

/// Which thing an event is about.
///
/// Thing-role sessions scope their events to the thing id they authenticate
/// as. Server-role sessions observe many things at once, so their message
/// events use the wildcard scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThingScope {
    /// A specific thing id.
    Thing(String),
    /// Any thing.
    Any,
}

impl ThingScope {
    /// Returns true if an event with this scope concerns `thing_id`.
    #[must_use]
    pub fn covers(&self, thing_id: &str) -> bool {
        match self {
            Self::Thing(id) => id == thing_id,
            Self::Any => true,
        }
    }
}

impl fmt::Display for ThingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thing(id) => f.write_str(id),
            Self::Any => f.write_str("*"),
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ThingEventKind {
    /// A thing-role session connected.
    Connected {
        /// Opaque token supplied by whoever requested the connect.
        connected_token: Option<String>,
    },
    /// A thing-role session ended.
    Disconnected,
    /// A message was received.
    MessageIn {
        /// Topic the message arrived on.
        topic: String,
    },
    /// A message was published.
    MessageOut {
        /// Topic the message was published to.
        topic: String,
    },
}

/// An event raised by a connection delegate for anyone tracking thing
/// activity.
///
/// The console never listens to its own events; they exist for views and
/// background observers that react to a particular thing's connectivity or
/// traffic.
///
/// # Examples
///
/// ```
/// use tio_console::event::{ConnectionId, ThingEvent, ThingScope};
///
/// let event = ThingEvent::message_in(
///     ThingScope::Thing("42".into()),
///     ConnectionId::new(),
///     "devices/42/status",
/// );
/// assert!(event.is_message());
/// assert!(event.scope.covers("42"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingEvent {
    /// The thing this event concerns.
    pub scope: ThingScope,
    /// The connection that raised the event.
    pub connection: ConnectionId,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Event-specific payload.
    pub kind: ThingEventKind,
}

impl ThingEvent {
    fn now(scope: ThingScope, connection: ConnectionId, kind: ThingEventKind) -> Self {
        Self {
            scope,
            connection,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            kind,
        }
    }

    /// Creates a connected event.
    #[must_use]
    pub fn connected(
        scope: ThingScope,
        connection: ConnectionId,
        connected_token: Option<String>,
    ) -> Self {
        Self::now(
            scope,
            connection,
            ThingEventKind::Connected { connected_token },
        )
    }

    /// Creates a disconnected event.
    #[must_use]
    pub fn disconnected(scope: ThingScope, connection: ConnectionId) -> Self {
        Self::now(scope, connection, ThingEventKind::Disconnected)
    }

    /// Creates a message-in event.
    #[must_use]
    pub fn message_in(scope: ThingScope, connection: ConnectionId, topic: impl Into<String>) -> Self {
        Self::now(
            scope,
            connection,
            ThingEventKind::MessageIn {
                topic: topic.into(),
            },
        )
    }

    /// Creates a message-out event.
    #[must_use]
    pub fn message_out(
        scope: ThingScope,
        connection: ConnectionId,
        topic: impl Into<String>,
    ) -> Self {
        Self::now(
            scope,
            connection,
            ThingEventKind::MessageOut {
                topic: topic.into(),
            },
        )
    }

    /// Returns `true` for connected/disconnected events.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(
            self.kind,
            ThingEventKind::Connected { .. } | ThingEventKind::Disconnected
        )
    }

    /// Returns `true` for message-in/message-out events.
    #[must_use]
    pub fn is_message(&self) -> bool {
        matches!(
            self.kind,
            ThingEventKind::MessageIn { .. } | ThingEventKind::MessageOut { .. }
        )
    }
}
