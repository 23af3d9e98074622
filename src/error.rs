// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the console session core.
//!
//! The hierarchy separates the four failure families a session can run into:
//! precondition failures (rejected before touching the network), transport
//! failures (reported by the MQTT client), codec failures on non-JSON
//! encodings, and persistence or configuration failures.

use thiserror::Error;

use crate::event::ConnectionId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was rejected before reaching the transport.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The transport reported a failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A payload could not be converted for publishing.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Connection profiles could not be persisted.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Console settings could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// No connection with this id is registered.
    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// The delegate was destroyed and accepts no further operations.
    #[error("connection delegate was destroyed")]
    Destroyed,
}

/// Operations rejected synchronously, without any state change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// The session is not connected.
    #[error("client not connected")]
    NotConnected,

    /// Publishing needs a topic unless a topic alias is set.
    #[error("topic required")]
    TopicRequired,

    /// Publishing to a topic filter is never allowed.
    #[error("topic cannot contain '+' or '#': {0}")]
    WildcardTopic(String),

    /// A subscribe or unsubscribe request named no topic.
    #[error("no topics given")]
    EmptyTopicList,
}

/// Errors reported by the underlying messaging transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The MQTT client rejected a request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The MQTT 5.0 client rejected a request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT 5.0 error: {0}")]
    MqttV5(#[from] rumqttc::v5::ClientError),

    /// The connection could not be established or was lost mid-request.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The resolved broker address is unusable.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The broker refused a subscription or request.
    #[error("rejected by broker: {0}")]
    Rejected(String),

    /// An internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// The transport handle is already closed.
    #[error("transport handle is not open")]
    NotOpen,
}

/// Errors converting textual payloads into wire bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The text is not valid hexadecimal.
    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    /// The text is not valid base64.
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

/// Errors persisting connection profiles.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing store failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Profiles could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors loading console settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file is not valid TOML.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A setting has an unusable value.
    #[error("invalid setting {field}: {message}")]
    Invalid {
        /// The offending setting.
        field: String,
        /// Why the value was refused.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_error_display() {
        let err = PreconditionError::WildcardTopic("a/+".to_string());
        assert_eq!(err.to_string(), "topic cannot contain '+' or '#': a/+");
    }

    #[test]
    fn error_from_precondition_error() {
        let err: Error = PreconditionError::NotConnected.into();
        assert!(matches!(
            err,
            Error::Precondition(PreconditionError::NotConnected)
        ));
    }

    #[test]
    fn codec_error_display() {
        let err = CodecError::InvalidHex("odd number of digits".to_string());
        assert_eq!(err.to_string(), "invalid hex payload: odd number of digits");
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::Invalid {
            field: "event_capacity".to_string(),
            message: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid setting event_capacity: must be greater than zero"
        );
    }
}
