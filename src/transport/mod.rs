// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messaging transport seam.
//!
//! Sessions never talk to an MQTT client directly. A [`Connector`] opens a
//! session and returns a [`TransportHandle`] for requests together with a
//! stream of [`TransportEvent`]s. Events of one handle arrive in the order
//! the transport observed them.
//!
//! The `mqtt` feature provides [`MqttConnector`], backed by `rumqttc`.

#[cfg(test)]
pub(crate) mod fake;
#[cfg(feature = "mqtt")]
mod mqtt;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{ClientOptions, PublishOptions, PublishProperties, QoS, SubscribeOptions};
use crate::error::TransportError;

#[cfg(feature = "mqtt")]
pub use mqtt::MqttConnector;

/// Granted code of a refused subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    /// Topic the message was published to.
    pub topic: String,
    /// Raw payload.
    pub payload: Vec<u8>,
    /// Delivery QoS.
    pub qos: QoS,
    /// Retained message.
    pub retain: bool,
    /// v5 properties, when the transport reports them.
    pub properties: Option<PublishProperties>,
}

/// Lifecycle and traffic of one transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the session.
    Connected,
    /// The transport is about to retry after losing the connection.
    Reconnecting,
    /// The transport hit an error; a close or end event follows if the
    /// connection is gone.
    Error(String),
    /// The connection closed, optionally with a reason.
    Close(Option<String>),
    /// The session ended for good; no further events follow.
    End,
    /// A message arrived.
    Message(InboundPacket),
}

/// Stream of events for one opened session.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Requests on an opened session.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Publishes a message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport refuses the request.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        opts: &PublishOptions,
    ) -> Result<(), TransportError>;

    /// Subscribes to filters and returns the granted code of each, in
    /// request order. Codes above 2 mean the broker refused that filter.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request fails or is not
    /// acknowledged.
    async fn subscribe(
        &self,
        filters: Vec<(String, SubscribeOptions)>,
    ) -> Result<Vec<u8>, TransportError>;

    /// Unsubscribes from filters.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request fails or is not
    /// acknowledged.
    async fn unsubscribe(&self, filters: Vec<String>) -> Result<(), TransportError>;

    /// Closes the session. An `End` event follows.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the session cannot be closed.
    async fn end(&self) -> Result<(), TransportError>;
}

/// Opens transport sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Starts a session. Connection progress is reported through the
    /// returned events; a `Connected` event marks success.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the options cannot be used to start a
    /// session at all.
    async fn open(
        &self,
        options: &ClientOptions,
    ) -> Result<(Arc<dyn TransportHandle>, TransportEvents), TransportError>;
}

impl fmt::Debug for dyn TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportHandle")
    }
}

impl fmt::Debug for dyn Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Connector")
    }
}
