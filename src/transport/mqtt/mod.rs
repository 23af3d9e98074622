// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport backed by `rumqttc`.
//!
//! Each opened session owns a client and a spawned task that polls its
//! event loop. The task turns broker packets into [`TransportEvent`]s,
//! completes pending SUBACK/UNSUBACK waits in request order and sleeps for
//! the reconnect period between connection attempts.
//!
//! Profiles on MQTT 5.0 go through the `rumqttc::v5` client, which carries
//! connect, will and publish properties and the v5 subscribe options.
//! MQTT 3.1.1 profiles use the classic client.

mod v4;
mod v5;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{TlsConfiguration, Transport};
use tokio::sync::{mpsc, oneshot};

use super::{Connector, InboundPacket, TransportEvent, TransportEvents, TransportHandle};
use crate::config::{
    ClientOptions, MqttVersion, Protocol, PublishOptions, SubscribeOptions, TlsMaterial,
};
use crate::error::TransportError;

/// Capacity of the request channel between client and event loop.
const REQUEST_CAPACITY: usize = 10;

/// Largest packet accepted or sent.
const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// How long to wait for a SUBACK or UNSUBACK.
const ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// What one poll of an event loop produced.
#[derive(Debug)]
enum Polled {
    Connected,
    Refused(String),
    Message(InboundPacket),
    SubAck(Vec<u8>),
    UnsubAck,
    /// The broker sent DISCONNECT.
    ClosedByBroker(Option<String>),
    /// Our own DISCONNECT went out.
    ClosedByClient,
    Other,
}

/// A `rumqttc` event loop of either protocol version.
#[async_trait]
trait EventSource: Send + 'static {
    async fn next(&mut self) -> Result<Polled, String>;
}

/// Requests of a `rumqttc` client of either protocol version.
#[async_trait]
trait MqttClient: Send + Sync + 'static {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        opts: &PublishOptions,
    ) -> Result<(), TransportError>;

    async fn subscribe(&self, filters: Vec<(String, SubscribeOptions)>)
    -> Result<(), TransportError>;

    async fn unsubscribe(&self, filter: String) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Acknowledgement waits, completed in the order requests were sent.
#[derive(Default)]
struct PendingAcks {
    subscribes: Mutex<VecDeque<oneshot::Sender<Vec<u8>>>>,
    unsubscribes: Mutex<VecDeque<oneshot::Sender<()>>>,
}

impl PendingAcks {
    /// Fails every outstanding wait.
    fn abandon(&self) {
        self.subscribes.lock().clear();
        self.unsubscribes.lock().clear();
    }
}

/// Opens sessions with `rumqttc`.
///
/// The client version follows [`ClientOptions::mqtt_version`].
///
/// # Examples
///
/// ```no_run
/// use tio_console::config::{ConnectionConfig, Protocol};
/// use tio_console::transport::{Connector, MqttConnector, TransportEvent};
///
/// # async fn example() -> Result<(), tio_console::error::TransportError> {
/// let options = ConnectionConfig::new("127.0.0.1", 1883)
///     .with_protocol(Protocol::Mqtt)
///     .with_client_id("console")
///     .client_options(true);
///
/// let (handle, mut events) = MqttConnector::new().open(&options).await?;
/// while let Some(event) = events.recv().await {
///     if event == TransportEvent::Connected {
///         break;
///     }
/// }
/// handle.end().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

impl MqttConnector {
    /// Creates a connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MqttConnector {
    async fn open(
        &self,
        options: &ClientOptions,
    ) -> Result<(Arc<dyn TransportHandle>, TransportEvents), TransportError> {
        tracing::info!(
            url = %options.url,
            client_id = %options.client_id,
            version = ?options.mqtt_version,
            "Opening MQTT session"
        );
        match options.mqtt_version {
            MqttVersion::V311 => {
                let (client, event_loop) = v4::client(options)?;
                Ok(start(options, client, event_loop))
            }
            MqttVersion::V5 => {
                let (client, event_loop) = v5::client(options)?;
                Ok(start(options, client, event_loop))
            }
        }
    }
}

fn start<C: MqttClient, S: EventSource>(
    options: &ClientOptions,
    client: C,
    source: S,
) -> (Arc<dyn TransportHandle>, TransportEvents) {
    let pending = Arc::new(PendingAcks::default());
    let ending = Arc::new(AtomicBool::new(false));
    let stopped = Arc::new(AtomicBool::new(false));
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let session = SessionTask {
        source,
        events: events_tx,
        pending: Arc::clone(&pending),
        ending: Arc::clone(&ending),
        stopped: Arc::clone(&stopped),
        reconnect_period: options.reconnect_period,
    };
    tokio::spawn(session.run());

    let handle = MqttHandle {
        client,
        pending,
        ending,
        stopped,
        request_order: tokio::sync::Mutex::new(()),
    };
    (Arc::new(handle), events_rx)
}

fn validate(options: &ClientOptions) -> Result<(), TransportError> {
    if options.host.is_empty() {
        return Err(TransportError::InvalidAddress(
            "broker host is required".to_string(),
        ));
    }
    Ok(())
}

fn client_id(options: &ClientOptions) -> String {
    if options.client_id.trim().is_empty() {
        format!("tio_console_{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
    } else {
        options.client_id.clone()
    }
}

/// Host for TCP transports, the full URL for WebSocket ones.
fn broker(options: &ClientOptions) -> String {
    if options.protocol.is_websocket() {
        options.url.clone()
    } else {
        options.host.clone()
    }
}

fn session_transport(options: &ClientOptions) -> Result<Option<Transport>, TransportError> {
    let secure = options.protocol.is_secure() || options.tls.is_some();
    transport(options.protocol, secure, options.tls.as_ref())
}

fn tls_configuration(tls: Option<&TlsMaterial>) -> TlsConfiguration {
    let Some(tls) = tls else {
        return TlsConfiguration::default();
    };
    if !tls.reject_unauthorized {
        tracing::warn!("Broker certificate verification cannot be disabled; verifying anyway");
    }
    match &tls.ca {
        Some(ca) => TlsConfiguration::Simple {
            ca: ca.clone().into_bytes(),
            alpn: None,
            client_auth: tls
                .cert
                .as_ref()
                .zip(tls.key.as_ref())
                .map(|(cert, key)| (cert.clone().into_bytes(), key.clone().into_bytes())),
        },
        None => TlsConfiguration::default(),
    }
}

fn transport(
    protocol: Protocol,
    secure: bool,
    tls: Option<&TlsMaterial>,
) -> Result<Option<Transport>, TransportError> {
    match (protocol.is_websocket(), secure) {
        (false, false) => Ok(None),
        (false, true) => Ok(Some(Transport::tls_with_config(tls_configuration(tls)))),
        #[cfg(feature = "websocket")]
        (true, false) => Ok(Some(Transport::Ws)),
        #[cfg(feature = "websocket")]
        (true, true) => Ok(Some(Transport::wss_with_config(tls_configuration(tls)))),
        #[cfg(not(feature = "websocket"))]
        (true, _) => {
            let _ = tls;
            Err(TransportError::InvalidAddress(format!(
                "{protocol} needs the `websocket` feature"
            )))
        }
    }
}

/// Polls one session's event loop.
struct SessionTask<S> {
    source: S,
    events: mpsc::UnboundedSender<TransportEvent>,
    pending: Arc<PendingAcks>,
    ending: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    reconnect_period: Duration,
}

impl<S: EventSource> SessionTask<S> {
    fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    async fn run(mut self) {
        loop {
            if self.events.is_closed() {
                tracing::debug!("Session events dropped, stopping event loop");
                break;
            }

            match self.source.next().await {
                Ok(Polled::Connected) => {
                    self.emit(TransportEvent::Connected);
                }
                Ok(Polled::Refused(code)) => {
                    tracing::warn!(%code, "MQTT connection refused");
                    self.emit(TransportEvent::Error(format!("Connection refused: {code}")));
                }
                Ok(Polled::Message(packet)) => {
                    self.emit(TransportEvent::Message(packet));
                }
                Ok(Polled::SubAck(codes)) => {
                    if let Some(waiter) = self.pending.subscribes.lock().pop_front() {
                        let _ = waiter.send(codes);
                    }
                }
                Ok(Polled::UnsubAck) => {
                    if let Some(waiter) = self.pending.unsubscribes.lock().pop_front() {
                        let _ = waiter.send(());
                    }
                }
                Ok(Polled::ClosedByBroker(reason)) => {
                    tracing::info!(?reason, "MQTT broker closed the session");
                    let reason = reason.unwrap_or_else(|| "Disconnected by broker".to_string());
                    self.emit(TransportEvent::Close(Some(reason)));
                }
                Ok(Polled::ClosedByClient) => {
                    tracing::debug!("MQTT session closed by client");
                    self.emit(TransportEvent::Close(None));
                    break;
                }
                Ok(Polled::Other) => {}
                Err(e) => {
                    self.pending.abandon();
                    if self.ending.load(Ordering::Acquire) {
                        break;
                    }
                    tracing::warn!(error = %e, "MQTT event loop error");
                    self.emit(TransportEvent::Error(e));
                    self.emit(TransportEvent::Close(None));

                    if self.reconnect_period.is_zero() {
                        break;
                    }
                    tokio::time::sleep(self.reconnect_period).await;
                    if self.ending.load(Ordering::Acquire) {
                        break;
                    }
                    if !self.emit(TransportEvent::Reconnecting) {
                        break;
                    }
                }
            }
        }

        self.pending.abandon();
        self.stopped.store(true, Ordering::Release);
        self.emit(TransportEvent::End);
        tracing::debug!("MQTT event loop stopped");
    }
}

/// Requests on one `rumqttc` session.
struct MqttHandle<C> {
    client: C,
    pending: Arc<PendingAcks>,
    ending: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    /// Keeps ack registration and request submission in the same order.
    request_order: tokio::sync::Mutex<()>,
}

async fn await_ack<T>(rx: oneshot::Receiver<T>, what: &str) -> Result<T, TransportError> {
    match tokio::time::timeout(ACK_TIMEOUT, rx).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(TransportError::ChannelClosed(format!(
            "{what} was not acknowledged before the connection closed"
        ))),
        Err(_) => Err(TransportError::ConnectionFailed(format!(
            "{what} acknowledgement timed out after {}s",
            ACK_TIMEOUT.as_secs()
        ))),
    }
}

#[async_trait]
impl<C: MqttClient> TransportHandle for MqttHandle<C> {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        opts: &PublishOptions,
    ) -> Result<(), TransportError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        self.client.publish(topic, payload, opts).await
    }

    async fn subscribe(
        &self,
        filters: Vec<(String, SubscribeOptions)>,
    ) -> Result<Vec<u8>, TransportError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        let rx = {
            let _order = self.request_order.lock().await;
            let (tx, rx) = oneshot::channel();
            self.pending.subscribes.lock().push_back(tx);
            if let Err(e) = self.client.subscribe(filters).await {
                self.pending.subscribes.lock().pop_back();
                return Err(e);
            }
            rx
        };
        await_ack(rx, "Subscription").await
    }

    async fn unsubscribe(&self, filters: Vec<String>) -> Result<(), TransportError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        let mut waits = Vec::with_capacity(filters.len());
        {
            let _order = self.request_order.lock().await;
            for filter in filters {
                let (tx, rx) = oneshot::channel();
                self.pending.unsubscribes.lock().push_back(tx);
                if let Err(e) = self.client.unsubscribe(filter).await {
                    self.pending.unsubscribes.lock().pop_back();
                    return Err(e);
                }
                waits.push(rx);
            }
        }
        for rx in waits {
            await_ack(rx, "Unsubscription").await?;
        }
        Ok(())
    }

    async fn end(&self) -> Result<(), TransportError> {
        self.ending.store(true, Ordering::Release);
        if self.stopped.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.client.disconnect().await {
            Ok(()) => Ok(()),
            // The event loop already exited between the check and the request
            Err(_) if self.stopped.load(Ordering::Acquire) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
