// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-connection session state machine.
//!
//! A [`ConnectionDelegate`] owns at most one transport session for one
//! connection profile. Transport events of the current session are consumed
//! by a single task, in arrival order. Events of a session the delegate no
//! longer holds are dropped; the check runs under the state lock, together
//! with the change the event makes. Every visible change replaces the
//! delegate's [`DelegateSnapshot`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::config::{
    ConnectionConfig, PublishDefaults, PublishOptions, Role, SubscribeOptions,
};
use crate::error::{Error, PreconditionError, Result, TransportError};
use crate::event::{ConnectionId, EventBus, ThingEvent};
use crate::notify::Notifier;
use crate::payload::{self, RenderMode};
use crate::settings::ConsoleSettings;
use crate::topic;
use crate::transport::{
    Connector, InboundPacket, TransportEvent, TransportEvents, TransportHandle,
};

use super::gate::{ConnectGate, Focus};
use super::snapshot::{ConnectionStatus, DelegateSnapshot, Direction, Message};

/// Reconnect attempts tolerated before the session is closed.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Collaborators shared by every delegate of a console.
pub(crate) struct SessionContext {
    pub gate: ConnectGate,
    pub focus: Focus,
    pub connector: Arc<dyn Connector>,
    pub notifier: Arc<dyn Notifier>,
    pub events: EventBus,
    pub settings: ConsoleSettings,
}

impl SessionContext {
    pub fn new(
        settings: ConsoleSettings,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gate: ConnectGate::new(),
            focus: Focus::default(),
            connector,
            notifier,
            events: EventBus::with_capacity(settings.event_capacity),
            settings,
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("gate", &self.gate)
            .field("focus", &self.focus)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// How the outcome of a network operation is reported.
///
/// Precondition failures are always notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reply {
    /// Notify the operator of success and failure.
    #[default]
    Notify,
    /// Only return the result; the caller reports it.
    Caller,
}

/// Filters to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeRequest {
    /// One filter.
    Single {
        /// Filter.
        topic: String,
        /// Options.
        opts: SubscribeOptions,
    },
    /// Several filters sharing options.
    Many {
        /// Filters.
        topics: Vec<String>,
        /// Options for every filter.
        opts: SubscribeOptions,
    },
    /// Filters with their own options.
    Map(BTreeMap<String, SubscribeOptions>),
}

impl SubscribeRequest {
    /// Subscribes to one filter.
    #[must_use]
    pub fn single(topic: impl Into<String>, opts: SubscribeOptions) -> Self {
        Self::Single {
            topic: topic.into(),
            opts,
        }
    }

    /// Returns every filter with its options.
    #[must_use]
    pub fn filters(&self) -> Vec<(String, SubscribeOptions)> {
        match self {
            Self::Single { topic, opts } => vec![(topic.clone(), *opts)],
            Self::Many { topics, opts } => topics.iter().map(|t| (t.clone(), *opts)).collect(),
            Self::Map(map) => map.iter().map(|(t, opts)| (t.clone(), *opts)).collect(),
        }
    }
}

/// Whether `session` is the one the delegate currently holds.
fn owns(state: &DelegateState, session: &Arc<dyn TransportHandle>) -> bool {
    state
        .handle
        .as_ref()
        .is_some_and(|handle| Arc::ptr_eq(handle, session))
}

fn notice(error: &PreconditionError) -> &'static str {
    match error {
        PreconditionError::NotConnected => "Client not connected",
        PreconditionError::TopicRequired | PreconditionError::EmptyTopicList => "Topic Required!",
        PreconditionError::WildcardTopic(_) => "Topic Cannot Contain '+' or '#'!",
    }
}

struct DelegateState {
    config: ConnectionConfig,
    handle: Option<Arc<dyn TransportHandle>>,
    snapshot: DelegateSnapshot,
    connected_token: Option<String>,
    resubscribe: bool,
}

/// Session state machine for one connection profile.
///
/// Delegates are created and destroyed by the
/// [`Registry`](super::Registry).
pub struct ConnectionDelegate {
    id: ConnectionId,
    context: Arc<SessionContext>,
    state: Mutex<DelegateState>,
    snapshot_tx: watch::Sender<DelegateSnapshot>,
    destroyed: AtomicBool,
}

impl ConnectionDelegate {
    pub(crate) fn new(config: ConnectionConfig, context: Arc<SessionContext>) -> Arc<Self> {
        let id = config.id;
        let snapshot = DelegateSnapshot::new(id);
        let (snapshot_tx, _) = watch::channel(snapshot.clone());

        Arc::new(Self {
            id,
            context,
            state: Mutex::new(DelegateState {
                config,
                handle: None,
                snapshot,
                connected_token: None,
                resubscribe: false,
            }),
            snapshot_tx,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Returns the connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DelegateSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Returns a receiver that sees every new snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<DelegateSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Returns the session status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().snapshot.status
    }

    /// Returns `true` if the broker accepted the session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns `true` once [`destroy`](Self::destroy) was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Returns the profile the delegate works with.
    #[must_use]
    pub fn config(&self) -> ConnectionConfig {
        self.state.lock().config.clone()
    }

    /// Thing id used for catalog lookups: the username for thing-role
    /// profiles, `+` otherwise.
    #[must_use]
    pub fn thing_id(&self) -> String {
        self.state
            .lock()
            .config
            .thing_id()
            .unwrap_or("+")
            .to_string()
    }

    pub(crate) fn set_config(&self, config: ConnectionConfig) {
        self.state.lock().config = config;
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens a new session with `config`.
    ///
    /// Does nothing and returns `Ok(false)` while any delegate of the
    /// console is connecting. An existing session is closed first; for
    /// thing-role profiles that raises its `disconnected` event.
    /// `connected_token` travels with the next thing `connected` event.
    ///
    /// # Errors
    ///
    /// Returns an error if the delegate was destroyed, the previous session
    /// cannot be closed or the transport refuses the options.
    pub async fn connect(
        self: &Arc<Self>,
        config: ConnectionConfig,
        connected_token: Option<String>,
    ) -> Result<bool> {
        self.ensure_alive()?;
        let (previous, replaced) = {
            let mut state = self.state.lock();
            if !self.context.gate.try_acquire() {
                tracing::debug!(connection = %self.id, "Connect ignored, another attempt is in flight");
                return Ok(false);
            }
            let replaced = (state.config.role == Role::Thing).then(|| state.config.scope());
            (state.handle.take(), replaced)
        };

        if let Some(previous) = previous {
            if let Err(e) = previous.end().await {
                tracing::warn!(connection = %self.id, error = %e, "Failed to close previous session");
                {
                    let mut state = self.state.lock();
                    state.handle.get_or_insert(previous);
                    self.context.gate.release();
                }
                self.context.notifier.notify_fail("Connect Failure");
                return Err(e.into());
            }
            if let Some(scope) = replaced {
                self.context
                    .events
                    .publish(ThingEvent::disconnected(scope, self.id));
            }
        }

        let options = config.client_options(self.context.settings.auto_resubscribe);
        tracing::info!(connection = %self.id, url = %options.url, "Connecting");

        {
            let mut state = self.state.lock();
            state.config = config;
            state.connected_token = connected_token;
            state.resubscribe = options.resubscribe;
            state.snapshot.retry_count = 0;
            state.snapshot.subscriptions.clear();
            state.snapshot.status = ConnectionStatus::Connecting;
            self.broadcast(&state);
        }

        match self.context.connector.open(&options).await {
            Ok((handle, events)) => {
                if self.is_destroyed() {
                    self.context.gate.release();
                    let _ = handle.end().await;
                    return Err(Error::Destroyed);
                }
                self.state.lock().handle = Some(Arc::clone(&handle));
                self.spawn_event_handler(handle, events);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(connection = %self.id, error = %e, "Failed to open session");
                {
                    let mut state = self.state.lock();
                    state.snapshot.status = ConnectionStatus::Disconnected;
                    self.broadcast(&state);
                }
                self.context.gate.release();
                self.context.notifier.notify_fail(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Closes the session.
    ///
    /// Completes immediately without a session. On success the retry
    /// counter and the live subscriptions are reset; the transport's end
    /// event marks the delegate disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot close the session.
    pub async fn disconnect(&self) -> Result<()> {
        let (handle, previous) = {
            let mut state = self.state.lock();
            let Some(handle) = state.handle.clone() else {
                return Ok(());
            };
            let previous = state.snapshot.status;
            if previous.is_active() {
                state.snapshot.status = ConnectionStatus::Disconnecting;
                self.broadcast(&state);
            }
            (handle, previous)
        };

        match handle.end().await {
            Ok(()) => {
                tracing::debug!(connection = %self.id, "Session closed");
                let mut state = self.state.lock();
                state.snapshot.retry_count = 0;
                state.snapshot.subscriptions.clear();
                self.broadcast(&state);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(connection = %self.id, error = %e, "Failed to close session");
                {
                    let mut state = self.state.lock();
                    if state.snapshot.status == ConnectionStatus::Disconnecting {
                        state.snapshot.status = previous;
                    }
                    self.broadcast(&state);
                }
                self.context.notifier.notify_fail(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Closes the session and retires the delegate for good.
    ///
    /// Later operations fail with [`Error::Destroyed`]. Calling it again is
    /// a no-op.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }

        let (handle, status) = {
            let mut state = self.state.lock();
            (state.handle.take(), state.snapshot.status)
        };
        if let Some(handle) = handle
            && let Err(e) = handle.end().await
        {
            tracing::warn!(connection = %self.id, error = %e, "Failed to close session of destroyed delegate");
        }
        if matches!(
            status,
            ConnectionStatus::Connecting | ConnectionStatus::Reconnecting { .. }
        ) {
            self.context.gate.release();
        }

        let mut state = self.state.lock();
        state.snapshot.status = ConnectionStatus::Destroyed;
        state.snapshot.retry_count = 0;
        state.snapshot.subscriptions.clear();
        self.broadcast(&state);
        tracing::debug!(connection = %self.id, "Delegate destroyed");
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Publishes `payload`, written in `mode`, to `topic`.
    ///
    /// Unset v5 properties are dropped before sending. On success the
    /// message is logged and the QoS and retain flag become the profile's
    /// publish defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] for wildcard or missing topics and
    /// when not connected, [`Error::Codec`] if the payload does not match
    /// `mode` and [`Error::Transport`] if the transport refuses the message.
    pub async fn publish(
        &self,
        topic: &str,
        payload: &str,
        mode: RenderMode,
        opts: &PublishOptions,
        reply: Reply,
    ) -> Result<()> {
        self.ensure_alive()?;
        let opts = opts.stripped();
        if topic::contains_wildcard(topic) {
            return Err(self.reject(PreconditionError::WildcardTopic(topic.to_string())));
        }
        if topic.is_empty() && opts.topic_alias().is_none() {
            return Err(self.reject(PreconditionError::TopicRequired));
        }
        let handle = self.connected_handle()?;

        let bytes = match payload::encode(payload, mode, self.context.notifier.as_ref()) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.report(reply, &e.to_string());
                return Err(e.into());
            }
        };

        if let Err(e) = handle.publish(topic, bytes, &opts).await {
            tracing::warn!(connection = %self.id, topic = %topic, error = %e, "Publish failed");
            self.report(reply, &e.to_string());
            return Err(e.into());
        }
        tracing::debug!(connection = %self.id, topic = %topic, qos = %opts.qos, "Published");

        let scope = {
            let mut state = self.state.lock();
            state.config.publish_defaults = PublishDefaults {
                qos: opts.qos,
                retain: opts.retain,
            };
            let message = Message::new(
                Direction::Out,
                topic,
                payload,
                opts.qos,
                opts.retain,
                opts.properties.clone(),
            );
            self.push_message(&mut state, message);
            self.broadcast(&state);
            state.config.scope()
        };
        self.context
            .events
            .publish(ThingEvent::message_out(scope, self.id, topic));
        Ok(())
    }

    /// Subscribes to the requested filters.
    ///
    /// All filters become active once the broker grants every one of them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] when not connected or without
    /// filters and [`Error::Transport`] if the request fails or the broker
    /// refuses a filter.
    pub async fn subscribe(&self, request: SubscribeRequest, reply: Reply) -> Result<()> {
        self.ensure_alive()?;
        let handle = self.connected_handle()?;
        let filters = request.filters();
        if filters.is_empty() {
            return Err(self.reject(PreconditionError::EmptyTopicList));
        }

        let codes = match handle.subscribe(filters.clone()).await {
            Ok(codes) => codes,
            Err(e) => {
                tracing::warn!(connection = %self.id, error = %e, "Subscribe failed");
                self.report(reply, &e.to_string());
                return Err(e.into());
            }
        };

        let refused: Vec<&str> = filters
            .iter()
            .zip(&codes)
            .filter(|(_, code)| **code > 2)
            .map(|((topic, _), _)| topic.as_str())
            .collect();
        if !refused.is_empty() {
            tracing::warn!(connection = %self.id, refused = ?refused, "Broker refused subscription");
            self.report(reply, "Subscription failure");
            return Err(TransportError::Rejected(format!(
                "Subscription failure: {}",
                refused.join(", ")
            ))
            .into());
        }

        {
            let mut state = self.state.lock();
            for (topic, _) in &filters {
                state.snapshot.subscriptions.insert(topic.clone(), true);
            }
            self.broadcast(&state);
        }
        tracing::debug!(connection = %self.id, count = filters.len(), "Subscribed");
        if reply == Reply::Notify {
            self.context.notifier.notify_done("Topic(s) Subscribed");
        }
        Ok(())
    }

    /// Unsubscribes from `topics`. Declared subscriptions of the profile are
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] when not connected or without topics
    /// and [`Error::Transport`] if the request fails.
    pub async fn unsubscribe(&self, topics: Vec<String>, reply: Reply) -> Result<()> {
        self.ensure_alive()?;
        let handle = self.connected_handle()?;
        if topics.is_empty() {
            return Err(self.reject(PreconditionError::EmptyTopicList));
        }

        if let Err(e) = handle.unsubscribe(topics.clone()).await {
            tracing::warn!(connection = %self.id, error = %e, "Unsubscribe failed");
            self.report(reply, &e.to_string());
            return Err(e.into());
        }

        {
            let mut state = self.state.lock();
            for topic in topics {
                state.snapshot.subscriptions.insert(topic, false);
            }
            self.broadcast(&state);
        }
        if reply == Reply::Notify {
            self.context.notifier.notify_done("Topic(s) Unsubscribed");
        }
        Ok(())
    }

    // =========================================================================
    // Local state
    // =========================================================================

    /// Empties the message log and the unread count.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.snapshot.messages.clear();
        state.snapshot.unread = 0;
        self.broadcast(&state);
    }

    /// Marks every message as read.
    pub fn read(&self) {
        let mut state = self.state.lock();
        state.snapshot.unread = 0;
        self.broadcast(&state);
    }

    /// Changes how later messages are rendered.
    pub fn set_render_mode(&self, mode: RenderMode) {
        let mut state = self.state.lock();
        state.snapshot.render_mode = mode;
        self.broadcast(&state);
    }

    /// Drops a filter from the live subscriptions without telling the
    /// broker.
    pub fn forget_topic(&self, filter: &str) {
        let mut state = self.state.lock();
        if state.snapshot.subscriptions.remove(filter).is_some() {
            self.broadcast(&state);
        }
    }

    /// Active filters that match `topic`.
    #[must_use]
    pub fn matching_subscriptions(&self, topic: &str) -> Vec<String> {
        self.state
            .lock()
            .snapshot
            .subscriptions
            .iter()
            .filter(|(filter, active)| **active && topic::matches(filter, topic))
            .map(|(filter, _)| filter.clone())
            .collect()
    }

    // =========================================================================
    // Transport events
    // =========================================================================

    fn spawn_event_handler(
        self: &Arc<Self>,
        session: Arc<dyn TransportHandle>,
        mut events: TransportEvents,
    ) {
        let delegate: Weak<Self> = Arc::downgrade(self);
        let id = self.id;

        tokio::spawn(async move {
            tracing::debug!(connection = %id, "Starting transport event handler");

            while let Some(event) = events.recv().await {
                let Some(delegate) = delegate.upgrade() else {
                    break;
                };
                if delegate.is_destroyed() {
                    break;
                }
                let end = event == TransportEvent::End;
                delegate.handle_event(&session, event).await;
                if end {
                    break;
                }
            }

            tracing::debug!(connection = %id, "Transport event handler stopped");
        });
    }

    async fn handle_event(&self, session: &Arc<dyn TransportHandle>, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected(session).await,
            TransportEvent::Reconnecting => self.on_reconnecting(session).await,
            TransportEvent::Error(reason) => self.on_error(session, &reason),
            TransportEvent::Close(reason) => self.on_close(session, reason.as_deref()),
            TransportEvent::End => self.on_end(session),
            TransportEvent::Message(packet) => self.on_message(session, packet),
        }
    }

    async fn on_connected(&self, session: &Arc<dyn TransportHandle>) {
        let (role, scope, token, restore, handle) = {
            let mut state = self.state.lock();
            if !owns(&state, session) {
                return;
            }
            let reconnected = matches!(state.snapshot.status, ConnectionStatus::Reconnecting { .. });
            state.snapshot.status = ConnectionStatus::Connected;
            state.snapshot.retry_count = 0;
            self.broadcast(&state);

            let restore: Vec<(String, SubscribeOptions)> = if reconnected && state.resubscribe {
                state
                    .snapshot
                    .subscriptions
                    .iter()
                    .filter(|(_, active)| **active)
                    .map(|(topic, _)| {
                        let opts = state
                            .config
                            .subscription(topic)
                            .map(|s| s.opts)
                            .unwrap_or_default();
                        (topic.clone(), opts)
                    })
                    .collect()
            } else {
                Vec::new()
            };
            (
                state.config.role,
                state.config.scope(),
                state.connected_token.take(),
                restore,
                state.handle.clone(),
            )
        };

        tracing::info!(connection = %self.id, "Connected");
        self.context.gate.release();
        self.context.notifier.notify_done("Connected");
        if role == Role::Thing {
            self.context
                .events
                .publish(ThingEvent::connected(scope, self.id, token));
        }

        if let Some(handle) = handle
            && !restore.is_empty()
        {
            tracing::debug!(connection = %self.id, count = restore.len(), "Restoring subscriptions");
            if let Err(e) = handle.subscribe(restore).await {
                tracing::warn!(connection = %self.id, error = %e, "Failed to restore subscriptions");
            }
        }
    }

    async fn on_reconnecting(&self, session: &Arc<dyn TransportHandle>) {
        let attempt = {
            let mut state = self.state.lock();
            if !owns(&state, session) {
                return;
            }
            if state.snapshot.retry_count < MAX_RECONNECT_ATTEMPTS {
                state.snapshot.retry_count += 1;
                let attempt = state.snapshot.retry_count;
                state.snapshot.status = ConnectionStatus::Reconnecting { attempt };
                self.broadcast(&state);
                Some(attempt)
            } else {
                None
            }
        };

        match attempt {
            Some(attempt) => {
                tracing::info!(connection = %self.id, attempt, "Reconnecting");
                self.context.gate.hold();
                self.context.notifier.notify_warn("reconnecting...");
            }
            None => {
                tracing::warn!(
                    connection = %self.id,
                    attempts = MAX_RECONNECT_ATTEMPTS,
                    "Giving up reconnecting"
                );
                self.context.gate.release();
                if self.disconnect().await.is_ok() {
                    let mut state = self.state.lock();
                    state.snapshot.retry_count = 0;
                    self.broadcast(&state);
                }
            }
        }
    }

    fn on_error(&self, session: &Arc<dyn TransportHandle>, reason: &str) {
        {
            let state = self.state.lock();
            if !owns(&state, session) {
                return;
            }
            self.broadcast(&state);
            self.context.gate.release();
        }
        tracing::warn!(connection = %self.id, error = %reason, "Transport error");
        self.context.notifier.notify_fail(reason);
    }

    fn on_close(&self, session: &Arc<dyn TransportHandle>, reason: Option<&str>) {
        {
            let mut state = self.state.lock();
            if !owns(&state, session) {
                return;
            }
            if state.snapshot.status.is_connected() {
                state.snapshot.status = ConnectionStatus::Disconnected;
            }
            self.broadcast(&state);
            self.context.gate.release();
        }
        tracing::debug!(connection = %self.id, reason = ?reason, "Session closed by transport");
        if let Some(reason) = reason {
            self.context.notifier.notify_fail(reason);
        }
    }

    fn on_end(&self, session: &Arc<dyn TransportHandle>) {
        let (role, scope) = {
            let mut state = self.state.lock();
            if !owns(&state, session) {
                return;
            }
            state.handle = None;
            state.snapshot.status = ConnectionStatus::Disconnected;
            state.snapshot.subscriptions.clear();
            self.broadcast(&state);
            self.context.gate.release();
            (state.config.role, state.config.scope())
        };

        tracing::info!(connection = %self.id, "Disconnected");
        if role == Role::Thing {
            self.context
                .events
                .publish(ThingEvent::disconnected(scope, self.id));
        }
        self.context.notifier.notify_done("Disconnected");
    }

    fn on_message(&self, session: &Arc<dyn TransportHandle>, packet: InboundPacket) {
        let mode = {
            let state = self.state.lock();
            if !owns(&state, session) {
                return;
            }
            state.snapshot.render_mode
        };
        let payload = payload::decode(&packet.payload, mode, self.context.notifier.as_ref());
        tracing::trace!(connection = %self.id, topic = %packet.topic, "Message received");

        let scope = {
            let mut state = self.state.lock();
            let message = Message::new(
                Direction::In,
                &packet.topic,
                payload,
                packet.qos,
                packet.retain,
                packet.properties,
            );
            self.push_message(&mut state, message);
            self.broadcast(&state);
            state.config.scope()
        };
        self.context
            .events
            .publish(ThingEvent::message_in(scope, self.id, packet.topic));
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn broadcast(&self, state: &DelegateState) {
        self.snapshot_tx.send_replace(state.snapshot.clone());
    }

    fn push_message(&self, state: &mut DelegateState, message: Message) {
        let outbound = message.is_outbound();
        let messages = &mut state.snapshot.messages;
        messages.push(message);
        if let Some(limit) = self.context.settings.snapshot_log_limit {
            let excess = messages.len().saturating_sub(limit);
            messages.drain(..excess);
        }

        if outbound || self.context.focus.is_focused(self.id) {
            state.snapshot.unread = 0;
        } else {
            state.snapshot.unread += 1;
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed);
        }
        Ok(())
    }

    fn connected_handle(&self) -> Result<Arc<dyn TransportHandle>> {
        let handle = {
            let state = self.state.lock();
            state
                .handle
                .clone()
                .filter(|_| state.snapshot.status.is_connected())
        };
        handle.ok_or_else(|| self.reject(PreconditionError::NotConnected))
    }

    fn reject(&self, error: PreconditionError) -> Error {
        tracing::debug!(connection = %self.id, error = %error, "Operation rejected");
        self.context.notifier.notify_fail(notice(&error));
        Error::Precondition(error)
    }

    fn report(&self, reply: Reply, text: &str) {
        if reply == Reply::Notify {
            self.context.notifier.notify_fail(text);
        }
    }
}

impl std::fmt::Debug for ConnectionDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConnectionDelegate")
            .field("id", &self.id)
            .field("name", &state.config.name)
            .field("status", &state.snapshot.status)
            .field("retry_count", &state.snapshot.retry_count)
            .finish_non_exhaustive()
    }
}
