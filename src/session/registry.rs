// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of connection profiles and their delegates.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, watch};

use crate::catalog::TopicCatalog;
use crate::config::{ConnectionConfig, PublishDefaults, PublishOptions, Role, Subscription};
use crate::error::{Error, Result, StorageError};
use crate::event::{ConnectionId, ThingEvent};
use crate::notify::Notifier;
use crate::payload::RenderMode;
use crate::settings::ConsoleSettings;
use crate::storage::ConnectionStore;
use crate::transport::Connector;

use super::delegate::{ConnectionDelegate, Reply, SessionContext, SubscribeRequest};
use super::snapshot::DelegateSnapshot;

/// A message to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Topic; may be empty when a topic alias is set.
    pub topic: String,
    /// Payload as written by the operator.
    pub payload: String,
    /// How `payload` is written.
    pub payload_type: RenderMode,
    /// Delivery options.
    pub opts: PublishOptions,
}

impl PublishRequest {
    /// Creates a plaintext QoS 0 request.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            payload_type: RenderMode::Plaintext,
            opts: PublishOptions::default(),
        }
    }

    /// Sets how the payload is written.
    #[must_use]
    pub fn with_payload_type(mut self, payload_type: RenderMode) -> Self {
        self.payload_type = payload_type;
        self
    }

    /// Sets the delivery options.
    #[must_use]
    pub fn with_options(mut self, opts: PublishOptions) -> Self {
        self.opts = opts;
        self
    }
}

/// Owns the connection profiles of a console and one delegate per profile.
///
/// All mutation goes through the registry: profile edits are persisted
/// right away and delegates are created, refreshed and destroyed alongside
/// their profiles. Observers read immutable [`DelegateSnapshot`]s and
/// [`ThingEvent`]s.
///
/// The registry is a cheap handle; clones share the same state.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use tio_console::config::{ConnectionConfig, Protocol, SubscribeOptions};
/// use tio_console::notify::TracingNotifier;
/// use tio_console::session::{Registry, Reply, SubscribeRequest};
/// use tio_console::settings::ConsoleSettings;
/// use tio_console::storage::{ConnectionStore, MemoryKeyValueStore};
/// use tio_console::transport::MqttConnector;
///
/// # async fn example() -> tio_console::Result<()> {
/// let registry = Registry::new(
///     ConsoleSettings::default(),
///     ConnectionStore::new(Arc::new(MemoryKeyValueStore::new())),
///     Arc::new(MqttConnector::new()),
///     Arc::new(TracingNotifier),
/// );
///
/// let config = ConnectionConfig::new("broker.local", 1883)
///     .with_protocol(Protocol::Mqtt)
///     .with_credentials("pump-7", "secret");
/// let id = registry.add_connection(config).await?;
///
/// registry.connect(id, None).await?;
/// registry
///     .subscribe(id, SubscribeRequest::single("devices/#", SubscribeOptions::default()), Reply::Notify)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    /// Profiles in operator order.
    connections: Arc<RwLock<Vec<ConnectionConfig>>>,
    /// Delegates, keyed by connection id.
    delegates: Arc<RwLock<HashMap<ConnectionId, Arc<ConnectionDelegate>>>>,
    store: Arc<ConnectionStore>,
    catalog: Arc<TopicCatalog>,
    context: Arc<SessionContext>,
}

impl Registry {
    /// Creates a registry from the saved profiles.
    ///
    /// Every saved profile gets a disconnected delegate and the first one is
    /// focused.
    #[must_use]
    pub fn new(
        settings: ConsoleSettings,
        store: ConnectionStore,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let context = Arc::new(SessionContext::new(settings, connector, notifier));
        let connections = store.load_connections();

        let delegates: HashMap<_, _> = connections
            .iter()
            .map(|config| {
                (
                    config.id,
                    ConnectionDelegate::new(config.clone(), Arc::clone(&context)),
                )
            })
            .collect();
        context.focus.set(connections.first().map(|c| c.id));
        tracing::debug!(count = connections.len(), "Registry initialized");

        Self {
            connections: Arc::new(RwLock::new(connections)),
            delegates: Arc::new(RwLock::new(delegates)),
            store: Arc::new(store),
            catalog: Arc::new(TopicCatalog::builtin()),
            context,
        }
    }

    /// Creates a registry that stores profiles under the settings' storage
    /// directory, connects with `rumqttc` and logs notifications.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the settings are invalid or no storage
    /// directory can be determined.
    #[cfg(feature = "mqtt")]
    pub fn from_settings(settings: ConsoleSettings) -> Result<Self> {
        settings.validate()?;
        let dir = settings
            .resolved_storage_dir()
            .ok_or_else(|| crate::error::ConfigError::Invalid {
                field: "storage_dir".to_string(),
                message: "no storage directory available on this platform".to_string(),
            })?;
        let store = ConnectionStore::new(Arc::new(crate::storage::FileKeyValueStore::new(dir)));
        Ok(Self::new(
            settings,
            store,
            Arc::new(crate::transport::MqttConnector::new()),
            Arc::new(crate::notify::TracingNotifier),
        ))
    }

    /// Replaces the topic catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: TopicCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Returns the topic catalog.
    #[must_use]
    pub fn catalog(&self) -> &TopicCatalog {
        &self.catalog
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to thing events of every connection.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ThingEvent> {
        self.context.events.subscribe()
    }

    /// Returns the number of event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.context.events.subscriber_count()
    }

    // =========================================================================
    // Delegates
    // =========================================================================

    /// Returns the delegate for `id`, creating it from `config` if there is
    /// none.
    ///
    /// Returns `None` if no delegate exists and no config is given.
    pub async fn get_or_create(
        &self,
        id: ConnectionId,
        config: Option<ConnectionConfig>,
    ) -> Option<Arc<ConnectionDelegate>> {
        if let Some(delegate) = self.delegates.read().await.get(&id) {
            return Some(Arc::clone(delegate));
        }
        let mut config = config?;
        config.id = id;

        let mut delegates = self.delegates.write().await;
        let delegate = delegates
            .entry(id)
            .or_insert_with(|| ConnectionDelegate::new(config, Arc::clone(&self.context)));
        Some(Arc::clone(delegate))
    }

    /// Returns the delegate for `id`.
    pub async fn delegate(&self, id: ConnectionId) -> Option<Arc<ConnectionDelegate>> {
        self.delegates.read().await.get(&id).cloned()
    }

    /// Closes and forgets the delegate for `id`.
    ///
    /// Returns `true` if a delegate existed.
    pub async fn destroy(&self, id: ConnectionId) -> bool {
        let removed = self.delegates.write().await.remove(&id);
        match removed {
            Some(delegate) => {
                delegate.destroy().await;
                tracing::debug!(connection = %id, "Delegate removed");
                true
            }
            None => false,
        }
    }

    /// Returns the delegate for a saved profile, creating it if needed.
    async fn resolve(&self, id: ConnectionId) -> Result<Arc<ConnectionDelegate>> {
        let config = self.connection(id).await;
        self.get_or_create(id, config)
            .await
            .ok_or(Error::ConnectionNotFound(id))
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Adds a profile under a fresh id and returns the id.
    ///
    /// Thing-role profiles without subscriptions start out with the
    /// catalog's suggested topics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the profiles cannot be saved. The
    /// profile is added either way.
    pub async fn add_connection(&self, mut config: ConnectionConfig) -> Result<ConnectionId> {
        let id = ConnectionId::new();
        config.id = id;
        if config.role == Role::Thing && config.subscriptions.is_empty() {
            config.subscriptions = self.catalog.suggested_for_thing(&config.username);
        }

        let saved = {
            let mut connections = self.connections.write().await;
            connections.push(config.clone());
            self.save(&connections)
        };
        self.get_or_create(id, Some(config)).await;
        tracing::info!(connection = %id, "Connection added");

        saved?;
        Ok(id)
    }

    /// Replaces a profile, keeping its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids and
    /// [`Error::Storage`] if the profiles cannot be saved.
    pub async fn update_connection(&self, config: ConnectionConfig) -> Result<()> {
        let id = config.id;
        let saved = {
            let mut connections = self.connections.write().await;
            let slot = connections
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(Error::ConnectionNotFound(id))?;
            *slot = config.clone();
            self.save(&connections)
        };
        if let Some(delegate) = self.delegate(id).await {
            delegate.set_config(config);
        }
        tracing::debug!(connection = %id, "Connection updated");

        saved?;
        Ok(())
    }

    /// Removes a profile and destroys its delegate.
    ///
    /// Focus moves to the first remaining profile, or to none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids and
    /// [`Error::Storage`] if the profiles cannot be saved.
    pub async fn remove_connection(&self, id: ConnectionId) -> Result<()> {
        let (saved, first) = {
            let mut connections = self.connections.write().await;
            let index = connections
                .iter()
                .position(|c| c.id == id)
                .ok_or(Error::ConnectionNotFound(id))?;
            connections.remove(index);
            (self.save(&connections), connections.first().map(|c| c.id))
        };

        match first {
            Some(first) => self.select(first).await?,
            None => self.context.focus.set(None),
        }
        self.destroy(id).await;
        tracing::info!(connection = %id, "Connection removed");

        saved?;
        Ok(())
    }

    /// Returns every profile in order.
    pub async fn connections(&self) -> Vec<ConnectionConfig> {
        self.connections.read().await.clone()
    }

    /// Returns the profile with this id.
    pub async fn connection(&self, id: ConnectionId) -> Option<ConnectionConfig> {
        self.connections
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// Returns the profiles using this client id.
    pub async fn connections_by_client_id(&self, client_id: &str) -> Vec<ConnectionConfig> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|c| c.client_id == client_id)
            .cloned()
            .collect()
    }

    /// Updates a profile in place and saves all profiles.
    async fn modify_connection(
        &self,
        id: ConnectionId,
        change: impl FnOnce(&mut ConnectionConfig),
    ) -> Result<()> {
        let (config, saved) = {
            let mut connections = self.connections.write().await;
            let Some(config) = connections.iter_mut().find(|c| c.id == id) else {
                return Err(Error::ConnectionNotFound(id));
            };
            change(config);
            let config = config.clone();
            (config, self.save(&connections))
        };
        if let Some(delegate) = self.delegate(id).await {
            delegate.set_config(config);
        }

        saved?;
        Ok(())
    }

    fn save(&self, connections: &[ConnectionConfig]) -> std::result::Result<(), StorageError> {
        let saved = self.store.save_connections(connections);
        if let Err(e) = &saved {
            tracing::error!(error = %e, "Failed to save connections");
        }
        saved
    }

    // =========================================================================
    // Focus
    // =========================================================================

    /// Focuses a connection and marks its messages as read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids.
    pub async fn select(&self, id: ConnectionId) -> Result<()> {
        let delegate = self.resolve(id).await?;
        self.context.focus.set(Some(id));
        delegate.read();
        Ok(())
    }

    /// Returns the focused connection.
    #[must_use]
    pub fn focused(&self) -> Option<ConnectionId> {
        self.context.focus.current()
    }

    /// Returns `true` while a connection attempt is in flight.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.context.gate.is_held()
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Connects a saved profile.
    ///
    /// Returns `Ok(false)` without doing anything while another connection
    /// attempt is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids and the
    /// delegate's error if the session cannot be opened.
    pub async fn connect(
        &self,
        id: ConnectionId,
        connected_token: Option<String>,
    ) -> Result<bool> {
        if self.is_connecting() {
            return Ok(false);
        }
        let config = self.connection(id).await.ok_or(Error::ConnectionNotFound(id))?;
        let delegate = self.resolve(id).await?;
        delegate.connect(config, connected_token).await
    }

    /// Disconnects a profile.
    ///
    /// Returns `Ok(false)` without doing anything while a connection attempt
    /// is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids and the
    /// delegate's error if the session cannot be closed.
    pub async fn disconnect(&self, id: ConnectionId) -> Result<bool> {
        if self.is_connecting() {
            return Ok(false);
        }
        self.resolve(id).await?.disconnect().await?;
        Ok(true)
    }

    /// Publishes a message and remembers its QoS and retain flag on the
    /// profile.
    ///
    /// # Errors
    ///
    /// Returns the delegate's error, or [`Error::Storage`] if the profile
    /// cannot be saved afterwards.
    pub async fn publish(
        &self,
        id: ConnectionId,
        request: PublishRequest,
        reply: Reply,
    ) -> Result<()> {
        let delegate = self.resolve(id).await?;
        delegate
            .publish(
                &request.topic,
                &request.payload,
                request.payload_type,
                &request.opts,
                reply,
            )
            .await?;

        let defaults = PublishDefaults {
            qos: request.opts.qos,
            retain: request.opts.retain,
        };
        self.modify_connection(id, |config| config.publish_defaults = defaults)
            .await
    }

    /// Subscribes and declares the filters on the profile.
    ///
    /// Filters already declared get the new options. New filters are
    /// declared as kept subscriptions with the requested options; a filter
    /// matching a catalog entry takes that entry's name and defaults
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns the delegate's error, or [`Error::Storage`] if the profile
    /// cannot be saved afterwards.
    pub async fn subscribe(
        &self,
        id: ConnectionId,
        request: SubscribeRequest,
        reply: Reply,
    ) -> Result<()> {
        let delegate = self.resolve(id).await?;
        let filters = request.filters();
        delegate.subscribe(request, reply).await?;

        let thing_id = delegate.thing_id();
        let catalog = &self.catalog;
        self.modify_connection(id, |config| {
            for (topic, opts) in filters {
                config.upsert_subscription(&topic, opts, || {
                    catalog.lookup(&thing_id, &topic).map_or_else(
                        || Subscription::new(topic.clone(), opts),
                        |template| template.subscription(&thing_id),
                    )
                });
            }
        })
        .await
    }

    /// Unsubscribes from filters. Declared subscriptions are kept.
    ///
    /// # Errors
    ///
    /// Returns the delegate's error.
    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        topics: Vec<String>,
        reply: Reply,
    ) -> Result<()> {
        self.resolve(id).await?.unsubscribe(topics, reply).await
    }

    /// Subscribes every declared filter that is not active yet.
    ///
    /// # Errors
    ///
    /// Returns the error of the subscribe request.
    pub async fn subscribe_all(&self, id: ConnectionId) -> Result<()> {
        let delegate = self.resolve(id).await?;
        let config = self.connection(id).await.ok_or(Error::ConnectionNotFound(id))?;
        let live = delegate.snapshot().subscriptions;

        let pending: BTreeMap<_, _> = config
            .subscriptions
            .iter()
            .filter(|s| !live.get(&s.topic).copied().unwrap_or(false))
            .map(|s| (s.topic.clone(), s.opts))
            .collect();
        if pending.is_empty() {
            self.context
                .notifier
                .notify_warn("All configured subscriptions have already been subscribed.");
            return Ok(());
        }

        match self.subscribe(id, SubscribeRequest::Map(pending), Reply::Caller).await {
            Ok(()) => {
                self.context
                    .notifier
                    .notify_done("All configured subscriptions have been subscribed.");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Subscribe all failed");
                if !matches!(e, Error::Precondition(_)) {
                    self.context.notifier.notify_fail("subscribe topics failed.");
                }
                Err(e)
            }
        }
    }

    /// Unsubscribes every active filter.
    ///
    /// # Errors
    ///
    /// Returns the error of the unsubscribe request.
    pub async fn unsubscribe_all(&self, id: ConnectionId) -> Result<()> {
        let delegate = self.resolve(id).await?;
        let active: Vec<String> = delegate
            .snapshot()
            .active_subscriptions()
            .into_iter()
            .map(str::to_string)
            .collect();
        if active.is_empty() {
            self.context
                .notifier
                .notify_warn("None of subscriptions need to be unsubscribed.");
            return Ok(());
        }

        match delegate.unsubscribe(active, Reply::Caller).await {
            Ok(()) => {
                self.context
                    .notifier
                    .notify_done("All subscriptions have been unsubscribed.");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Unsubscribe all failed");
                if !matches!(e, Error::Precondition(_)) {
                    self.context.notifier.notify_fail("unsubscribe topics failed.");
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Local state
    // =========================================================================

    /// Empties a connection's message log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids.
    pub async fn clear_messages(&self, id: ConnectionId) -> Result<()> {
        self.resolve(id).await?.clear();
        Ok(())
    }

    /// Changes how a connection renders received payloads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids.
    pub async fn set_render_mode(&self, id: ConnectionId, mode: RenderMode) -> Result<()> {
        self.resolve(id).await?.set_render_mode(mode);
        Ok(())
    }

    /// Drops a filter from a connection's live subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionNotFound`] for unknown ids.
    pub async fn forget_topic(&self, id: ConnectionId, filter: &str) -> Result<()> {
        self.resolve(id).await?.forget_topic(filter);
        Ok(())
    }

    /// Watches a connection's snapshots.
    pub async fn watch(&self, id: ConnectionId) -> Option<watch::Receiver<DelegateSnapshot>> {
        self.delegate(id).await.map(|d| d.watch())
    }

    /// Returns the snapshot of every profile's delegate, in profile order.
    pub async fn snapshots(&self) -> Vec<DelegateSnapshot> {
        let ids: Vec<ConnectionId> = self.connections.read().await.iter().map(|c| c.id).collect();
        let delegates = self.delegates.read().await;
        ids.iter()
            .filter_map(|id| delegates.get(id).map(|d| d.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{Protocol, QoS, SubscribeOptions};
    use crate::event::{ThingEventKind, ThingScope};
    use crate::notify::{NotificationLevel, RecordingNotifier};
    use crate::session::ConnectionStatus;
    use crate::storage::{KeyValueStore, MemoryKeyValueStore};
    use crate::transport::fake::FakeConnector;

    struct Harness {
        registry: Registry,
        connector: Arc<FakeConnector>,
        notifier: Arc<RecordingNotifier>,
        kv: Arc<MemoryKeyValueStore>,
    }

    fn harness_with(kv: Arc<MemoryKeyValueStore>) -> Harness {
        let connector = FakeConnector::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = Registry::new(
            ConsoleSettings::default(),
            ConnectionStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>),
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        );
        Harness {
            registry,
            connector,
            notifier,
            kv,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryKeyValueStore::new()))
    }

    fn device_config(thing_id: &str) -> ConnectionConfig {
        ConnectionConfig::new("broker", 1883)
            .with_protocol(Protocol::Mqtt)
            .with_client_id("console")
            .with_credentials(thing_id, "secret")
    }

    async fn wait_until(
        registry: &Registry,
        id: ConnectionId,
        predicate: impl Fn(&DelegateSnapshot) -> bool,
    ) -> DelegateSnapshot {
        let mut rx = registry.watch(id).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for snapshot")
            .expect("snapshot channel closed");
        snapshot.clone()
    }

    async fn connect(harness: &Harness, id: ConnectionId) {
        assert!(harness.registry.connect(id, None).await.unwrap());
        harness.connector.last().unwrap().connected();
        wait_until(&harness.registry, id, |s| s.status.is_connected()).await;
    }

    #[tokio::test]
    async fn get_or_create_returns_same_instance_until_destroyed() {
        let harness = harness();
        let id = ConnectionId::new();
        let config = device_config("t1");

        let first = harness.registry.get_or_create(id, Some(config.clone())).await.unwrap();
        let second = harness.registry.get_or_create(id, Some(config)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.id(), id);

        assert!(harness.registry.destroy(id).await);
        assert!(first.is_destroyed());
        assert!(harness.registry.get_or_create(id, None).await.is_none());
        assert!(!harness.registry.destroy(id).await);
    }

    #[tokio::test]
    async fn initializes_from_saved_profiles() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let saved = vec![device_config("a"), device_config("b")];
        ConnectionStore::new(Arc::clone(&kv) as Arc<dyn KeyValueStore>)
            .save_connections(&saved)
            .unwrap();

        let harness = harness_with(kv);
        let snapshots = harness.registry.snapshots().await;
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|s| s.status == ConnectionStatus::Disconnected));
        assert_eq!(harness.registry.focused(), Some(saved[0].id));
        assert_eq!(harness.connector.open_count(), 0);
    }

    #[tokio::test]
    async fn add_connection_assigns_id_and_suggestions() {
        let harness = harness();
        let mut config = device_config("pump-7");
        let original_id = config.id;
        config.name = "Pump".to_string();

        let id = harness.registry.add_connection(config).await.unwrap();
        assert_ne!(id, original_id);

        let saved = harness.registry.connection(id).await.unwrap();
        assert_eq!(saved.subscriptions.len(), 7);
        assert!(saved.subscriptions.iter().all(|s| s.topic.contains("/things/pump-7/")));
        assert!(harness.registry.delegate(id).await.is_some());

        let stored = ConnectionStore::new(Arc::clone(&harness.kv) as Arc<dyn KeyValueStore>)
            .load_connections();
        assert_eq!(stored, vec![saved]);

        let server = device_config("").with_role(Role::Server);
        let id = harness.registry.add_connection(server).await.unwrap();
        assert!(harness.registry.connection(id).await.unwrap().subscriptions.is_empty());
    }

    #[tokio::test]
    async fn update_and_lookup_profiles() {
        let harness = harness();
        let id = harness.registry.add_connection(device_config("t1")).await.unwrap();

        let mut config = harness.registry.connection(id).await.unwrap();
        config.client_id = "renamed".to_string();
        harness.registry.update_connection(config).await.unwrap();

        assert_eq!(harness.registry.connections_by_client_id("renamed").await.len(), 1);
        assert!(harness.registry.connections_by_client_id("console").await.is_empty());
        assert_eq!(
            harness.registry.delegate(id).await.unwrap().config().client_id,
            "renamed"
        );

        let unknown = device_config("t2");
        assert!(matches!(
            harness.registry.update_connection(unknown).await,
            Err(Error::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_connection_moves_focus() {
        let harness = harness();
        let a = harness.registry.add_connection(device_config("a")).await.unwrap();
        let b = harness.registry.add_connection(device_config("b")).await.unwrap();
        harness.registry.select(b).await.unwrap();

        harness.registry.remove_connection(b).await.unwrap();
        assert_eq!(harness.registry.focused(), Some(a));
        assert!(harness.registry.delegate(b).await.is_none());

        harness.registry.remove_connection(a).await.unwrap();
        assert_eq!(harness.registry.focused(), None);
        assert!(harness.registry.connections().await.is_empty());
        assert!(matches!(
            harness.registry.remove_connection(a).await,
            Err(Error::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn connect_is_global_single_flight() {
        let harness = harness();
        let a = harness.registry.add_connection(device_config("a")).await.unwrap();
        let b = harness.registry.add_connection(device_config("b")).await.unwrap();

        assert!(harness.registry.connect(a, None).await.unwrap());
        assert!(harness.registry.is_connecting());
        assert!(!harness.registry.connect(b, None).await.unwrap());
        assert!(!harness.registry.disconnect(a).await.unwrap());
        assert_eq!(harness.connector.open_count(), 1);

        harness.connector.last().unwrap().connected();
        wait_until(&harness.registry, a, |s| s.status.is_connected()).await;
        assert!(harness.registry.connect(b, None).await.unwrap());
    }

    #[tokio::test]
    async fn publish_remembers_options() {
        let harness = harness();
        let id = harness.registry.add_connection(device_config("t1")).await.unwrap();
        connect(&harness, id).await;

        let request = PublishRequest::new("things/t1/cmd", r#"{"on":true}"#)
            .with_payload_type(RenderMode::Json)
            .with_options(PublishOptions::new(QoS::ExactlyOnce, true));
        harness.registry.publish(id, request, Reply::Notify).await.unwrap();

        let config = harness.registry.connection(id).await.unwrap();
        assert_eq!(config.publish_defaults.qos, QoS::ExactlyOnce);
        assert!(config.publish_defaults.retain);
        assert!(harness.notifier.texts(NotificationLevel::Warn).is_empty());
    }

    #[tokio::test]
    async fn subscribe_declares_filters() {
        let harness = harness();
        let mut config = device_config("t1");
        config.subscriptions = vec![Subscription::new("devices/#", SubscribeOptions::default())];
        let id = harness.registry.add_connection(config).await.unwrap();
        connect(&harness, id).await;

        let mut map = BTreeMap::new();
        map.insert("devices/#".to_string(), SubscribeOptions::with_qos(QoS::AtLeastOnce));
        map.insert(
            "$iothub/things/t1/shadows/name/default/get/accepted".to_string(),
            SubscribeOptions::default(),
        );
        map.insert("alerts/+".to_string(), SubscribeOptions::default());
        harness
            .registry
            .subscribe(id, SubscribeRequest::Map(map), Reply::Notify)
            .await
            .unwrap();

        let config = harness.registry.connection(id).await.unwrap();
        assert_eq!(config.subscriptions.len(), 3);
        assert_eq!(config.subscriptions[0].opts.qos, QoS::AtLeastOnce);
        let named = config
            .subscription("$iothub/things/t1/shadows/name/default/get/accepted")
            .unwrap();
        assert_eq!(named.name.as_deref(), Some("Get Accepted"));
        let adhoc = config.subscription("alerts/+").unwrap();
        assert!(adhoc.keep);
        assert_eq!(adhoc.name, None);
    }

    #[tokio::test]
    async fn catalog_filters_are_declared_with_template_defaults() {
        let harness = harness();
        let id = harness.registry.add_connection(device_config("t1")).await.unwrap();
        connect(&harness, id).await;
        let ntp = "$iothub/things/t1/ntp/resp";
        assert!(harness.registry.connection(id).await.unwrap().subscription(ntp).is_none());

        harness
            .registry
            .subscribe(
                id,
                SubscribeRequest::single(ntp, SubscribeOptions::with_qos(QoS::ExactlyOnce)),
                Reply::Caller,
            )
            .await
            .unwrap();

        let declared = harness.registry.connection(id).await.unwrap();
        let declared = declared.subscription(ntp).unwrap();
        assert_eq!(declared.name.as_deref(), Some("Response NTP"));
        assert_eq!(declared.opts, SubscribeOptions::with_qos(QoS::AtMostOnce));
        assert!(declared.keep);
        // The broker still got the requested options
        let sent = harness.connector.last().unwrap().subscribed();
        assert_eq!(sent[0][0].1.qos, QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn subscribe_all_and_unsubscribe_all() {
        let harness = harness();
        let id = harness.registry.add_connection(device_config("t1")).await.unwrap();
        connect(&harness, id).await;

        harness.registry.subscribe_all(id).await.unwrap();
        assert!(harness.notifier.contains(
            NotificationLevel::Done,
            "All configured subscriptions have been subscribed."
        ));
        let snapshot = harness.registry.delegate(id).await.unwrap().snapshot();
        assert_eq!(snapshot.active_subscriptions().len(), 7);
        assert_eq!(harness.connector.last().unwrap().subscribed().len(), 1);

        harness.registry.subscribe_all(id).await.unwrap();
        assert!(harness.notifier.contains(
            NotificationLevel::Warn,
            "All configured subscriptions have already been subscribed."
        ));

        harness.registry.unsubscribe_all(id).await.unwrap();
        assert!(harness.notifier.contains(
            NotificationLevel::Done,
            "All subscriptions have been unsubscribed."
        ));
        harness.registry.unsubscribe_all(id).await.unwrap();
        assert!(harness.notifier.contains(
            NotificationLevel::Warn,
            "None of subscriptions need to be unsubscribed."
        ));
    }

    #[tokio::test]
    async fn subscribe_all_reports_failure() {
        let harness = harness();
        let id = harness.registry.add_connection(device_config("t1")).await.unwrap();
        connect(&harness, id).await;
        harness.connector.fail_subscribe("denied");

        assert!(harness.registry.subscribe_all(id).await.is_err());
        assert!(harness
            .notifier
            .contains(NotificationLevel::Fail, "subscribe topics failed."));
        assert_eq!(harness.notifier.texts(NotificationLevel::Fail).len(), 1);
    }

    #[tokio::test]
    async fn unknown_connection_is_reported() {
        let harness = harness();
        let id = ConnectionId::new();
        assert!(matches!(
            harness.registry.connect(id, None).await,
            Err(Error::ConnectionNotFound(_))
        ));
        assert!(matches!(
            harness.registry.clear_messages(id).await,
            Err(Error::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn unread_message_in_and_read() {
        let harness = harness();
        let a = harness.registry.add_connection(device_config("console")).await.unwrap();
        let device = harness.registry.add_connection(device_config("42")).await.unwrap();
        harness.registry.select(a).await.unwrap();
        let mut events = harness.registry.subscribe_events();

        connect(&harness, device).await;
        harness
            .registry
            .subscribe(
                device,
                SubscribeRequest::single("devices/42/status", SubscribeOptions::default()),
                Reply::Notify,
            )
            .await
            .unwrap();

        harness
            .connector
            .last()
            .unwrap()
            .message("devices/42/status", br#"{"online":true}"#);
        let snapshot = wait_until(&harness.registry, device, |s| s.messages.len() == 1).await;
        assert_eq!(snapshot.unread, 1);

        let message_in = loop {
            let event = events.recv().await.unwrap();
            if event.is_message() {
                break event;
            }
        };
        assert_eq!(message_in.scope, ThingScope::Thing("42".to_string()));
        assert!(message_in.scope.covers("42"));
        assert_eq!(
            message_in.kind,
            ThingEventKind::MessageIn {
                topic: "devices/42/status".to_string()
            }
        );

        harness.registry.select(device).await.unwrap();
        let snapshot = harness.registry.delegate(device).await.unwrap().snapshot();
        assert_eq!(snapshot.unread, 0);
        assert_eq!(snapshot.messages.len(), 1);
    }
}
