// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `tio_console` - session core of an IoT device-shadow operator console.
//!
//! The crate keeps one live MQTT session per connection the operator opens,
//! tracks the subscriptions and message history of each session and
//! provides the pure helpers a console needs around them: topic-filter
//! matching, payload rendering and shadow delta computation.
//!
//! # Features
//!
//! - **Sessions**: connect, retry (capped at three attempts), disconnect and
//!   teardown per connection, with one connection attempt in flight at a
//!   time across the console
//! - **Observation**: a `watch` snapshot per session and a broadcast stream
//!   of thing events (connected, disconnected, message in/out)
//! - **Profiles**: saved connection profiles with suggested subscriptions
//!   for the platform's shadow, method and NTP topics
//! - **Payloads**: plaintext, JSON, hex and base64 rendering
//! - **Shadows**: desired-versus-reported delta and merge
//!
//! # Cargo features
//!
//! - `mqtt` (default): the `rumqttc` transport, MQTT 3.1.1 and 5.0
//! - `websocket` (default): WebSocket (`ws`/`wss`) broker URLs, the
//!   protocol new profiles start with
//!
//! # Quick Start
//!
//! ```no_run
//! use tio_console::config::{ConnectionConfig, Protocol};
//! use tio_console::session::{PublishRequest, Registry, Reply};
//! use tio_console::settings::ConsoleSettings;
//!
//! #[tokio::main]
//! async fn main() -> tio_console::Result<()> {
//!     let registry = Registry::from_settings(ConsoleSettings::default())?;
//!
//!     let config = ConnectionConfig::new("broker.local", 1883)
//!         .with_protocol(Protocol::Mqtt)
//!         .with_client_id("console")
//!         .with_credentials("pump-7", "secret");
//!     let id = registry.add_connection(config).await?;
//!
//!     let mut events = registry.subscribe_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{} {:?}", event.scope, event.kind);
//!         }
//!     });
//!
//!     registry.connect(id, None).await?;
//!     registry.subscribe_all(id).await?;
//!     registry
//!         .publish(
//!             id,
//!             PublishRequest::new("$iothub/things/pump-7/shadows/name/default/get", "{}"),
//!             Reply::Notify,
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Shadow Delta
//!
//! ```
//! use serde_json::json;
//! use tio_console::shadow::{Document, ShadowState, compute_delta};
//!
//! let desired = Document::from_json(json!({"light": {"on": true, "level": 80}})).unwrap();
//! let reported = Document::from_json(json!({"light": {"on": true}})).unwrap();
//!
//! let delta = compute_delta(&ShadowState::new(desired, reported));
//! assert!(delta.has_delta);
//! assert_eq!(delta.delta.to_json(), json!({"light": {"level": 80}}));
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod payload;
pub mod session;
pub mod settings;
pub mod shadow;
pub mod storage;
pub mod topic;
pub mod transport;

pub use error::{
    CodecError, ConfigError, Error, PreconditionError, Result, StorageError, TransportError,
};
pub use event::{ConnectionId, EventBus, ThingEvent, ThingEventKind, ThingScope};
pub use notify::{Notifier, TracingNotifier};
pub use session::{
    ConnectionDelegate, ConnectionStatus, DelegateSnapshot, PublishRequest, Registry, Reply,
    SubscribeRequest,
};
