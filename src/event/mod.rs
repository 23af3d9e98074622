// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-session event bus.
//!
//! Connection delegates raise [`ThingEvent`]s whenever a thing-role session
//! connects or ends, and whenever any session sends or receives a message.
//! Any number of listeners can subscribe through the [`EventBus`], which is
//! backed by a tokio broadcast channel.
//!
//! # Examples
//!
//! ```
//! use tio_console::event::{ConnectionId, EventBus, ThingEvent, ThingScope};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ThingEvent::connected(
//!     ThingScope::Thing("thermostat-1".into()),
//!     ConnectionId::new(),
//!     None,
//! ));
//! ```

mod connection_id;
mod event_bus;
mod thing_event;

pub use connection_id::ConnectionId;
pub use event_bus::{DEFAULT_CHANNEL_CAPACITY, EventBus};
pub use thing_event::{ThingEvent, ThingEventKind, ThingScope};
