// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live sessions of the console.
//!
//! The [`Registry`] owns the saved connection profiles and one
//! [`ConnectionDelegate`] per profile. A delegate drives one transport
//! session through its lifecycle:
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> Reconnecting
//!                                   |              |
//!                                   v              v
//!                             Disconnecting -> Disconnected
//! ```
//!
//! `Destroyed` is terminal. Only one connection attempt runs at a time
//! across the whole console; a connect requested meanwhile is ignored.
//!
//! Observers watch [`DelegateSnapshot`]s per connection and receive
//! [`ThingEvent`](crate::event::ThingEvent)s for all of them.

mod delegate;
mod gate;
mod registry;
mod snapshot;

pub use delegate::{ConnectionDelegate, MAX_RECONNECT_ATTEMPTS, Reply, SubscribeRequest};
pub use gate::{ConnectGate, Focus};
pub use registry::{PublishRequest, Registry};
pub use snapshot::{ConnectionStatus, DelegateSnapshot, Direction, Message};
