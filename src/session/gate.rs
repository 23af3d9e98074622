// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Console-wide coordination between delegates.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::event::ConnectionId;

/// Admits one connection attempt at a time across all delegates.
///
/// A delegate takes the gate when it starts connecting or reconnecting. The
/// gate opens again once the attempt has an outcome: the broker accepts the
/// session, or the transport reports an error, a close or the end.
#[derive(Debug, Default)]
pub struct ConnectGate {
    held: AtomicBool,
}

impl ConnectGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the gate. Returns `false` if an attempt is already in flight.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Marks an attempt in flight, whether or not the gate was open.
    pub fn hold(&self) {
        self.held.store(true, Ordering::Release);
    }

    /// Opens the gate.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Returns `true` while an attempt is in flight.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// The connection the operator is looking at.
#[derive(Debug, Default)]
pub struct Focus {
    current: RwLock<Option<ConnectionId>>,
}

impl Focus {
    /// Returns the focused connection.
    #[must_use]
    pub fn current(&self) -> Option<ConnectionId> {
        *self.current.read()
    }

    /// Returns `true` if `id` is focused.
    #[must_use]
    pub fn is_focused(&self, id: ConnectionId) -> bool {
        self.current() == Some(id)
    }

    /// Focuses a connection, or nothing.
    pub fn set(&self, id: Option<ConnectionId>) {
        *self.current.write() = id;
    }
}
