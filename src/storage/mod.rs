// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence of connection profiles.
//!
//! Profiles are kept as one JSON list under a fixed key of a
//! [`KeyValueStore`]. The file-backed store writes one file per key; the
//! memory store is for tests and ephemeral consoles.

mod connection_store;
mod key_value;

pub use connection_store::{CONNECTIONS_KEY, ConnectionStore};
pub use key_value::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
