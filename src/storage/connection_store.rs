// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Saved connection profiles.

use std::sync::Arc;

use super::KeyValueStore;
use crate::config::ConnectionConfig;
use crate::error::StorageError;

/// Key under which connection profiles are stored.
pub const CONNECTIONS_KEY: &str = "$tiopg/mqtt/connections";

/// Loads and saves the list of connection profiles.
#[derive(Clone)]
pub struct ConnectionStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for ConnectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStore").finish_non_exhaustive()
    }
}

impl ConnectionStore {
    /// Creates a profile store over a key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Loads all saved profiles.
    ///
    /// Missing, unreadable or corrupt data yields an empty list.
    #[must_use]
    pub fn load_connections(&self) -> Vec<ConnectionConfig> {
        let contents = match self.store.get(CONNECTIONS_KEY) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                tracing::debug!("No saved connections");
                return Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read saved connections");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ConnectionConfig>>(&contents) {
            Ok(configs) => {
                tracing::debug!(count = configs.len(), "Loaded saved connections");
                configs
            }
            Err(e) => {
                tracing::warn!(error = %e, "Saved connections are corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Replaces the saved profiles.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the profiles cannot be serialized or
    /// written.
    pub fn save_connections(&self, configs: &[ConnectionConfig]) -> Result<(), StorageError> {
        let contents = serde_json::to_string(configs)?;
        self.store.set(CONNECTIONS_KEY, &contents)
    }
}
