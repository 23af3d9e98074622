// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Console-wide settings.
//!
//! Settings can be built in code or read from a TOML file:
//!
//! ```toml
//! auto_resubscribe = true
//! event_capacity = 512
//! snapshot_log_limit = 1000
//! storage_dir = "/var/lib/tio-console"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::event::DEFAULT_CHANNEL_CAPACITY;

/// Directory name under the platform config directory.
const APP_DIR: &str = "tio-console";

/// Settings shared by every session of a console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Restore active subscriptions after an automatic reconnect.
    pub auto_resubscribe: bool,
    /// Capacity of the thing event bus.
    pub event_capacity: usize,
    /// Cap on messages kept per session; unlimited when `None`.
    pub snapshot_log_limit: Option<usize>,
    /// Where connection profiles are stored.
    pub storage_dir: Option<PathBuf>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            auto_resubscribe: true,
            event_capacity: DEFAULT_CHANNEL_CAPACITY,
            snapshot_log_limit: None,
            storage_dir: None,
        }
    }
}

impl ConsoleSettings {
    /// Creates default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid TOML,
    /// or holds an unusable value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml(&contents)?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded console settings");
        Ok(settings)
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid TOML or holds an
    /// unusable value.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.snapshot_log_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "snapshot_log_limit".to_string(),
                message: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }

    /// Sets whether subscriptions are restored after reconnects.
    #[must_use]
    pub fn with_auto_resubscribe(mut self, enabled: bool) -> Self {
        self.auto_resubscribe = enabled;
        self
    }

    /// Sets the event bus capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Caps the number of messages kept per session.
    #[must_use]
    pub fn with_snapshot_log_limit(mut self, limit: usize) -> Self {
        self.snapshot_log_limit = Some(limit);
        self
    }

    /// Sets where connection profiles are stored.
    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Returns the storage directory, falling back to the platform config
    /// directory.
    #[must_use]
    pub fn resolved_storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join(APP_DIR)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let settings = ConsoleSettings::default();
        assert!(settings.auto_resubscribe);
        assert_eq!(settings.event_capacity, 256);
        assert_eq!(settings.snapshot_log_limit, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let settings = ConsoleSettings::from_toml("auto_resubscribe = false\nsnapshot_log_limit = 10").unwrap();
        assert!(!settings.auto_resubscribe);
        assert_eq!(settings.snapshot_log_limit, Some(10));
        assert_eq!(settings.event_capacity, 256);
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = ConsoleSettings::from_toml("event_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "event_capacity"));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            ConsoleSettings::from_toml("event_capacity = ["),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storage_dir = \"/tmp/console\"").unwrap();

        let settings = ConsoleSettings::load(file.path()).unwrap();
        assert_eq!(settings.storage_dir, Some(PathBuf::from("/tmp/console")));
        assert_eq!(settings.resolved_storage_dir(), Some(PathBuf::from("/tmp/console")));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            ConsoleSettings::load("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn builders() {
        let settings = ConsoleSettings::new()
            .with_auto_resubscribe(false)
            .with_event_capacity(16)
            .with_snapshot_log_limit(5)
            .with_storage_dir("/data");
        assert!(!settings.auto_resubscribe);
        assert_eq!(settings.event_capacity, 16);
        assert_eq!(settings.snapshot_log_limit, Some(5));
        assert_eq!(settings.storage_dir, Some(PathBuf::from("/data")));
    }
}
