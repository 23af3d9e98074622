// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declared subscriptions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SubscribeOptions;

/// A subscription declared on a connection profile.
///
/// The profile's list says what *should* be subscribed. Whether a filter is
/// active right now is tracked by the session, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Stable identifier of this entry.
    pub id: String,
    /// Display name, set for suggested topics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Topic filter.
    pub topic: String,
    /// Options used when subscribing.
    #[serde(default)]
    pub opts: SubscribeOptions,
    /// Restore this subscription when subscribing all.
    #[serde(default)]
    pub keep: bool,
}

impl Subscription {
    /// Creates a kept subscription with a fresh id.
    #[must_use]
    pub fn new(topic: impl Into<String>, opts: SubscribeOptions) -> Self {
        Self {
            id: new_subscription_id(),
            name: None,
            topic: topic.into(),
            opts,
            keep: true,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets whether the subscription is kept.
    #[must_use]
    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }
}

/// Generates a new subscription entry id.
#[must_use]
pub fn new_subscription_id() -> String {
    Uuid::new_v4().simple().to_string()
}
