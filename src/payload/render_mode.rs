// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload render modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How payload text maps to wire bytes.
///
/// The same mode is used in both directions: text typed for publishing is
/// encoded with it, received bytes are rendered with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Bytes are UTF-8 text.
    #[default]
    Plaintext,
    /// Bytes are UTF-8 text expected to be JSON.
    #[serde(rename = "JSON")]
    Json,
    /// Bytes are written as hexadecimal digits.
    Hex,
    /// Bytes are written as standard base64.
    Base64,
}

impl RenderMode {
    /// All render modes, in display order.
    pub const ALL: [Self; 4] = [Self::Plaintext, Self::Json, Self::Hex, Self::Base64];

    /// Returns the display name of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plaintext => "Plaintext",
            Self::Json => "JSON",
            Self::Hex => "Hex",
            Self::Base64 => "Base64",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown render mode: {s}"))
    }
}
