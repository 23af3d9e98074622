// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversion between payload text and wire bytes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::RenderMode;
use crate::error::CodecError;
use crate::notify::Notifier;

/// Converts payload text into the bytes to publish.
///
/// JSON validation is advisory: invalid JSON is reported as a warning and the
/// text is still sent as-is.
///
/// # Errors
///
/// Returns [`CodecError`] if `text` is not valid hexadecimal (for
/// [`RenderMode::Hex`]) or base64 (for [`RenderMode::Base64`]).
pub fn encode(text: &str, mode: RenderMode, notifier: &dyn Notifier) -> Result<Vec<u8>, CodecError> {
    match mode {
        RenderMode::Hex => hex::decode(text).map_err(|e| CodecError::InvalidHex(e.to_string())),
        RenderMode::Base64 => STANDARD
            .decode(text)
            .map_err(|e| CodecError::InvalidBase64(e.to_string())),
        RenderMode::Json => {
            check_json(text, "Publish message", notifier);
            Ok(text.as_bytes().to_vec())
        }
        RenderMode::Plaintext => Ok(text.as_bytes().to_vec()),
    }
}

/// Renders received bytes as text.
///
/// Never fails: invalid UTF-8 is replaced and invalid JSON only produces a
/// warning.
#[must_use]
pub fn decode(bytes: &[u8], mode: RenderMode, notifier: &dyn Notifier) -> String {
    match mode {
        RenderMode::Hex => hex::encode(bytes),
        RenderMode::Base64 => STANDARD.encode(bytes),
        RenderMode::Json => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            check_json(&text, "Received message", notifier);
            text
        }
        RenderMode::Plaintext => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn check_json(text: &str, context: &str, notifier: &dyn Notifier) {
    if let Err(e) = serde_json::from_str::<serde_json::Value>(text) {
        tracing::debug!(error = %e, "{context} is not valid JSON");
        notifier.notify_warn(&format!("{context} {e}"));
    }
}
