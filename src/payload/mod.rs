// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload rendering.
//!
//! Operators type and read payloads as text. A [`RenderMode`] decides how
//! that text relates to the bytes on the wire: [`encode`] runs in the publish
//! direction, [`decode`] in the receive direction.
//!
//! # Examples
//!
//! ```
//! use tio_console::notify::TracingNotifier;
//! use tio_console::payload::{RenderMode, decode, encode};
//!
//! let bytes = encode("cafe", RenderMode::Hex, &TracingNotifier).unwrap();
//! assert_eq!(bytes, vec![0xca, 0xfe]);
//! assert_eq!(decode(&bytes, RenderMode::Base64, &TracingNotifier), "yv4=");
//! ```

mod codec;
mod render_mode;

pub use codec::{decode, encode};
pub use render_mode::RenderMode;
