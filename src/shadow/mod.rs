// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shadow documents and delta computation.
//!
//! A shadow pairs what the operator wants a thing to be (`desired`) with what
//! the thing last said it is (`reported`). [`compute_delta`] finds the part of
//! `desired` the thing has not acknowledged yet.

mod delta;
mod document;

pub use delta::{ShadowDelta, ShadowState, compute_delta};
pub use document::{Document, DocumentValue};
