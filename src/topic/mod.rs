// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic filter matching and topic helpers.
//!
//! Topics and filters are `/`-delimited segment sequences. Filters may use
//! `+` (exactly one level) and a trailing `#` (any number of levels).

mod matcher;

pub use matcher::{contains_wildcard, matches, thing_id_from_topic};
