// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Desired versus reported delta computation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Document, DocumentValue};

/// The desired and reported halves of a thing's shadow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowState {
    /// What the operator wants.
    pub desired: Document,
    /// What the thing last reported.
    pub reported: Document,
}

impl ShadowState {
    /// Creates a shadow state.
    #[must_use]
    pub fn new(desired: Document, reported: Document) -> Self {
        Self { desired, reported }
    }
}

/// The part of `desired` not yet matched by `reported`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowDelta {
    /// `true` if `delta` has at least one key.
    pub has_delta: bool,
    /// The minimal patch that would bring `reported` in line with `desired`.
    pub delta: Document,
}

/// Computes the pending changes of a shadow.
///
/// Only keys of `desired` are visited. A key is part of the delta when the
/// reported side lacks it or holds a different value; nested documents are
/// compared key by key and contribute only their differing sub-tree. A
/// desired `null` for a key the thing never reported is already satisfied.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tio_console::shadow::{Document, ShadowState, compute_delta};
///
/// let state = ShadowState::new(
///     Document::from_json(json!({"b": {"c": 2, "d": 3}})).unwrap(),
///     Document::from_json(json!({"b": {"c": 2}})).unwrap(),
/// );
/// let delta = compute_delta(&state);
///
/// assert!(delta.has_delta);
/// assert_eq!(delta.delta.to_json(), json!({"b": {"d": 3}}));
/// ```
#[must_use]
pub fn compute_delta(state: &ShadowState) -> ShadowDelta {
    let delta = diff(&state.desired, &state.reported);
    ShadowDelta {
        has_delta: !delta.is_empty(),
        delta,
    }
}

fn diff(desired: &Document, reported: &Document) -> Document {
    let mut delta = Document::new();

    for (key, wanted) in desired.iter() {
        let actual = reported.get(key);
        match (wanted, actual) {
            (DocumentValue::Document(sub_desired), Some(DocumentValue::Document(sub_reported))) => {
                let sub_delta = diff(sub_desired, sub_reported);
                if !sub_delta.is_empty() {
                    delta.insert(key.clone(), sub_delta);
                }
            }
            (DocumentValue::Scalar(Value::Null), None) => {}
            (DocumentValue::Scalar(want), Some(DocumentValue::Scalar(have)))
                if scalars_equal(want, have) => {}
            _ => {
                delta.insert(key.clone(), wanted.clone());
            }
        }
    }

    delta
}

/// Strict equality, except that numbers compare by value so `1` equals
/// `1.0`.
#[allow(clippy::float_cmp)]
fn scalars_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
