// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nested shadow documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A value inside a shadow document.
///
/// Objects are always represented as [`DocumentValue::Document`]; a
/// [`DocumentValue::Scalar`] never holds a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentValue {
    /// A nested document.
    Document(Document),
    /// Any non-object JSON value, including arrays and `null`.
    Scalar(Value),
}

impl DocumentValue {
    /// Returns the nested document, if this is one.
    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Scalar(_) => None,
        }
    }

    /// Returns `true` for an explicit `null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Value::Null))
    }
}

impl From<Value> for DocumentValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Document(Document::from(map)),
            other => Self::Scalar(other),
        }
    }
}

impl From<Document> for DocumentValue {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

impl From<DocumentValue> for Value {
    fn from(value: DocumentValue) -> Self {
        match value {
            DocumentValue::Document(doc) => doc.into(),
            DocumentValue::Scalar(scalar) => scalar,
        }
    }
}

/// A key-value document whose values may be documents themselves.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tio_console::shadow::Document;
///
/// let mut reported = Document::from_json(json!({"led": {"on": false}})).unwrap();
/// let patch = Document::from_json(json!({"led": {"on": true}, "fan": 2})).unwrap();
/// reported.apply_patch(&patch);
///
/// assert_eq!(reported.to_json(), json!({"led": {"on": true}, "fan": 2}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(BTreeMap<String, DocumentValue>);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document from a JSON value.
    ///
    /// Returns `None` unless `value` is a JSON object.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from(map)),
            _ => None,
        }
    }

    /// Converts this document into a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.clone().into()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DocumentValue> {
        self.0.get(key)
    }

    /// Stores a value under `key`, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DocumentValue>) -> Option<DocumentValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<DocumentValue> {
        self.0.remove(key)
    }

    /// Returns the number of top-level keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the document has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the top-level entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DocumentValue)> {
        self.0.iter()
    }

    /// Merges `patch` into this document.
    ///
    /// Nested documents merge key by key, `null` removes the key, and any
    /// other value replaces what was there.
    pub fn apply_patch(&mut self, patch: &Document) {
        for (key, value) in &patch.0 {
            match value {
                DocumentValue::Scalar(Value::Null) => {
                    self.0.remove(key);
                }
                DocumentValue::Document(sub_patch) => {
                    if let Some(DocumentValue::Document(existing)) = self.0.get_mut(key) {
                        existing.apply_patch(sub_patch);
                    } else {
                        let mut fresh = Document::new();
                        fresh.apply_patch(sub_patch);
                        self.0.insert(key.clone(), DocumentValue::Document(fresh));
                    }
                }
                DocumentValue::Scalar(scalar) => {
                    self.0.insert(key.clone(), DocumentValue::Scalar(scalar.clone()));
                }
            }
        }
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(key, value)| (key, DocumentValue::from(value)))
                .collect(),
        )
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.0.into_iter().map(|(key, value)| (key, value.into())).collect())
    }
}

impl FromIterator<(String, DocumentValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, DocumentValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
