// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription filter matching.

/// Prefix of a shared subscription filter: `$share/<group>/<filter>`.
const SHARED_PREFIX: &str = "$share/";

/// Single-level wildcard segment.
const SINGLE_LEVEL: &str = "+";

/// Multi-level wildcard segment.
const MULTI_LEVEL: &str = "#";

/// Returns `true` if the subscription `filter` matches the concrete `topic`.
///
/// A shared subscription filter (`$share/<group>/...`) matches exactly as
/// the filter after its first two segments would. A `+` segment matches any
/// single topic segment. A trailing `#` matches the parent level and every
/// level below it, so `a/#` matches `a`, `a/b` and `a/b/c`.
///
/// # Examples
///
/// ```
/// use tio_console::topic::matches;
///
/// assert!(matches("a/+/c", "a/b/c"));
/// assert!(!matches("a/+/c", "a/b/b/c"));
/// assert!(matches("a/#", "a/b/c"));
/// assert!(matches("$share/g1/a/+", "a/b"));
/// ```
#[must_use]
pub fn matches(filter: &str, topic: &str) -> bool {
    let filter_segments: Vec<&str> = if filter.starts_with(SHARED_PREFIX) {
        filter.split('/').skip(2).collect()
    } else {
        filter.split('/').collect()
    };
    let topic_segments: Vec<&str> = topic.split('/').collect();

    for (index, segment) in filter_segments.iter().enumerate() {
        if *segment == MULTI_LEVEL {
            return topic_segments.len() + 1 >= filter_segments.len();
        }
        if *segment != SINGLE_LEVEL && topic_segments.get(index) != Some(segment) {
            return false;
        }
    }

    filter_segments.len() == topic_segments.len()
}

/// Returns `true` if `topic` contains a `+` or `#` wildcard character.
///
/// Such a string is a filter, never a publishable topic.
#[must_use]
pub fn contains_wildcard(topic: &str) -> bool {
    topic.contains(['+', '#'])
}

/// Extracts the thing id from a topic of the form `.../things/<id>/...`.
///
/// The id is the longest run of ASCII letters, digits, `_` and `-` directly
/// after the first `things/` that is followed by at least one such character.
///
/// # Examples
///
/// ```
/// use tio_console::topic::thing_id_from_topic;
///
/// assert_eq!(
///     thing_id_from_topic("$iothub/things/pump-7/shadows/name/default/get"),
///     Some("pump-7")
/// );
/// assert_eq!(thing_id_from_topic("devices/42/status"), None);
/// ```
#[must_use]
pub fn thing_id_from_topic(topic: &str) -> Option<&str> {
    const MARKER: &str = "things/";

    topic.match_indices(MARKER).find_map(|(start, _)| {
        let rest = &topic[start + MARKER.len()..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        (len > 0).then(|| &rest[..len])
    })
}
