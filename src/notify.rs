// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operator notifications.
//!
//! Sessions report outcomes ("Connected", "Topic(s) Subscribed", ...) through
//! a [`Notifier`]. Presentation is up to the implementation: the default
//! [`TracingNotifier`] logs them, [`ChannelNotifier`] forwards them to a UI
//! task and [`RecordingNotifier`] keeps them for inspection.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// An operation completed.
    Done,
    /// Something needs the operator's attention but nothing failed.
    Warn,
    /// An operation failed.
    Fail,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Warn => f.write_str("warn"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Operator-facing text.
    pub text: String,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(level: NotificationLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Fire-and-forget sink for operator notifications.
///
/// Implementations must not block; they are called while session state is
/// being updated.
pub trait Notifier: Send + Sync {
    /// Reports a completed operation.
    fn notify_done(&self, text: &str);

    /// Reports something that needs attention.
    fn notify_warn(&self, text: &str);

    /// Reports a failed operation.
    fn notify_fail(&self, text: &str);

    /// Reports a notification of the given level.
    fn notify(&self, level: NotificationLevel, text: &str) {
        match level {
            NotificationLevel::Done => self.notify_done(text),
            NotificationLevel::Warn => self.notify_warn(text),
            NotificationLevel::Fail => self.notify_fail(text),
        }
    }
}

/// Routes notifications to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_done(&self, text: &str) {
        tracing::info!(notification = %text, "Done");
    }

    fn notify_warn(&self, text: &str) {
        tracing::warn!(notification = %text, "Warning");
    }

    fn notify_fail(&self, text: &str) {
        tracing::error!(notification = %text, "Failure");
    }
}

/// Forwards notifications over an unbounded channel.
///
/// Notifications sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver that drains it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, level: NotificationLevel, text: &str) {
        if self.sender.send(Notification::new(level, text)).is_err() {
            tracing::trace!(notification = %text, "Notification receiver dropped");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify_done(&self, text: &str) {
        self.send(NotificationLevel::Done, text);
    }

    fn notify_warn(&self, text: &str) {
        self.send(NotificationLevel::Warn, text);
    }

    fn notify_fail(&self, text: &str) {
        self.send(NotificationLevel::Fail, text);
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    recorded: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all notifications recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Notification> {
        self.recorded.lock().clone()
    }

    /// Returns the texts of recorded notifications with the given level.
    #[must_use]
    pub fn texts(&self, level: NotificationLevel) -> Vec<String> {
        self.recorded
            .lock()
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.text.clone())
            .collect()
    }

    /// Returns `true` if a notification with this level and text was
    /// recorded.
    #[must_use]
    pub fn contains(&self, level: NotificationLevel, text: &str) -> bool {
        self.recorded
            .lock()
            .iter()
            .any(|n| n.level == level && n.text == text)
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.recorded.lock().clear();
    }

    fn record(&self, level: NotificationLevel, text: &str) {
        self.recorded.lock().push(Notification::new(level, text));
    }
}

impl Notifier for RecordingNotifier {
    fn notify_done(&self, text: &str) {
        self.record(NotificationLevel::Done, text);
    }

    fn notify_warn(&self, text: &str) {
        self.record(NotificationLevel::Warn, text);
    }

    fn notify_fail(&self, text: &str) {
        self.record(NotificationLevel::Fail, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify_done("Connected");
        notifier.notify_warn("reconnecting...");
        notifier.notify(NotificationLevel::Fail, "Subscription failure");

        let recorded = notifier.recorded();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0], Notification::new(NotificationLevel::Done, "Connected"));
        assert_eq!(recorded[2].level, NotificationLevel::Fail);
        assert!(notifier.contains(NotificationLevel::Warn, "reconnecting..."));
        assert_eq!(notifier.texts(NotificationLevel::Done), vec!["Connected"]);

        notifier.clear();
        assert!(notifier.recorded().is_empty());
    }

    #[tokio::test]
    async fn channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify_fail("Publishing failure");

        let received = rx.recv().await.unwrap();
        assert_eq!(received.level, NotificationLevel::Fail);
        assert_eq!(received.text, "Publishing failure");
    }

    #[test]
    fn channel_notifier_ignores_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify_done("Disconnected");
    }

    #[test]
    fn level_display() {
        assert_eq!(NotificationLevel::Warn.to_string(), "warn");
    }
}
