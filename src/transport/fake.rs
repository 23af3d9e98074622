// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport for session tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Connector, InboundPacket, TransportEvent, TransportEvents, TransportHandle};
use crate::config::{ClientOptions, PublishOptions, QoS, SubscribeOptions};
use crate::error::TransportError;

/// A published message as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub opts: PublishOptions,
}

#[derive(Debug, Default)]
struct HandleLog {
    published: Vec<Published>,
    subscribed: Vec<Vec<(String, SubscribeOptions)>>,
    unsubscribed: Vec<Vec<String>>,
    ended: usize,
}

/// Failure switches shared by every handle of a connector.
#[derive(Debug, Default)]
struct Failures {
    open: Option<String>,
    publish: Option<String>,
    subscribe: Option<String>,
    unsubscribe: Option<String>,
    end: Option<String>,
    /// Codes granted to the next subscriptions; empty grants the requested QoS.
    granted: Vec<u8>,
}

/// One opened fake session.
#[derive(Debug)]
pub(crate) struct FakeHandle {
    events: mpsc::UnboundedSender<TransportEvent>,
    log: Mutex<HandleLog>,
    failures: Arc<Mutex<Failures>>,
}

impl FakeHandle {
    /// Sends an event as if the transport observed it.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn connected(&self) {
        self.emit(TransportEvent::Connected);
    }

    pub fn message(&self, topic: &str, payload: &[u8]) {
        self.emit(TransportEvent::Message(InboundPacket {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos: QoS::AtMostOnce,
            retain: false,
            properties: None,
        }));
    }

    pub fn published(&self) -> Vec<Published> {
        self.log.lock().published.clone()
    }

    pub fn subscribed(&self) -> Vec<Vec<(String, SubscribeOptions)>> {
        self.log.lock().subscribed.clone()
    }

    pub fn unsubscribed(&self) -> Vec<Vec<String>> {
        self.log.lock().unsubscribed.clone()
    }

    pub fn end_count(&self) -> usize {
        self.log.lock().ended
    }

    /// Whether the consumer of this session's events went away.
    pub fn is_detached(&self) -> bool {
        self.events.is_closed()
    }
}

fn fail(reason: Option<&String>) -> Result<(), TransportError> {
    match reason {
        Some(reason) => Err(TransportError::ConnectionFailed(reason.clone())),
        None => Ok(()),
    }
}

#[async_trait]
impl TransportHandle for FakeHandle {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        opts: &PublishOptions,
    ) -> Result<(), TransportError> {
        fail(self.failures.lock().publish.as_ref())?;
        self.log.lock().published.push(Published {
            topic: topic.to_string(),
            payload,
            opts: opts.clone(),
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        filters: Vec<(String, SubscribeOptions)>,
    ) -> Result<Vec<u8>, TransportError> {
        let granted = {
            let mut failures = self.failures.lock();
            fail(failures.subscribe.as_ref())?;
            std::mem::take(&mut failures.granted)
        };
        let codes = if granted.is_empty() {
            filters.iter().map(|(_, opts)| opts.qos.level()).collect()
        } else {
            granted
        };
        self.log.lock().subscribed.push(filters);
        Ok(codes)
    }

    async fn unsubscribe(&self, filters: Vec<String>) -> Result<(), TransportError> {
        fail(self.failures.lock().unsubscribe.as_ref())?;
        self.log.lock().unsubscribed.push(filters);
        Ok(())
    }

    async fn end(&self) -> Result<(), TransportError> {
        fail(self.failures.lock().end.as_ref())?;
        self.log.lock().ended += 1;
        self.emit(TransportEvent::End);
        Ok(())
    }
}

/// Opens [`FakeHandle`]s and keeps every one of them for inspection.
#[derive(Debug, Default)]
pub(crate) struct FakeConnector {
    handles: Mutex<Vec<Arc<FakeHandle>>>,
    options: Mutex<Vec<ClientOptions>>,
    failures: Arc<Mutex<Failures>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of sessions opened so far.
    pub fn open_count(&self) -> usize {
        self.options.lock().len()
    }

    /// Most recently opened session.
    pub fn last(&self) -> Option<Arc<FakeHandle>> {
        self.handles.lock().last().cloned()
    }

    pub fn handle(&self, index: usize) -> Option<Arc<FakeHandle>> {
        self.handles.lock().get(index).cloned()
    }

    pub fn last_options(&self) -> Option<ClientOptions> {
        self.options.lock().last().cloned()
    }

    pub fn fail_open(&self, reason: &str) {
        self.failures.lock().open = Some(reason.to_string());
    }

    pub fn fail_publish(&self, reason: &str) {
        self.failures.lock().publish = Some(reason.to_string());
    }

    pub fn fail_subscribe(&self, reason: &str) {
        self.failures.lock().subscribe = Some(reason.to_string());
    }

    pub fn fail_unsubscribe(&self, reason: &str) {
        self.failures.lock().unsubscribe = Some(reason.to_string());
    }

    pub fn fail_end(&self, reason: &str) {
        self.failures.lock().end = Some(reason.to_string());
    }

    /// Grants these codes to the next subscribe request.
    pub fn grant(&self, codes: Vec<u8>) {
        self.failures.lock().granted = codes;
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(
        &self,
        options: &ClientOptions,
    ) -> Result<(Arc<dyn TransportHandle>, TransportEvents), TransportError> {
        if let Some(reason) = self.failures.lock().open.clone() {
            return Err(TransportError::ConnectionFailed(reason));
        }
        let (events, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(FakeHandle {
            events,
            log: Mutex::new(HandleLog::default()),
            failures: Arc::clone(&self.failures),
        });
        self.handles.lock().push(Arc::clone(&handle));
        self.options.lock().push(options.clone());
        Ok((handle, rx))
    }
}
