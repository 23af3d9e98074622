// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection profiles and delivery options.
//!
//! A [`ConnectionConfig`] is the durable, operator-authored description of
//! one connection. [`ConnectionConfig::client_options`] turns it into the
//! [`ClientOptions`] a transport opens a session with.

mod client_options;
mod connection_config;
mod options;
mod subscription;

pub use client_options::{ClientOptions, LastWill, TlsMaterial};
pub use connection_config::{
    CertType, ConnectionConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_KEEPALIVE_SECS,
    DEFAULT_PORT, DEFAULT_RECONNECT_PERIOD_MS, MqttVersion, Protocol, PublishDefaults, Role,
    TlsOptions, WillConfig,
};
pub use options::{
    ConnectProperties, PublishOptions, PublishProperties, QoS, SubscribeOptions, UserProperties,
    WillProperties,
};
pub use subscription::{Subscription, new_subscription_id};
