// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT 5.0 `rumqttc` transport.
//!
//! The broker here is a single-connection capture server speaking the v5
//! codec: it acknowledges what a session needs and hands every packet it
//! reads to the test.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use rumqttc::v5::mqttbytes::v5::{
    ConnAck, ConnAckProperties, ConnectReturnCode, Packet, PingResp, PubAck, PubAckReason,
    RetainForwardRule, SubAck, SubscribeReasonCode, UnsubAck, UnsubAckReason,
};
use rumqttc::v5::mqttbytes::{Error as CodecError, QoS as WireQoS};
use tio_console::config::{
    ConnectProperties, ConnectionConfig, MqttVersion, Protocol, PublishOptions,
    PublishProperties, QoS, Role, SubscribeOptions,
};
use tio_console::notify::RecordingNotifier;
use tio_console::session::{DelegateSnapshot, PublishRequest, Registry, Reply, SubscribeRequest};
use tio_console::settings::ConsoleSettings;
use tio_console::storage::{ConnectionStore, MemoryKeyValueStore};
use tio_console::transport::MqttConnector;
use tio_console::ConnectionId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

/// Topic aliases the capture broker accepts.
const BROKER_TOPIC_ALIAS_MAX: u16 = 10;

fn connack() -> Packet {
    Packet::ConnAck(ConnAck {
        session_present: false,
        code: ConnectReturnCode::Success,
        properties: Some(ConnAckProperties {
            session_expiry_interval: None,
            receive_max: None,
            max_qos: None,
            retain_available: None,
            max_packet_size: None,
            assigned_client_identifier: None,
            topic_alias_max: Some(BROKER_TOPIC_ALIAS_MAX),
            reason_string: None,
            user_properties: Vec::new(),
            wildcard_subscription_available: None,
            subscription_identifiers_available: None,
            shared_subscription_available: None,
            server_keep_alive: None,
            response_information: None,
            server_reference: None,
            authentication_method: None,
            authentication_data: None,
        }),
    })
}

fn reply_to(packet: &Packet) -> Option<Packet> {
    match packet {
        Packet::Connect(..) => Some(connack()),
        Packet::Subscribe(subscribe) => Some(Packet::SubAck(SubAck {
            pkid: subscribe.pkid,
            return_codes: subscribe
                .filters
                .iter()
                .map(|filter| SubscribeReasonCode::Success(filter.qos))
                .collect(),
            properties: None,
        })),
        Packet::Unsubscribe(unsubscribe) => Some(Packet::UnsubAck(UnsubAck {
            pkid: unsubscribe.pkid,
            reasons: unsubscribe
                .filters
                .iter()
                .map(|_| UnsubAckReason::Success)
                .collect(),
            properties: None,
        })),
        Packet::Publish(publish) if publish.qos == WireQoS::AtLeastOnce => {
            Some(Packet::PubAck(PubAck {
                pkid: publish.pkid,
                reason: PubAckReason::Success,
                properties: None,
            }))
        }
        Packet::PingReq(_) => Some(Packet::PingResp(PingResp)),
        _ => None,
    }
}

/// Accepts one client and forwards every packet it sends.
async fn start_capture_broker() -> (u16, mpsc::UnboundedReceiver<Packet>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let mut buffer = BytesMut::new();
        loop {
            let packet = match Packet::read(&mut buffer, None) {
                Ok(packet) => packet,
                Err(CodecError::InsufficientBytes(_)) => match stream.read_buf(&mut buffer).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => continue,
                },
                Err(e) => panic!("malformed packet from client: {e:?}"),
            };
            if let Some(reply) = reply_to(&packet) {
                let mut out = BytesMut::new();
                reply.write(&mut out, None).unwrap();
                if stream.write_all(&out).await.is_err() {
                    return;
                }
            }
            if tx.send(packet).is_err() {
                return;
            }
        }
    });

    (port, rx)
}

async fn next_packet(
    rx: &mut mpsc::UnboundedReceiver<Packet>,
    mut predicate: impl FnMut(&Packet) -> bool,
) -> Packet {
    timeout(Duration::from_secs(10), async {
        loop {
            let packet = rx.recv().await.expect("broker stopped");
            if predicate(&packet) {
                return packet;
            }
        }
    })
    .await
    .expect("timed out waiting for packet")
}

fn registry() -> Registry {
    Registry::new(
        ConsoleSettings::default(),
        ConnectionStore::new(Arc::new(MemoryKeyValueStore::new())),
        Arc::new(MqttConnector::new()),
        Arc::new(RecordingNotifier::new()),
    )
}

fn profile(port: u16) -> ConnectionConfig {
    ConnectionConfig::new("127.0.0.1", port)
        .with_protocol(Protocol::Mqtt)
        .with_mqtt_version(MqttVersion::V5)
        .with_role(Role::Server)
        .with_client_id(format!("tio_console_v5_{port}"))
        .with_reconnect(false, 0)
        .with_properties(ConnectProperties {
            receive_maximum: Some(10),
            user_properties: Some(BTreeMap::from([(
                "console".to_string(),
                "tio".to_string(),
            )])),
            ..ConnectProperties::default()
        })
}

async fn connected(registry: &Registry, id: ConnectionId) -> watch::Receiver<DelegateSnapshot> {
    let mut rx = registry.watch(id).await.expect("delegate exists");
    assert!(registry.connect(id, None).await.unwrap());
    timeout(Duration::from_secs(10), rx.wait_for(|s| s.status.is_connected()))
        .await
        .expect("timed out waiting for connection")
        .expect("delegate dropped");
    rx
}

#[tokio::test]
async fn connect_sends_properties() {
    let (port, mut packets) = start_capture_broker().await;
    let registry = registry();
    let id = registry.add_connection(profile(port)).await.unwrap();
    connected(&registry, id).await;

    let Packet::Connect(connect, _, _) =
        next_packet(&mut packets, |p| matches!(p, Packet::Connect(..))).await
    else {
        unreachable!();
    };
    let properties = connect.properties.expect("connect properties");
    assert_eq!(properties.receive_maximum, Some(10));
    assert_eq!(
        properties.user_properties,
        vec![("console".to_string(), "tio".to_string())]
    );
}

#[tokio::test]
async fn publish_with_topic_alias_and_empty_topic() {
    let (port, mut packets) = start_capture_broker().await;
    let registry = registry();
    let id = registry.add_connection(profile(port)).await.unwrap();
    let rx = connected(&registry, id).await;

    let aliased = |topic_alias| PublishProperties {
        topic_alias: Some(topic_alias),
        user_properties: Some(BTreeMap::from([("origin".to_string(), "console".to_string())])),
        ..PublishProperties::default()
    };
    let first = PublishRequest::new("devices/42/command", "on").with_options(
        PublishOptions::new(QoS::AtLeastOnce, false).with_properties(aliased(1)),
    );
    registry.publish(id, first, Reply::Caller).await.unwrap();
    let second = PublishRequest::new("", "off").with_options(
        PublishOptions::new(QoS::AtLeastOnce, false).with_properties(aliased(1)),
    );
    registry.publish(id, second, Reply::Caller).await.unwrap();

    let mut published = Vec::new();
    while published.len() < 2 {
        if let Packet::Publish(publish) =
            next_packet(&mut packets, |p| matches!(p, Packet::Publish(_))).await
        {
            published.push(publish);
        }
    }

    assert_eq!(&published[0].topic[..], b"devices/42/command");
    assert!(published[1].topic.is_empty());
    assert_eq!(&published[1].payload[..], b"off");
    for publish in &published {
        let properties = publish.properties.as_ref().expect("publish properties");
        assert_eq!(properties.topic_alias, Some(1));
        assert_eq!(
            properties.user_properties,
            vec![("origin".to_string(), "console".to_string())]
        );
    }

    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[1].topic, "");
}

#[tokio::test]
async fn subscribe_sends_v5_options() {
    let (port, mut packets) = start_capture_broker().await;
    let registry = registry();
    let id = registry.add_connection(profile(port)).await.unwrap();
    let rx = connected(&registry, id).await;

    let opts = SubscribeOptions {
        qos: QoS::AtLeastOnce,
        no_local: Some(true),
        retain_as_published: Some(true),
        retain_handling: Some(2),
    };
    registry
        .subscribe(id, SubscribeRequest::single("alerts/#", opts), Reply::Caller)
        .await
        .unwrap();
    assert_eq!(rx.borrow().subscriptions.get("alerts/#"), Some(&true));

    let Packet::Subscribe(subscribe) =
        next_packet(&mut packets, |p| matches!(p, Packet::Subscribe(_))).await
    else {
        unreachable!();
    };
    let filter = &subscribe.filters[0];
    assert_eq!(filter.path, "alerts/#");
    assert_eq!(filter.qos, WireQoS::AtLeastOnce);
    assert!(filter.nolocal);
    assert!(filter.preserve_retain);
    assert_eq!(filter.retain_forward_rule, RetainForwardRule::Never);
}
