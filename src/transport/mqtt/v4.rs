// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT 3.1.1 client. Properties have no wire form here and are dropped.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, NetworkOptions, Outgoing,
    Packet, SubscribeFilter, SubscribeReasonCode,
};

use super::{
    EventSource, MAX_PACKET_SIZE, MqttClient, Polled, REQUEST_CAPACITY, broker, client_id,
    session_transport, validate,
};
use crate::config::{ClientOptions, PublishOptions, QoS, SubscribeOptions};
use crate::error::TransportError;
use crate::transport::{InboundPacket, SUBACK_FAILURE};

fn to_rumqttc_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

fn from_rumqttc_qos(qos: rumqttc::QoS) -> QoS {
    match qos {
        rumqttc::QoS::AtMostOnce => QoS::AtMostOnce,
        rumqttc::QoS::AtLeastOnce => QoS::AtLeastOnce,
        rumqttc::QoS::ExactlyOnce => QoS::ExactlyOnce,
    }
}

pub(super) fn client(options: &ClientOptions) -> Result<(AsyncClient, EventLoop), TransportError> {
    let (client, mut event_loop) = AsyncClient::new(mqtt_options(options)?, REQUEST_CAPACITY);

    let mut network = NetworkOptions::new();
    network.set_connection_timeout(options.connect_timeout.as_secs().max(1));
    event_loop.set_network_options(network);

    Ok((client, event_loop))
}

fn mqtt_options(options: &ClientOptions) -> Result<MqttOptions, TransportError> {
    validate(options)?;

    let mut mqtt_options = MqttOptions::new(client_id(options), broker(options), options.port);
    mqtt_options.set_keep_alive(options.keepalive.max(Duration::from_secs(1)));
    mqtt_options.set_clean_session(options.clean);
    mqtt_options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

    if let Some(username) = &options.username {
        mqtt_options.set_credentials(username, options.password.as_deref().unwrap_or_default());
    }

    if let Some(will) = &options.will {
        mqtt_options.set_last_will(rumqttc::LastWill::new(
            will.topic.clone(),
            will.payload.clone().into_bytes(),
            to_rumqttc_qos(will.qos),
            will.retain,
        ));
        if will.properties.is_some() {
            tracing::debug!("Will properties are not sent over MQTT 3.1.1");
        }
    }

    if options.properties.is_some() {
        tracing::debug!("Connect properties are not sent over MQTT 3.1.1");
    }

    if let Some(transport) = session_transport(options)? {
        mqtt_options.set_transport(transport);
    }

    Ok(mqtt_options)
}

#[async_trait]
impl EventSource for EventLoop {
    async fn next(&mut self) -> Result<Polled, String> {
        let event = self.poll().await.map_err(|e| e.to_string())?;
        Ok(match event {
            Event::Incoming(Packet::ConnAck(connack)) => {
                if connack.code == ConnectReturnCode::Success {
                    tracing::debug!(?connack, "MQTT session connected");
                    Polled::Connected
                } else {
                    Polled::Refused(format!("{:?}", connack.code))
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                tracing::trace!(topic = %publish.topic, "MQTT message received");
                Polled::Message(InboundPacket {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                    qos: from_rumqttc_qos(publish.qos),
                    retain: publish.retain,
                    properties: None,
                })
            }
            Event::Incoming(Packet::SubAck(suback)) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
                Polled::SubAck(
                    suback
                        .return_codes
                        .iter()
                        .map(|code| match code {
                            SubscribeReasonCode::Success(qos) => from_rumqttc_qos(*qos).level(),
                            SubscribeReasonCode::Failure => SUBACK_FAILURE,
                        })
                        .collect(),
                )
            }
            Event::Incoming(Packet::UnsubAck(unsuback)) => {
                tracing::debug!(?unsuback, "MQTT unsubscription acknowledged");
                Polled::UnsubAck
            }
            Event::Incoming(Packet::Disconnect) => Polled::ClosedByBroker(None),
            Event::Outgoing(Outgoing::Disconnect) => Polled::ClosedByClient,
            _ => Polled::Other,
        })
    }
}

#[async_trait]
impl MqttClient for AsyncClient {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        opts: &PublishOptions,
    ) -> Result<(), TransportError> {
        if opts.properties.is_some() {
            tracing::debug!(topic = %topic, "Publish properties are not sent over MQTT 3.1.1");
        }
        AsyncClient::publish(self, topic, to_rumqttc_qos(opts.qos), opts.retain, payload).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        filters: Vec<(String, SubscribeOptions)>,
    ) -> Result<(), TransportError> {
        let request = filters
            .into_iter()
            .map(|(path, opts)| SubscribeFilter::new(path, to_rumqttc_qos(opts.qos)));
        self.subscribe_many(request).await?;
        Ok(())
    }

    async fn unsubscribe(&self, filter: String) -> Result<(), TransportError> {
        AsyncClient::unsubscribe(self, filter).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        AsyncClient::disconnect(self).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, LastWill as WillOptions, MqttVersion, Protocol};

    fn options(config: ConnectionConfig) -> ClientOptions {
        config
            .with_mqtt_version(MqttVersion::V311)
            .client_options(true)
    }

    #[test]
    fn qos_mapping_round_trips() {
        for qos in [QoS::AtMostOnce, QoS::AtLeastOnce, QoS::ExactlyOnce] {
            assert_eq!(from_rumqttc_qos(to_rumqttc_qos(qos)), qos);
        }
    }

    #[test]
    fn tcp_options() {
        let config = ConnectionConfig::new("127.0.0.1", 1883)
            .with_protocol(Protocol::Mqtt)
            .with_client_id("console")
            .with_credentials("user", "pass")
            .with_keepalive(30);
        let mqtt = mqtt_options(&options(config)).unwrap();

        assert_eq!(mqtt.client_id(), "console");
        assert_eq!(mqtt.broker_address(), ("127.0.0.1".to_string(), 1883));
        assert_eq!(mqtt.keep_alive(), Duration::from_secs(30));
    }

    #[test]
    fn will_is_forwarded() {
        let mut opts = options(ConnectionConfig::new("h", 1883).with_protocol(Protocol::Mqtt));
        opts.will = Some(WillOptions {
            topic: "things/1/will".to_string(),
            payload: "gone".to_string(),
            qos: QoS::AtLeastOnce,
            retain: true,
            properties: None,
        });
        let mqtt = mqtt_options(&opts).unwrap();
        assert!(mqtt.last_will().is_some());
    }
}
