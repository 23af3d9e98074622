// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT 5.0 client with property and subscribe option support.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::Outgoing;
use rumqttc::v5::mqttbytes::QoS as WireQoS;
use rumqttc::v5::mqttbytes::v5::{
    ConnectProperties as WireConnectProperties, ConnectReturnCode, Filter, LastWill,
    LastWillProperties, Packet, PublishProperties as WirePublishProperties, RetainForwardRule,
    SubscribeReasonCode,
};
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};

use super::{
    EventSource, MAX_PACKET_SIZE, MqttClient, Polled, REQUEST_CAPACITY, broker, client_id,
    session_transport, validate,
};
use crate::config::{
    ClientOptions, ConnectProperties, PublishOptions, PublishProperties, QoS, SubscribeOptions,
    UserProperties, WillProperties,
};
use crate::error::TransportError;
use crate::transport::{InboundPacket, SUBACK_FAILURE};

fn to_wire_qos(qos: QoS) -> WireQoS {
    match qos {
        QoS::AtMostOnce => WireQoS::AtMostOnce,
        QoS::AtLeastOnce => WireQoS::AtLeastOnce,
        QoS::ExactlyOnce => WireQoS::ExactlyOnce,
    }
}

fn from_wire_qos(qos: WireQoS) -> QoS {
    match qos {
        WireQoS::AtMostOnce => QoS::AtMostOnce,
        WireQoS::AtLeastOnce => QoS::AtLeastOnce,
        WireQoS::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn user_properties(properties: Option<&UserProperties>) -> Vec<(String, String)> {
    properties
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn connect_properties(properties: &ConnectProperties) -> WireConnectProperties {
    let mut wire = WireConnectProperties::new();
    wire.session_expiry_interval = properties.session_expiry_interval;
    wire.receive_maximum = properties.receive_maximum;
    wire.max_packet_size = properties.maximum_packet_size;
    wire.topic_alias_max = properties.topic_alias_maximum;
    wire.request_response_info = properties.request_response_information.map(u8::from);
    wire.request_problem_info = properties.request_problem_information.map(u8::from);
    wire.user_properties = user_properties(properties.user_properties.as_ref());
    wire.authentication_method = properties.authentication_method.clone();
    wire.authentication_data = properties
        .authentication_data
        .clone()
        .map(|data| data.into_bytes().into());
    wire
}

fn will_properties(properties: &WillProperties) -> LastWillProperties {
    LastWillProperties {
        delay_interval: properties.will_delay_interval,
        payload_format_indicator: properties.payload_format_indicator.map(u8::from),
        message_expiry_interval: properties.message_expiry_interval,
        content_type: properties.content_type.clone(),
        response_topic: properties.response_topic.clone(),
        correlation_data: properties
            .correlation_data
            .clone()
            .map(|data| data.into_bytes().into()),
        user_properties: user_properties(properties.user_properties.as_ref()),
    }
}

fn publish_properties(properties: &PublishProperties) -> WirePublishProperties {
    WirePublishProperties {
        payload_format_indicator: properties.payload_format_indicator.map(u8::from),
        message_expiry_interval: properties.message_expiry_interval,
        topic_alias: properties.topic_alias,
        response_topic: properties.response_topic.clone(),
        correlation_data: properties
            .correlation_data
            .clone()
            .map(|data| data.into_bytes().into()),
        user_properties: user_properties(properties.user_properties.as_ref()),
        subscription_identifiers: properties
            .subscription_identifier
            .and_then(|id| usize::try_from(id).ok())
            .into_iter()
            .collect(),
        content_type: properties.content_type.clone(),
    }
}

/// Properties of a received message, `None` when it carried none.
fn inbound_properties(wire: WirePublishProperties) -> Option<PublishProperties> {
    let user_properties: UserProperties = wire.user_properties.into_iter().collect();
    PublishProperties {
        payload_format_indicator: wire.payload_format_indicator.map(|flag| flag != 0),
        message_expiry_interval: wire.message_expiry_interval,
        topic_alias: wire.topic_alias,
        response_topic: wire.response_topic,
        correlation_data: wire
            .correlation_data
            .map(|data| String::from_utf8_lossy(&data).into_owned()),
        user_properties: Some(user_properties),
        subscription_identifier: wire
            .subscription_identifiers
            .first()
            .and_then(|id| u32::try_from(*id).ok()),
        content_type: wire.content_type,
    }
    .stripped()
}

fn filter(path: String, opts: &SubscribeOptions) -> Filter {
    Filter {
        path,
        qos: to_wire_qos(opts.qos),
        nolocal: opts.no_local.unwrap_or(false),
        preserve_retain: opts.retain_as_published.unwrap_or(false),
        retain_forward_rule: match opts.retain_handling.unwrap_or(0) {
            1 => RetainForwardRule::OnNewSubscribe,
            2 => RetainForwardRule::Never,
            _ => RetainForwardRule::OnEverySubscribe,
        },
    }
}

pub(super) fn client(options: &ClientOptions) -> Result<(AsyncClient, EventLoop), TransportError> {
    Ok(AsyncClient::new(mqtt_options(options)?, REQUEST_CAPACITY))
}

fn mqtt_options(options: &ClientOptions) -> Result<MqttOptions, TransportError> {
    validate(options)?;

    let mut mqtt_options = MqttOptions::new(client_id(options), broker(options), options.port);
    mqtt_options.set_keep_alive(options.keepalive.max(Duration::from_secs(1)));
    mqtt_options.set_clean_start(options.clean);
    mqtt_options.set_connection_timeout(options.connect_timeout.as_secs().max(1));

    let properties = options.properties.as_ref();
    if let Some(properties) = properties {
        mqtt_options.set_connect_properties(connect_properties(properties));
    }
    // Goes through the connect properties, so it comes after them
    let max_packet_size = properties
        .and_then(|p| p.maximum_packet_size)
        .or(u32::try_from(MAX_PACKET_SIZE).ok());
    mqtt_options.set_max_packet_size(max_packet_size);

    if let Some(username) = &options.username {
        mqtt_options.set_credentials(username, options.password.as_deref().unwrap_or_default());
    }

    if let Some(will) = &options.will {
        mqtt_options.set_last_will(LastWill::new(
            will.topic.clone(),
            will.payload.clone().into_bytes(),
            to_wire_qos(will.qos),
            will.retain,
            will.properties.as_ref().map(will_properties),
        ));
    }

    if let Some(transport) = session_transport(options)? {
        mqtt_options.set_transport(transport);
    }

    Ok(mqtt_options)
}

fn suback_code(code: &SubscribeReasonCode) -> u8 {
    match code {
        SubscribeReasonCode::Success(qos) => from_wire_qos(*qos).level(),
        SubscribeReasonCode::Failure => SUBACK_FAILURE,
        SubscribeReasonCode::Unspecified => 0x80,
        SubscribeReasonCode::ImplementationSpecific => 0x83,
        SubscribeReasonCode::NotAuthorized => 0x87,
        SubscribeReasonCode::TopicFilterInvalid => 0x8F,
        SubscribeReasonCode::PkidInUse => 0x91,
        SubscribeReasonCode::QuotaExceeded => 0x97,
        SubscribeReasonCode::SharedSubscriptionsNotSupported => 0x9E,
        SubscribeReasonCode::SubscriptionIdNotSupported => 0xA1,
        SubscribeReasonCode::WildcardSubscriptionsNotSupported => 0xA2,
    }
}

#[async_trait]
impl EventSource for EventLoop {
    async fn next(&mut self) -> Result<Polled, String> {
        let event = self.poll().await.map_err(|e| e.to_string())?;
        Ok(match event {
            Event::Incoming(Packet::ConnAck(connack)) => {
                if connack.code == ConnectReturnCode::Success {
                    tracing::debug!(?connack, "MQTT 5.0 session connected");
                    Polled::Connected
                } else {
                    Polled::Refused(format!("{:?}", connack.code))
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let topic = String::from_utf8_lossy(&publish.topic).into_owned();
                tracing::trace!(topic = %topic, "MQTT message received");
                Polled::Message(InboundPacket {
                    topic,
                    payload: publish.payload.to_vec(),
                    qos: from_wire_qos(publish.qos),
                    retain: publish.retain,
                    properties: publish.properties.and_then(inbound_properties),
                })
            }
            Event::Incoming(Packet::SubAck(suback)) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
                Polled::SubAck(suback.return_codes.iter().map(suback_code).collect())
            }
            Event::Incoming(Packet::UnsubAck(unsuback)) => {
                tracing::debug!(?unsuback, "MQTT unsubscription acknowledged");
                Polled::UnsubAck
            }
            Event::Incoming(Packet::Disconnect(disconnect)) => {
                let reason = disconnect
                    .properties
                    .and_then(|p| p.reason_string)
                    .unwrap_or_else(|| format!("Disconnected by broker: {:?}", disconnect.reason_code));
                Polled::ClosedByBroker(Some(reason))
            }
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
        let qos = to_wire_qos(opts.qos);
        match &opts.properties {
            Some(properties) => {
                self.publish_with_properties(
                    topic,
                    qos,
                    opts.retain,
                    payload,
                    publish_properties(properties),
                )
                .await?;
            }
            None => AsyncClient::publish(self, topic, qos, opts.retain, payload).await?,
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        filters: Vec<(String, SubscribeOptions)>,
    ) -> Result<(), TransportError> {
        let request = filters
            .into_iter()
            .map(|(path, opts)| filter(path, &opts))
            .collect::<Vec<_>>();
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
