//! Pure routing of MQTT events
//!
//! The session client turns each eventloop event into an [`EventRoute`] and
//! reacts to the route, keeping packet inspection out of the I/O code.

use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{mqttbytes::QoS, Event};
use rumqttc::Outgoing;
use tracing::debug;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                },
                Packet::Disconnect(_) => EventRoute::Disconnected,
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Publish(packet_id)) => EventRoute::PublishSent {
                packet_id: *packet_id,
            },
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Determine QoS level based on message type (pure function)
    pub fn determine_qos_level(retain: bool) -> QoS {
        match retain {
            true => QoS::AtLeastOnce, // Retained state must reach the broker
            false => QoS::AtMostOnce, // Periodic readings are superseded by the next one
        }
    }

    /// Render an inbound payload for logging (pure function)
    pub fn describe_payload(payload: &[u8]) -> String {
        const MAX_LOGGED: usize = 256;
        let text = String::from_utf8_lossy(payload);
        if text.chars().count() > MAX_LOGGED {
            let truncated: String = text.chars().take(MAX_LOGGED).collect();
            format!("{truncated}... ({} bytes)", payload.len())
        } else {
            text.into_owned()
        }
    }

    /// Log a routed event that needs no further handling
    pub fn trace_route(route: &EventRoute) {
        match route {
            EventRoute::InfrastructureEvent(packet) => debug!(packet = %packet, "MQTT event"),
            EventRoute::OutgoingEvent => {}
            other => debug!(route = ?other, "MQTT event"),
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Connection acknowledged by the broker
    ConnectionAcknowledged,
    /// Message received from the broker
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// Broker closed the session
    Disconnected,
    /// A publish packet was written to the socket
    PublishSent { packet_id: u16 },
    /// Our disconnect packet was written to the socket
    DisconnectSent,
    /// Infrastructure event (PingResp, PubAck, etc.)
    InfrastructureEvent(String),
    /// Other outgoing event (handled automatically)
    OutgoingEvent,
}
