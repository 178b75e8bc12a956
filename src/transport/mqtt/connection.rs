//! Pure connection configuration for the MQTT session
//!
//! Broker URL parsing, client id rendering, option building and topic
//! construction. Nothing in here touches the network.

use super::message_handler::MessageHandler;
use crate::transport::{BrokerAddress, SessionError, SessionOptions};
use rumqttc::v5::mqttbytes::v5::LastWill;
use rumqttc::v5::MqttOptions;
use url::Url;

/// Default MQTT port for plain TCP
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Parse `mqtt://host[:port]` into a broker address (pure function)
///
/// Only plain TCP is supported; `mqtts://` is rejected.
pub fn parse_broker_url(broker_url: &str) -> Result<BrokerAddress, SessionError> {
    let url =
        Url::parse(broker_url).map_err(|_| SessionError::InvalidBrokerUrl(broker_url.to_string()))?;

    if url.scheme() != "mqtt" {
        return Err(SessionError::InvalidBrokerUrl(format!(
            "{broker_url} (unsupported scheme '{}', expected mqtt://)",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SessionError::InvalidBrokerUrl(broker_url.to_string()))?;
    let port = url.port().unwrap_or(DEFAULT_MQTT_PORT);

    Ok(BrokerAddress {
        host: host.to_string(),
        port,
    })
}

/// Hex rendering of a hardware identifier, used as the MQTT client id (pure function)
pub fn client_id_from_hardware_id(hardware_id: &[u8]) -> String {
    hardware_id.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build rumqttc options from session options (pure function)
pub fn configure_mqtt_options(options: &SessionOptions) -> MqttOptions {
    let mut mqtt_options = MqttOptions::new(
        options.client_id.clone(),
        options.broker.host.clone(),
        options.broker.port,
    );

    if let Some(username) = &options.username {
        let password = options.password.clone().unwrap_or_default();
        mqtt_options.set_credentials(username.clone(), password);
    }

    mqtt_options.set_keep_alive(options.keepalive);

    if let Some(will) = &options.last_will {
        // MQTT v5 LastWill takes 5 parameters: topic, payload, qos, retain, properties
        let lwt = LastWill::new(
            &will.topic,
            will.payload.clone(),
            MessageHandler::determine_qos_level(will.retain),
            will.retain,
            None,
        );
        mqtt_options.set_last_will(lwt);
    }

    mqtt_options
}

/// Topic construction for one device under a discovery prefix
pub struct TopicBuilder;

impl TopicBuilder {
    /// Build state topic: `{prefix}/{device_id}/state`
    pub fn build_state_topic(prefix: &str, device_id: &str) -> String {
        format!("{}/{device_id}/state", prefix.trim_end_matches('/'))
    }

    /// Build availability topic: `{prefix}/{device_id}/status`
    pub fn build_status_topic(prefix: &str, device_id: &str) -> String {
        format!("{}/{device_id}/status", prefix.trim_end_matches('/'))
    }

    /// Build entity config topic: `{prefix}/{device_id}_{entity}/config`
    pub fn build_config_topic(prefix: &str, device_id: &str, entity: &str) -> String {
        format!("{}/{device_id}_{entity}/config", prefix.trim_end_matches('/'))
    }
}

/// All topics used by one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    pub state: String,
    pub status: String,
    pub temperature_config: String,
    pub humidity_config: String,
}

impl DeviceTopics {
    pub fn new(prefix: &str, device_id: &str) -> Self {
        Self {
            state: TopicBuilder::build_state_topic(prefix, device_id),
            status: TopicBuilder::build_status_topic(prefix, device_id),
            temperature_config: TopicBuilder::build_config_topic(prefix, device_id, "temp"),
            humidity_config: TopicBuilder::build_config_topic(prefix, device_id, "hum"),
        }
    }
}
