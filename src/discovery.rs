//! Home Assistant MQTT discovery
//!
//! Each session starts by publishing one retained config document per entity
//! so the hub can register (or re-register) the device. The documents are
//! derived once from configuration; publishing the same descriptor twice
//! yields byte-identical payloads.

use crate::config::DeviceSection;
use crate::transport::mqtt::DeviceTopics;
use crate::transport::{LastWillMessage, Session, SessionError};
use serde::Serialize;
use tracing::info;

/// Availability payload published after discovery
pub const PAYLOAD_ONLINE: &str = "online";
/// Availability payload published by the broker through the last will
pub const PAYLOAD_OFFLINE: &str = "offline";

/// Device block shared by every entity of the device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

impl DeviceInfo {
    pub fn from_section(device: &DeviceSection) -> Self {
        Self {
            identifiers: vec![device.id.clone()],
            name: device.name.clone(),
            manufacturer: device.manufacturer.clone(),
            model: device.model.clone(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Discovery config document for one sensor entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityConfig {
    pub name: String,
    pub unique_id: String,
    pub device_class: String,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    pub value_template: String,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    pub device: DeviceInfo,
}

/// An entity config and the topic it is retained on
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryEntity {
    pub config_topic: String,
    pub config: EntityConfig,
}

impl DiscoveryEntity {
    pub fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.config)
    }
}

/// Everything the device announces about itself
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryDescriptor {
    pub state_topic: String,
    pub availability_topic: String,
    pub entities: Vec<DiscoveryEntity>,
}

impl DiscoveryDescriptor {
    /// Temperature and humidity entities for one device
    pub fn for_device(device: &DeviceSection, topics: &DeviceTopics) -> Self {
        let device_info = DeviceInfo::from_section(device);

        let entity = |kind: &str, label: &str, unit: &str, config_topic: &str| DiscoveryEntity {
            config_topic: config_topic.to_string(),
            config: EntityConfig {
                name: format!("{} {label}", device.name),
                unique_id: format!("{}_{kind}", device.id),
                device_class: kind.to_string(),
                state_topic: topics.state.clone(),
                unit_of_measurement: Some(unit.to_string()),
                value_template: format!("{{{{ value_json.{kind} | round(1) }}}}"),
                availability_topic: topics.status.clone(),
                payload_available: PAYLOAD_ONLINE.to_string(),
                payload_not_available: PAYLOAD_OFFLINE.to_string(),
                device: device_info.clone(),
            },
        };

        Self {
            state_topic: topics.state.clone(),
            availability_topic: topics.status.clone(),
            entities: vec![
                entity("temperature", "Temperature", "°C", &topics.temperature_config),
                entity("humidity", "Humidity", "%", &topics.humidity_config),
            ],
        }
    }

    /// Last will that flips availability to offline when the session drops
    pub fn last_will(&self) -> LastWillMessage {
        LastWillMessage {
            topic: self.availability_topic.clone(),
            payload: PAYLOAD_OFFLINE.to_string(),
            retain: true,
        }
    }
}

/// Publish every entity config, retained. Any failure is a session failure.
pub async fn publish_discovery<S>(
    session: &mut S,
    descriptor: &DiscoveryDescriptor,
) -> Result<(), SessionError>
where
    S: Session + ?Sized,
{
    for entity in &descriptor.entities {
        let payload = entity.payload()?;
        session.publish(&entity.config_topic, payload, true).await?;
        info!(
            entity = %entity.config.unique_id,
            topic = %entity.config_topic,
            "Published discovery"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::testing::mocks::{Journal, JournalEntry, MockSession};
    use serde_json::Value;

    fn descriptor() -> DiscoveryDescriptor {
        let config = BridgeConfig::test_config();
        DiscoveryDescriptor::for_device(&config.device, &config.topics())
    }

    #[test]
    fn test_entity_schema() {
        let descriptor = descriptor();
        assert_eq!(descriptor.entities.len(), 2);

        let temperature: Value =
            serde_json::from_slice(&descriptor.entities[0].payload().unwrap()).unwrap();
        assert_eq!(
            descriptor.entities[0].config_topic,
            "homeassistant/sensor/pico_w_dht22_1_temp/config"
        );
        assert_eq!(temperature["unique_id"], "pico_w_dht22_1_temperature");
        assert_eq!(temperature["device_class"], "temperature");
        assert_eq!(temperature["unit_of_measurement"], "°C");
        assert_eq!(
            temperature["value_template"],
            "{{ value_json.temperature | round(1) }}"
        );
        assert_eq!(
            temperature["state_topic"],
            "homeassistant/sensor/pico_w_dht22_1/state"
        );
        assert_eq!(
            temperature["availability_topic"],
            "homeassistant/sensor/pico_w_dht22_1/status"
        );
        assert_eq!(temperature["payload_available"], "online");
        assert_eq!(temperature["payload_not_available"], "offline");
        assert_eq!(temperature["device"]["identifiers"][0], "pico_w_dht22_1");
        assert_eq!(temperature["device"]["sw_version"], env!("CARGO_PKG_VERSION"));

        let humidity: Value =
            serde_json::from_slice(&descriptor.entities[1].payload().unwrap()).unwrap();
        assert_eq!(
            descriptor.entities[1].config_topic,
            "homeassistant/sensor/pico_w_dht22_1_hum/config"
        );
        assert_eq!(humidity["unit_of_measurement"], "%");
        assert_eq!(
            humidity["value_template"],
            "{{ value_json.humidity | round(1) }}"
        );
        assert_eq!(humidity["device"], temperature["device"]);
    }

    #[test]
    fn test_last_will_targets_availability_topic() {
        let will = descriptor().last_will();
        assert_eq!(will.topic, "homeassistant/sensor/pico_w_dht22_1/status");
        assert_eq!(will.payload, "offline");
        assert!(will.retain);
    }

    #[tokio::test]
    async fn test_publish_discovery_is_retained_and_idempotent() {
        let journal = Journal::new();
        let mut session = MockSession::new(journal.clone());
        let descriptor = descriptor();

        publish_discovery(&mut session, &descriptor).await.unwrap();
        publish_discovery(&mut session, &descriptor).await.unwrap();

        let publishes: Vec<_> = journal
            .entries()
            .into_iter()
            .filter_map(|entry| match entry {
                JournalEntry::Publish {
                    topic,
                    payload,
                    retain,
                } => Some((topic, payload, retain)),
                _ => None,
            })
            .collect();

        assert_eq!(publishes.len(), 4);
        assert!(publishes.iter().all(|(_, _, retain)| *retain));
        assert_eq!(publishes[0], publishes[2]);
        assert_eq!(publishes[1], publishes[3]);
    }

    #[tokio::test]
    async fn test_publish_failure_is_session_failure() {
        let journal = Journal::new();
        let mut session = MockSession::new(journal.clone()).failing_publish_at(2);

        let result = publish_discovery(&mut session, &descriptor()).await;
        assert!(matches!(result, Err(SessionError::Broken { .. })));
    }
}
