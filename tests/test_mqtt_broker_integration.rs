//! Integration Tests with Real MQTT Broker
//!
//! These tests validate against a live broker:
//! - Connection and retained discovery documents
//! - State publishes reaching subscribers
//! - The last will flipping availability to offline on an unclean drop

mod mqtt_integration_helpers;

use dht22_bridge::config::BridgeConfig;
use dht22_bridge::discovery::{publish_discovery, DiscoveryDescriptor, PAYLOAD_ONLINE};
use dht22_bridge::transport::{Session, SessionConnector};
use mqtt_integration_helpers::{connector, session_options, Observer};
use std::time::Duration;

fn descriptor(device_id: &str) -> DiscoveryDescriptor {
    let config = BridgeConfig::parse(&format!(
        r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
discovery_prefix = "dht22-bridge-test/sensor"

[device]
id = "{device_id}"
name = "Integration Test Sensor"
"#
    ))
    .unwrap();
    DiscoveryDescriptor::for_device(&config.device, &config.topics())
}

#[tokio::test]
#[ignore] // Requires a broker at localhost:1883
async fn test_discovery_is_retained_on_real_broker() {
    let descriptor = descriptor("it_discovery");
    let mut connector = connector();
    let mut session = connector
        .connect(&session_options("dht22-it-discovery"))
        .await
        .expect("should connect to real broker");

    publish_discovery(&mut session, &descriptor).await.unwrap();
    session
        .publish(&descriptor.availability_topic, PAYLOAD_ONLINE.as_bytes().to_vec(), true)
        .await
        .unwrap();
    session.disconnect().await;

    // A late subscriber still sees the retained documents
    let mut observer =
        Observer::subscribe("dht22-it-discovery-observer", "dht22-bridge-test/sensor/#").await;
    let received = observer.collect(3, Duration::from_secs(3)).await;
    observer.close().await;

    for entity in &descriptor.entities {
        assert!(
            received
                .iter()
                .any(|(topic, _, retain)| topic == &entity.config_topic && *retain),
            "missing retained {}",
            entity.config_topic
        );
    }
    assert!(received
        .iter()
        .any(|(topic, payload, _)| topic == &descriptor.availability_topic && payload == "online"));
}

#[tokio::test]
#[ignore] // Requires a broker at localhost:1883
async fn test_state_publish_reaches_subscriber() {
    let descriptor = descriptor("it_state");
    let mut observer = Observer::subscribe("dht22-it-state-observer", &descriptor.state_topic).await;

    let mut session = connector()
        .connect(&session_options("dht22-it-state"))
        .await
        .expect("should connect to real broker");
    session
        .publish(
            &descriptor.state_topic,
            br#"{"temperature":21.5,"humidity":45.0}"#.to_vec(),
            false,
        )
        .await
        .unwrap();
    session.poll_incoming().await.unwrap();

    let received = observer.collect(1, Duration::from_secs(3)).await;
    session.disconnect().await;
    observer.close().await;

    assert_eq!(received.len(), 1);
    assert!(received[0].1.contains("\"temperature\":21.5"));
    assert!(!received[0].2);
}

#[tokio::test]
#[ignore] // Requires a broker at localhost:1883
async fn test_last_will_marks_device_offline() {
    let descriptor = descriptor("it_will");
    let options = session_options("dht22-it-will").with_last_will(descriptor.last_will());

    let mut session = connector().connect(&options).await.unwrap();
    session
        .publish(&descriptor.availability_topic, PAYLOAD_ONLINE.as_bytes().to_vec(), true)
        .await
        .unwrap();

    let mut observer =
        Observer::subscribe("dht22-it-will-observer", &descriptor.availability_topic).await;
    let initial = observer.collect(1, Duration::from_secs(3)).await;
    assert_eq!(initial[0].1, "online");

    // Dropping without DISCONNECT is an unclean close
    drop(session);

    let after = observer.collect(1, Duration::from_secs(5)).await;
    observer.close().await;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].1, "offline");
}
