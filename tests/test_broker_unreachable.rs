//! Integration tests for startup while the broker is unreachable
//!
//! The bridge must never exit on a missing broker: every failed connect is a
//! session failure that ends in backoff and another attempt.


use dht22_bridge::link::host::HostInterface;
use dht22_bridge::link::{LinkManager, LinkState};
use dht22_bridge::sensor::SensorAdapter;
use dht22_bridge::supervisor::{FailureLayer, Supervisor, SupervisorSettings, SupervisorState};
use dht22_bridge::testing::{Journal, JournalEntry, MockIndicator, MockSensorDriver};
use dht22_bridge::transport::mqtt::{parse_broker_url, MqttConnector};
use dht22_bridge::transport::{SessionConnector, SessionError, SessionOptions};
use std::time::{Duration, Instant};
use test_helpers::{test_config, CLIENT_ID};

/// A loopback port with nothing listening on it
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_connect_fails_fast_when_broker_down() {
    let broker = parse_broker_url(&format!("mqtt://127.0.0.1:{}", closed_port())).unwrap();
    let options = SessionOptions::new(CLIENT_ID, broker);
    let mut connector = MqttConnector::new(Duration::from_secs(5), Duration::from_millis(50));

    let start = Instant::now();
    let result = connector.connect(&options).await;

    assert!(matches!(result, Err(SessionError::Broken { .. })));
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "a refused connection should not wait for the ConnAck timeout"
    );
}

#[tokio::test]
async fn test_supervisor_backs_off_and_retries_when_broker_down() {
    let port = closed_port();
    let mut config = test_config();
    config.mqtt.broker_url = format!("mqtt://127.0.0.1:{port}");
    config.mqtt.connect_timeout_secs = 2;
    config.timing.retry_delay_secs = 1;

    let journal = Journal::new();
    let settings = SupervisorSettings::from_config(&config, CLIENT_ID.to_string()).unwrap();
    let mut supervisor = Supervisor::new(
        LinkManager::new(HostInterface::new("127.0.0.1", port), config.link_tick()),
        MqttConnector::new(config.connect_timeout(), config.poll_window()),
        SensorAdapter::new(MockSensorDriver::new(journal.clone()), config.sensor.encoding),
        MockIndicator::new(journal.clone()),
        settings,
    );

    let state = supervisor.step(SupervisorState::Idle).await;
    assert_eq!(state, SupervisorState::LinkUp);
    assert_eq!(supervisor.link().state(), LinkState::Up);

    let state = supervisor.step(state).await;
    match &state {
        SupervisorState::Backoff(cause) => {
            assert_eq!(cause.layer, FailureLayer::Session);
            assert!(cause.message.contains("Connection failed"), "got: {}", cause.message);
        }
        other => panic!("expected backoff, got {other}"),
    }
    assert!(!supervisor.has_session());

    let start = Instant::now();
    let state = supervisor.step(state).await;
    assert_eq!(state, SupervisorState::Idle);
    assert!(start.elapsed() >= Duration::from_secs(1));

    // The second attempt fails the same way; nothing escapes the state machine
    let state = supervisor.step(state).await;
    let state = supervisor.step(state).await;
    assert!(matches!(state, SupervisorState::Backoff(_)));
    assert_eq!(supervisor.stats().backoffs, 1);
    assert_eq!(supervisor.stats().sessions_established, 0);
    assert_eq!(journal.count(|e| matches!(e, JournalEntry::SensorRead { .. })), 0);
}
