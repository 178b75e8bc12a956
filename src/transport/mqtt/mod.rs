//! MQTT v5 session client
//!
//! Split the same way as the rest of the transport code: pure functions in
//! [`connection`] and [`message_handler`], socket I/O in [`client`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use dht22_bridge::transport::mqtt::{parse_broker_url, MqttConnector};
//! use dht22_bridge::transport::{Session, SessionConnector, SessionOptions};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let broker = parse_broker_url("mqtt://localhost:1883")?;
//! let options = SessionOptions::new("e6614104032b4f2a", broker);
//!
//! let mut connector = MqttConnector::new(Duration::from_secs(10), Duration::from_millis(250));
//! let mut session = connector.connect(&options).await?;
//! session.publish("homeassistant/sensor/pico/status", b"online".to_vec(), true).await?;
//! session.disconnect().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{MqttConnector, MqttSession};
pub use connection::{
    client_id_from_hardware_id, configure_mqtt_options, parse_broker_url, DeviceTopics,
    TopicBuilder, DEFAULT_MQTT_PORT,
};
pub use message_handler::{EventRoute, MessageHandler};
