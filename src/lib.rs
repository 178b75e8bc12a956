//! DHT22 Home Assistant Bridge
//!
//! Reads a DHT22 temperature/humidity sensor and publishes the readings to an
//! MQTT broker using Home Assistant discovery. A supervisor state machine keeps
//! the network link and the broker session alive, tearing both down and
//! retrying after a fixed delay whenever either fails.
//!
//! # Overview
//!
//! - [`sensor`]: raw frame decoding with an explicit negative-temperature encoding
//! - [`link`]: network link join with a bounded status-poll budget
//! - [`transport`]: MQTT v5 session with last will and bounded eventloop driving
//! - [`discovery`]: retained Home Assistant discovery documents
//! - [`supervisor`]: the connection-resilience state machine
//! - [`observability`]: structured logging with a rotating log file
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dht22_bridge::link::LinkManager;
//! use dht22_bridge::sensor::SensorAdapter;
//! use dht22_bridge::supervisor::{Supervisor, SupervisorSettings};
//! use dht22_bridge::testing::{Journal, MockConnector, MockIndicator, MockNetwork, MockSensorDriver};
//! use dht22_bridge::BridgeConfig;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let config = BridgeConfig::parse(r#"
//! [mqtt]
//! broker_url = "mqtt://localhost"
//!
//! [device]
//! id = "pico_w_dht22_1"
//! name = "Pico DHT22 - 1"
//! "#)?;
//!
//! let journal = Journal::new();
//! let settings = SupervisorSettings::from_config(&config, "e6614104".to_string())?;
//! let mut supervisor = Supervisor::new(
//!     LinkManager::new(MockNetwork::new(journal.clone()), Duration::from_secs(1)),
//!     MockConnector::new(journal.clone()),
//!     SensorAdapter::new(MockSensorDriver::new(journal.clone()), config.sensor.encoding),
//!     MockIndicator::new(journal.clone()),
//!     settings,
//! );
//! supervisor.run().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod indicator;
pub mod link;
pub mod observability;
pub mod sensor;
pub mod supervisor;
pub mod testing;
pub mod transport;

pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use supervisor::{Supervisor, SupervisorSettings, SupervisorState};
pub use transport::mqtt::{MqttConnector, MqttSession};
