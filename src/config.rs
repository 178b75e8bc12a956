//! Bridge configuration
//!
//! Loaded once at startup from TOML. Secrets never live in the file: the file
//! names the environment variables that hold them (`password_env`,
//! `username_env`), and they are resolved when the bridge is assembled.

use crate::link::Credentials;
use crate::sensor::TemperatureEncoding;
use crate::transport::mqtt::{parse_broker_url, DeviceTopics};
use crate::transport::BrokerAddress;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub network: NetworkSection,
    pub mqtt: MqttSection,
    pub device: DeviceSection,
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub indicator: IndicatorSection,
}

/// Network link section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// Network name to join (informational on hosts where the OS manages it)
    #[serde(default)]
    pub ssid: String,
    /// Environment variable containing the network password
    pub password_env: Option<String>,
    /// Status polls before a join attempt is abandoned (default: 15)
    #[serde(default = "default_join_timeout_ticks")]
    pub join_timeout_ticks: u32,
    /// Interval between status polls in milliseconds (default: 1000)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password_env: None,
            join_timeout_ticks: default_join_timeout_ticks(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_join_timeout_ticks() -> u32 {
    15
}

fn default_tick_ms() -> u64 {
    1000
}

/// MQTT section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL, `mqtt://host[:port]`
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Client id override; defaults to the hex hardware id
    pub client_id: Option<String>,
    /// Discovery topic namespace (default: `homeassistant/sensor`)
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    /// Bound on waiting for ConnAck or a publish write, in seconds (default: 10)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// How long each incoming-message poll services the connection (default: 250)
    #[serde(default = "default_poll_window_ms")]
    pub poll_window_ms: u64,
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_discovery_prefix() -> String {
    "homeassistant/sensor".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_poll_window_ms() -> u64 {
    250
}

/// Device identity, shared by both discovery entities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Device identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Human readable device name
    pub name: String,
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_manufacturer() -> String {
    "Raspberry Pi".to_string()
}

fn default_model() -> String {
    "Pico W with DHT22".to_string()
}

/// Which sensor driver to run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorDriverKind {
    #[default]
    Simulated,
    Device,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSection {
    /// GPIO line of the data pin (default: 22)
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u8,
    /// Negative temperature encoding of the part in use
    #[serde(default)]
    pub encoding: TemperatureEncoding,
    #[serde(default)]
    pub driver: SensorDriverKind,
    /// Raw frame source, required when `driver = "device"`
    pub device_path: Option<PathBuf>,
    /// Bound on one measurement in milliseconds (default: 2000)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            gpio_pin: default_gpio_pin(),
            encoding: TemperatureEncoding::default(),
            driver: SensorDriverKind::default(),
            device_path: None,
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_gpio_pin() -> u8 {
    22
}

fn default_read_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSection {
    /// Pause between sensor cycles in seconds (default: 28)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Pause after a link or session failure in seconds (default: 15)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    28
}

fn default_retry_delay_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// Log file path; empty disables the file sink (default: `app.log`)
    #[serde(default = "default_log_file")]
    pub file: String,
    /// Lines per file before rotation (default: 500)
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Keep one rotated backup next to the log file (default: true)
    #[serde(default = "default_rotate")]
    pub rotate: bool,
    /// Console log level (default: INFO)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Console format: json, pretty or compact (default: compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            max_lines: default_max_lines(),
            rotate: default_rotate(),
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSection {
    pub fn file_path(&self) -> Option<PathBuf> {
        let file = self.file.trim();
        (!file.is_empty()).then(|| PathBuf::from(file))
    }
}

fn default_log_file() -> String {
    "app.log".to_string()
}

fn default_max_lines() -> usize {
    500
}

fn default_rotate() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSection {
    /// sysfs LED directory, e.g. `/sys/class/leds/led0`
    pub led_path: Option<PathBuf>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.id)?;

        self.broker_address()?;

        if self.mqtt.keepalive_secs < 5 {
            return Err(ConfigError::InvalidConfig(
                "mqtt.keepalive_secs must be at least 5".to_string(),
            ));
        }
        if self.mqtt.discovery_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidConfig(
                "mqtt.discovery_prefix must not be empty".to_string(),
            ));
        }
        if let Some(client_id) = &self.mqtt.client_id {
            if client_id.is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "mqtt.client_id must not be empty when set".to_string(),
                ));
            }
        }
        if self.network.join_timeout_ticks == 0 || self.network.tick_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "network.join_timeout_ticks and network.tick_ms must be positive".to_string(),
            ));
        }
        if self.timing.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "timing.refresh_interval_secs must be positive".to_string(),
            ));
        }
        if self.sensor.driver == SensorDriverKind::Device && self.sensor.device_path.is_none() {
            return Err(ConfigError::InvalidConfig(
                "sensor.device_path is required when sensor.driver = \"device\"".to_string(),
            ));
        }
        if self.logging.rotate && self.logging.max_lines == 0 {
            return Err(ConfigError::InvalidConfig(
                "logging.max_lines must be positive when rotation is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn broker_address(&self) -> Result<BrokerAddress, ConfigError> {
        parse_broker_url(&self.mqtt.broker_url).map_err(|e| ConfigError::InvalidConfig(e.to_string()))
    }

    pub fn topics(&self) -> DeviceTopics {
        DeviceTopics::new(&self.mqtt.discovery_prefix, &self.device.id)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.mqtt.keepalive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.mqtt.connect_timeout_secs)
    }

    pub fn poll_window(&self) -> Duration {
        Duration::from_millis(self.mqtt.poll_window_ms)
    }

    pub fn link_tick(&self) -> Duration {
        Duration::from_millis(self.network.tick_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.timing.refresh_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.timing.retry_delay_secs)
    }

    pub fn sensor_read_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor.read_timeout_ms)
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Result<Option<String>, ConfigError> {
        env_var_name.map(|name| Self::get_env_var_required(name)).transpose()
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Result<Option<String>, ConfigError> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Result<Option<String>, ConfigError> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Network credentials with the password resolved from the environment
    pub fn network_credentials(&self) -> Result<Credentials, ConfigError> {
        let password = Self::get_env_var_optional(self.network.password_env.as_ref())?;
        Ok(Credentials::new(self.network.ssid.clone(), password))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[device]
id = "pico_w_dht22_1"
name = "Pico DHT22 - 1"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate device ID format; it becomes part of every topic
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
