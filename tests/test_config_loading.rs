//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use dht22_bridge::config::{BridgeConfig, ConfigError, SensorDriverKind};
use dht22_bridge::sensor::TemperatureEncoding;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[network]
ssid = "MyWIFI"
password_env = "WIFI_PASSWORD"

[mqtt]
broker_url = "mqtt://192.168.1.10:1884"
username_env = "MQTT_USERNAME"
password_env = "MQTT_PASSWORD"

[device]
id = "pico_w_dht22_1"
name = "Pico DHT22 - 1"

[sensor]
encoding = "twos_complement"

[timing]
refresh_interval_secs = 28
retry_delay_secs = 15
"#,
    );

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.network.ssid, "MyWIFI");
    assert_eq!(config.network.password_env.as_deref(), Some("WIFI_PASSWORD"));
    let broker = config.broker_address().unwrap();
    assert_eq!(broker.host, "192.168.1.10");
    assert_eq!(broker.port, 1884);
    assert_eq!(config.device.name, "Pico DHT22 - 1");
    assert_eq!(config.sensor.encoding, TemperatureEncoding::TwosComplement);
    assert_eq!(config.sensor.driver, SensorDriverKind::Simulated);
    assert_eq!(config.refresh_interval(), Duration::from_secs(28));
    assert_eq!(config.keepalive(), Duration::from_secs(60));
}

#[test]
fn test_config_missing_file_is_reported() {
    let result = BridgeConfig::load_from_file(Path::new("/nonexistent/dht22-bridge.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_invalid_toml_is_reported() {
    let temp_file = write_config("[mqtt\nbroker_url = ");
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_missing_required_section() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtt://localhost"
"#,
    );
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_rejects_invalid_device_id() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtt://localhost"

[device]
id = "pico w/1"
name = "Pico"
"#,
    );
    let result = BridgeConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidDeviceId(_))));
}

#[test]
fn test_config_rejects_bad_values() {
    let cases = [
        ("broker_url = \"http://localhost\"", "[timing]"),
        ("broker_url = \"mqtt://localhost\"\nkeepalive_secs = 2", "[timing]"),
        (
            "broker_url = \"mqtt://localhost\"",
            "[timing]\nrefresh_interval_secs = 0",
        ),
        (
            "broker_url = \"mqtt://localhost\"\ndiscovery_prefix = \"/\"",
            "[timing]",
        ),
    ];

    for (mqtt, extra) in cases {
        let content = format!(
            "[mqtt]\n{mqtt}\n\n[device]\nid = \"pico\"\nname = \"Pico\"\n\n{extra}\n"
        );
        let result = BridgeConfig::parse(&content);
        assert!(
            matches!(result, Err(ConfigError::InvalidConfig(_))),
            "expected rejection for: {content}"
        );
    }
}

#[test]
fn test_configured_credentials_resolve_from_environment() {
    std::env::set_var("DHT22_TEST_LOADING_WIFI_PASSWORD", "hunter2");
    let config = BridgeConfig::parse(
        r#"
[network]
ssid = "MyWIFI"
password_env = "DHT22_TEST_LOADING_WIFI_PASSWORD"

[mqtt]
broker_url = "mqtt://localhost"

[device]
id = "pico"
name = "Pico"
"#,
    )
    .unwrap();

    let credentials = config.network_credentials().unwrap();
    assert_eq!(credentials.ssid, "MyWIFI");
    assert_eq!(credentials.password.as_deref(), Some("hunter2"));
}
