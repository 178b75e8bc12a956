//! DHT22 Home Assistant Bridge - Main Entry Point
//!
//! Loads configuration, wires the real link, MQTT, sensor and indicator
//! implementations into the supervisor and runs it until a shutdown signal.

use clap::{Parser, Subcommand};
use dht22_bridge::config::{BridgeConfig, SensorDriverKind};
use dht22_bridge::device::hardware_id;
use dht22_bridge::indicator::{LogIndicator, StatusIndicator, SysfsLed};
use dht22_bridge::link::host::HostInterface;
use dht22_bridge::link::LinkManager;
use dht22_bridge::observability::{init_default_logging, init_logging, LoggingOptions};
use dht22_bridge::sensor::{DeviceFileDriver, SensorAdapter, SensorDriver, SimulatedDriver};
use dht22_bridge::supervisor::{Supervisor, SupervisorSettings};
use dht22_bridge::transport::mqtt::{client_id_from_hardware_id, MqttConnector};
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tracing::{error, info, warn, Level};

/// DHT22 to Home Assistant bridge over MQTT
#[derive(Parser)]
#[command(name = "dht22-bridge")]
#[command(about = "Publish DHT22 readings to Home Assistant over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default)
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

const DEFAULT_CONFIG_PATHS: &[&str] = &["dht22-bridge.toml", "config/dht22-bridge.toml"];

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let (config, config_path) = match load_configuration(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            init_default_logging();
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let mut logging = LoggingOptions::from_config(&config.logging);
    match cli.verbose {
        0 => {}
        1 => logging.level = Level::DEBUG,
        _ => logging.level = Level::TRACE,
    }
    if let Err(e) = init_logging(logging) {
        eprintln!("{e}");
        process::exit(1);
    }

    info!(
        "DHT22 Home Assistant Sensor - Version {}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Loaded configuration from: {}", config_path.display());

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<(BridgeConfig, PathBuf), Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        return Ok((BridgeConfig::load_from_file(path)?, path.to_path_buf()));
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok((BridgeConfig::load_from_file(&path)?, path));
        }
    }

    Err(format!(
        "No configuration file found. Provide one with -c/--config or create {}",
        DEFAULT_CONFIG_PATHS[0]
    )
    .into())
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client_id = resolve_client_id(&config);
    info!(client_id = %client_id, device_id = %config.device.id, "Starting bridge");

    let settings = SupervisorSettings::from_config(&config, client_id)?;
    let broker = config.broker_address()?;

    let link = LinkManager::new(
        HostInterface::new(&broker.host, broker.port),
        config.link_tick(),
    );
    let connector = MqttConnector::new(config.connect_timeout(), config.poll_window());
    let sensor = SensorAdapter::new(SensorFactory::create_driver(&config), config.sensor.encoding);
    let indicator = IndicatorFactory::create_indicator(&config);

    let mut supervisor = Supervisor::new(link, connector, sensor, indicator, settings);

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = supervisor.run() => {}
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
    }

    let stats = supervisor.stats();
    info!(
        sessions = stats.sessions_established,
        publishes = stats.state_publishes,
        backoffs = stats.backoffs,
        "Supervisor stopped"
    );
    Ok(())
}

/// Configured client id, else the hex hardware id, else the device id
fn resolve_client_id(config: &BridgeConfig) -> String {
    if let Some(client_id) = &config.mqtt.client_id {
        return client_id.clone();
    }

    match hardware_id() {
        Ok(id) => client_id_from_hardware_id(&id),
        Err(e) => {
            warn!(error = %e, "No hardware id available, using device id as client id");
            config.device.id.clone()
        }
    }
}

/// Sensor driver factory
struct SensorFactory;

impl SensorFactory {
    fn create_driver(config: &BridgeConfig) -> Box<dyn SensorDriver> {
        match (&config.sensor.driver, &config.sensor.device_path) {
            (SensorDriverKind::Device, Some(path)) => {
                info!(
                    path = %path.display(),
                    gpio_pin = config.sensor.gpio_pin,
                    "Reading DHT22 frames from device"
                );
                Box::new(DeviceFileDriver::new(path, config.sensor_read_timeout()))
            }
            _ => {
                info!("Using simulated DHT22 sensor");
                Box::new(SimulatedDriver::new(config.sensor.encoding, 21.5, 45.0))
            }
        }
    }
}

/// Status indicator factory
struct IndicatorFactory;

impl IndicatorFactory {
    fn create_indicator(config: &BridgeConfig) -> Box<dyn StatusIndicator> {
        match &config.indicator.led_path {
            Some(path) => Box::new(SysfsLed::new(path)),
            None => Box::new(LogIndicator::new()),
        }
    }
}

fn handle_config_command(
    config: &BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolving settings also checks the referenced environment variables
    SupervisorSettings::from_config(config, resolve_client_id(config))?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
