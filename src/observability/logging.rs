//! Structured logging system using tracing crate
//!
//! A console layer in one of three formats plus an optional plain-text file
//! layer backed by [`RotatingFile`].
//!
//! ## Log Format Options
//!
//! - `json` - Structured JSON format for log aggregation systems
//! - `pretty` - Human-readable format with colors and indentation
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! These override the `[logging]` section of the configuration file:
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE)
//! - `LOG_FORMAT`: Output format (json, pretty, compact)
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! ## Examples
//!
//! ```bash
//! # JSON logging for a collector
//! LOG_FORMAT=json LOG_LEVEL=INFO ./dht22-bridge
//!
//! # Development with colors
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG ./dht22-bridge
//! ```

use super::rotating_file::RotatingFile;
use crate::config::LoggingSection;
use crate::error::{BridgeError, BridgeResult};
use std::env;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Parse a level name, falling back to INFO
pub fn parse_level(s: &str) -> Level {
    match s.to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Resolved logging setup
#[derive(Debug)]
pub struct LoggingOptions {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
    pub file: Option<RotatingFile>,
}

impl LoggingOptions {
    /// Configuration values, overridden by `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS`
    pub fn from_config(section: &LoggingSection) -> Self {
        let level = env::var("LOG_LEVEL").unwrap_or_else(|_| section.level.clone());
        let format = env::var("LOG_FORMAT").unwrap_or_else(|_| section.format.clone());

        Self {
            level: parse_level(&level),
            format: LogFormat::parse(&format),
            include_spans: spans_from_env(),
            file: section
                .file_path()
                .map(|path| RotatingFile::open(path, section.max_lines, section.rotate)),
        }
    }

    /// Console-only logging from environment variables
    pub fn from_env() -> Self {
        let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());
        let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

        Self {
            level: parse_level(&level),
            format: LogFormat::parse(&format),
            include_spans: spans_from_env(),
            file: None,
        }
    }
}

fn spans_from_env() -> bool {
    env::var("LOG_SPANS")
        .unwrap_or_else(|_| "false".to_string())
        .to_lowercase()
        == "true"
}

/// Level filter with dependency noise capped at warn; `RUST_LOG` wins when valid
fn build_filter(level: Level) -> EnvFilter {
    if let Ok(rust_log) = env::var("RUST_LOG") {
        if let Ok(filter) = EnvFilter::try_new(rust_log) {
            return filter;
        }
    }

    EnvFilter::try_new(format!("{level},rumqttc=warn,tokio=warn"))
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

/// Install the global subscriber
pub fn init_logging(options: LoggingOptions) -> BridgeResult<()> {
    let file_layer = options.file.map(|writer| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(writer)
    });

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(options.level))
        .with(file_layer);

    let result = match options.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(span_events(options.include_spans));
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(true)
                .with_span_events(span_events(options.include_spans));
            subscriber.with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(true)
                .with_target(false)
                .with_span_events(span_events(options.include_spans));
            subscriber.with(fmt_layer).try_init()
        }
    };

    result.map_err(|e| BridgeError::logging(e.to_string()))
}

/// Initialize console logging from environment variables
pub fn init_default_logging() {
    // A subscriber may already be installed, e.g. by a test harness
    let _ = init_logging(LoggingOptions::from_env());
}
