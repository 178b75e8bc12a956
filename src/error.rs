//! Error types for the bridge
//!
//! Each layer owns its error enum next to its code; [`BridgeError`] gathers
//! them for callers that cross layers.

use crate::config::ConfigError;
use crate::link::LinkError;
use crate::sensor::SensorError;
use crate::transport::SessionError;
use thiserror::Error;

/// Main error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

impl BridgeError {
    /// Create logging setup error
    pub fn logging<S: Into<String>>(message: S) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
