//! Observability for the bridge
//!
//! Structured console logging through `tracing`, plus a plain-text log file
//! that rotates by line count.

pub mod logging;
pub mod rotating_file;

pub use logging::{init_default_logging, init_logging, LogFormat, LoggingOptions};
pub use rotating_file::{backup_path_for, RotatingFile, ROTATION_MARKER};
