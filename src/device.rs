//! Stable hardware identity
//!
//! The MQTT client id is the hex rendering of a per-machine identifier so that
//! a device keeps the same client id across restarts.

use std::path::Path;
use thiserror::Error;

/// Files holding the systemd/dbus machine id, checked in order
pub const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

#[derive(Debug, Error)]
pub enum HardwareIdError {
    #[error("No machine id found in {0:?}")]
    NotFound(Vec<String>),
    #[error("Malformed machine id in {path}")]
    Malformed { path: String },
}

/// Read the machine's unique id as raw bytes
pub fn hardware_id() -> Result<Vec<u8>, HardwareIdError> {
    for path in MACHINE_ID_PATHS {
        match read_machine_id(Path::new(path)) {
            Ok(id) => return Ok(id),
            Err(HardwareIdError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(HardwareIdError::NotFound(
        MACHINE_ID_PATHS.iter().map(|p| p.to_string()).collect(),
    ))
}

/// Read and hex-decode one machine id file
pub fn read_machine_id(path: &Path) -> Result<Vec<u8>, HardwareIdError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| HardwareIdError::NotFound(vec![path.display().to_string()]))?;
    decode_hex(content.trim()).ok_or_else(|| HardwareIdError::Malformed {
        path: path.display().to_string(),
    })
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() || text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mqtt::client_id_from_hardware_id;
    use std::io::Write;

    #[test]
    fn test_machine_id_renders_as_client_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "e6614104032b4f2a9c0d1e2f3a4b5c6d").unwrap();

        let id = read_machine_id(file.path()).unwrap();
        assert_eq!(id.len(), 16);
        assert_eq!(
            client_id_from_hardware_id(&id),
            "e6614104032b4f2a9c0d1e2f3a4b5c6d"
        );
    }

    #[test]
    fn test_malformed_machine_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not-hex").unwrap();
        assert!(matches!(
            read_machine_id(file.path()),
            Err(HardwareIdError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_machine_id() {
        assert!(matches!(
            read_machine_id(Path::new("/nonexistent/machine-id")),
            Err(HardwareIdError::NotFound(_))
        ));
    }
}
