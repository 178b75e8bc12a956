//! Sensor drivers
//!
//! - [`DeviceFileDriver`] reads one raw frame per measurement from a character
//!   device or file exported by a kernel or co-processor driver.
//! - [`SimulatedDriver`] synthesises frames for bench runs without hardware.

use super::{RawFrame, SensorDriver, SensorError, TemperatureEncoding, FRAME_LEN};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Reads `FRAME_LEN` raw bytes from a device node per measurement
pub struct DeviceFileDriver {
    path: PathBuf,
    timeout: Duration,
}

impl DeviceFileDriver {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_frame(path: &Path) -> std::io::Result<[u8; FRAME_LEN]> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut frame = [0u8; FRAME_LEN];
        file.read_exact(&mut frame).await?;
        Ok(frame)
    }
}

#[async_trait]
impl SensorDriver for DeviceFileDriver {
    async fn measure(&mut self) -> Result<RawFrame, SensorError> {
        let bytes = tokio::time::timeout(self.timeout, Self::read_frame(&self.path))
            .await
            .map_err(|_| SensorError::timeout())?
            .map_err(|e| SensorError::transient(format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), frame = ?bytes, "Raw sensor frame read");
        Ok(RawFrame::new(bytes))
    }
}

/// Produces a slow deterministic drift around a baseline
pub struct SimulatedDriver {
    encoding: TemperatureEncoding,
    baseline_temperature: f32,
    baseline_humidity: f32,
    step: u32,
}

impl SimulatedDriver {
    pub fn new(encoding: TemperatureEncoding, baseline_temperature: f32, baseline_humidity: f32) -> Self {
        Self {
            encoding,
            baseline_temperature,
            baseline_humidity,
            step: 0,
        }
    }

    /// Triangle wave of +/-1.0 °C and +/-2.0 %RH around the baseline (pure function)
    fn sample(&self, step: u32) -> (f32, f32) {
        let phase = (step % 40) as f32;
        let offset = (if phase < 20.0 { phase - 10.0 } else { 30.0 - phase }) / 10.0;
        let temperature = self.baseline_temperature + offset;
        let humidity = (self.baseline_humidity + offset * 2.0).clamp(0.0, 100.0);
        (temperature, humidity)
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(TemperatureEncoding::SignMagnitude, 21.5, 45.0)
    }
}

#[async_trait]
impl SensorDriver for SimulatedDriver {
    async fn measure(&mut self) -> Result<RawFrame, SensorError> {
        let (temperature, humidity) = self.sample(self.step);
        self.step = self.step.wrapping_add(1);

        let humidity_raw = (humidity * 10.0).round() as u16;
        let temperature_raw = self.encoding.encode(temperature);
        Ok(RawFrame::from_words(humidity_raw, temperature_raw))
    }
}
