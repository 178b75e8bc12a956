//! DHT22 sensor adapter
//!
//! Wraps one physical measurement cycle behind [`SensorDriver`] and decodes the
//! raw 5-byte frame into a [`Reading`].
//!
//! # Temperature encoding
//!
//! The DHT22 datasheet specifies sign-magnitude temperatures (bit 15 is the sign
//! flag, bits 0..15 the magnitude in tenths of a degree). A number of clone
//! parts ship with two's-complement temperatures instead. The two are
//! indistinguishable above zero and decoding a negative value with the wrong
//! scheme yields nonsense such as `-3262.1 °C`. The scheme is therefore an
//! explicit configuration switch ([`TemperatureEncoding`]) and is never guessed.

pub mod drivers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use drivers::{DeviceFileDriver, SimulatedDriver};

/// Length of a DHT22 data frame: humidity (2), temperature (2), checksum (1)
pub const FRAME_LEN: usize = 5;

/// Operating range of the DHT22 in °C
pub const OPERATING_RANGE_CELSIUS: std::ops::RangeInclusive<f32> = -40.0..=80.0;

/// Sensor read errors
///
/// Every fault raised while measuring is transient: the supervisor skips the
/// publish for the current cycle and keeps the session.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    #[error("Failed to read sensor: {reason}")]
    TransientRead { reason: String },
}

impl SensorError {
    pub fn transient<S: Into<String>>(reason: S) -> Self {
        Self::TransientRead {
            reason: reason.into(),
        }
    }

    pub fn checksum_mismatch(expected: u8, actual: u8) -> Self {
        Self::transient(format!(
            "checksum mismatch: expected {expected:#04x}, got {actual:#04x}"
        ))
    }

    pub fn timeout() -> Self {
        Self::transient("timed out waiting for sensor response")
    }
}

/// How the sensor encodes negative temperatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureEncoding {
    /// Datasheet behaviour: bit 15 is a sign flag, magnitude in the low 15 bits
    #[default]
    SignMagnitude,
    /// Raw 16-bit value is a signed two's-complement integer
    TwosComplement,
}

impl TemperatureEncoding {
    /// Decode a raw 16-bit temperature word into °C
    pub fn decode(self, raw: u16) -> f32 {
        match self {
            TemperatureEncoding::SignMagnitude => decode_sign_magnitude(raw),
            TemperatureEncoding::TwosComplement => decode_twos_complement(raw),
        }
    }

    /// Encode °C into the raw 16-bit word this scheme would produce
    pub fn encode(self, celsius: f32) -> u16 {
        let tenths = (celsius * 10.0).round() as i32;
        match self {
            TemperatureEncoding::SignMagnitude => {
                let magnitude = (tenths.unsigned_abs() as u16) & 0x7FFF;
                if tenths < 0 {
                    0x8000 | magnitude
                } else {
                    magnitude
                }
            }
            TemperatureEncoding::TwosComplement => (tenths as i16) as u16,
        }
    }
}

impl std::fmt::Display for TemperatureEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemperatureEncoding::SignMagnitude => write!(f, "sign_magnitude"),
            TemperatureEncoding::TwosComplement => write!(f, "twos_complement"),
        }
    }
}

/// Sign-magnitude decoding: `0x8065` is -10.1 °C
pub fn decode_sign_magnitude(raw: u16) -> f32 {
    let magnitude = (raw & 0x7FFF) as f32 / 10.0;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Two's-complement decoding: `0xFF9B` is -10.1 °C
pub fn decode_twos_complement(raw: u16) -> f32 {
    (raw as i16) as f32 / 10.0
}

/// One raw DHT22 frame: `[hum_hi, hum_lo, temp_hi, temp_lo, checksum]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame([u8; FRAME_LEN]);

impl RawFrame {
    pub fn new(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a frame from humidity and temperature words with a valid checksum
    pub fn from_words(humidity: u16, temperature: u16) -> Self {
        let [hh, hl] = humidity.to_be_bytes();
        let [th, tl] = temperature.to_be_bytes();
        let checksum = hh.wrapping_add(hl).wrapping_add(th).wrapping_add(tl);
        Self([hh, hl, th, tl, checksum])
    }

    pub fn bytes(&self) -> [u8; FRAME_LEN] {
        self.0
    }

    pub fn humidity_raw(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    pub fn temperature_raw(&self) -> u16 {
        u16::from_be_bytes([self.0[2], self.0[3]])
    }

    /// Low byte of the sum of the four data bytes
    pub fn expected_checksum(&self) -> u8 {
        self.0[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
    }

    pub fn checksum(&self) -> u8 {
        self.0[4]
    }

    pub fn checksum_valid(&self) -> bool {
        self.expected_checksum() == self.checksum()
    }
}

impl TryFrom<&[u8]> for RawFrame {
    type Error = SensorError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let frame: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| {
            SensorError::transient(format!(
                "short frame: expected {FRAME_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(frame))
    }
}

/// A decoded measurement. Produced once per cycle and not retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    /// °C at 0.1 resolution
    pub temperature: f32,
    /// %RH at 0.1 resolution
    pub humidity: f32,
}

impl Reading {
    /// Render the JSON state payload `{"temperature": .., "humidity": ..}`
    pub fn to_state_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// One physical measurement cycle
#[async_trait]
pub trait SensorDriver: Send {
    /// Trigger a measurement and return the raw frame
    async fn measure(&mut self) -> Result<RawFrame, SensorError>;
}

#[async_trait]
impl<T: SensorDriver + ?Sized> SensorDriver for Box<T> {
    async fn measure(&mut self) -> Result<RawFrame, SensorError> {
        (**self).measure().await
    }
}

/// Sensor adapter: measurement plus frame decoding
pub struct SensorAdapter<D: SensorDriver> {
    driver: D,
    encoding: TemperatureEncoding,
}

impl<D: SensorDriver> SensorAdapter<D> {
    pub fn new(driver: D, encoding: TemperatureEncoding) -> Self {
        Self { driver, encoding }
    }

    /// Measure and decode one reading
    pub async fn read(&mut self) -> Result<Reading, SensorError> {
        let frame = self.driver.measure().await?;
        let reading = decode_frame(&frame, self.encoding)?;

        if !OPERATING_RANGE_CELSIUS.contains(&reading.temperature) {
            warn!(
                temperature = reading.temperature,
                raw = frame.temperature_raw(),
                encoding = %self.encoding,
                "Temperature outside sensor range, check sensor.encoding"
            );
        }

        debug!(
            temperature = reading.temperature,
            humidity = reading.humidity,
            "Sensor frame decoded"
        );
        Ok(reading)
    }
}

/// Decode a frame, rejecting corrupted ones (pure function)
pub fn decode_frame(frame: &RawFrame, encoding: TemperatureEncoding) -> Result<Reading, SensorError> {
    if !frame.checksum_valid() {
        return Err(SensorError::checksum_mismatch(
            frame.expected_checksum(),
            frame.checksum(),
        ));
    }

    Ok(Reading {
        temperature: encoding.decode(frame.temperature_raw()),
        humidity: frame.humidity_raw() as f32 / 10.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn matching_encoding_recovers_temperature(tenths in -400i32..=800) {
            let celsius = tenths as f32 / 10.0;
            for encoding in [TemperatureEncoding::SignMagnitude, TemperatureEncoding::TwosComplement] {
                let decoded = encoding.decode(encoding.encode(celsius));
                prop_assert!(
                    (decoded - celsius).abs() < 0.1,
                    "{} decoded {} as {}", encoding, celsius, decoded
                );
            }
        }
    }

    #[test]
    fn test_datasheet_examples() {
        assert_eq!(decode_sign_magnitude(0x0065), 10.1);
        assert_eq!(decode_sign_magnitude(0x8065), -10.1);
        assert_eq!(decode_twos_complement(0x0065), 10.1);
        assert_eq!(decode_twos_complement(0xFF9B), -10.1);
    }

    #[test]
    fn test_mismatched_encoding_is_implausible() {
        // -10.1 °C from a two's-complement part read as sign-magnitude
        let decoded = decode_sign_magnitude(0xFF9B);
        assert!(decoded < -3000.0);
        assert!(!OPERATING_RANGE_CELSIUS.contains(&decoded));
    }

    #[test]
    fn test_encodings_agree_above_zero() {
        for raw in [0u16, 1, 215, 800] {
            assert_eq!(decode_sign_magnitude(raw), decode_twos_complement(raw));
        }
    }

    #[test]
    fn test_frame_words_and_checksum() {
        let frame = RawFrame::new([0x02, 0x8C, 0x01, 0x5F, 0xEE]);
        assert_eq!(frame.humidity_raw(), 652);
        assert_eq!(frame.temperature_raw(), 351);
        assert!(frame.checksum_valid());

        let reading = decode_frame(&frame, TemperatureEncoding::SignMagnitude).unwrap();
        assert_eq!(reading.humidity, 65.2);
        assert_eq!(reading.temperature, 35.1);
    }

    #[test]
    fn test_corrupted_frame_is_transient() {
        let frame = RawFrame::new([0x02, 0x8C, 0x01, 0x5F, 0x00]);
        let result = decode_frame(&frame, TemperatureEncoding::SignMagnitude);
        assert!(matches!(result, Err(SensorError::TransientRead { .. })));
    }

    #[test]
    fn test_short_frame_rejected() {
        let bytes = [0x02u8, 0x8C, 0x01];
        let result = RawFrame::try_from(&bytes[..]);
        assert!(matches!(result, Err(SensorError::TransientRead { .. })));
    }

    #[test]
    fn test_state_payload_shape() {
        let reading = Reading {
            temperature: -3.5,
            humidity: 41.2,
        };
        let payload = reading.to_state_payload().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["temperature"].as_f64().unwrap() as f32, -3.5);
        assert_eq!(value["humidity"].as_f64().unwrap() as f32, 41.2);
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_encoding_config_names() {
        let encoding: TemperatureEncoding = serde_json::from_str("\"twos_complement\"").unwrap();
        assert_eq!(encoding, TemperatureEncoding::TwosComplement);
        assert_eq!(TemperatureEncoding::default(), TemperatureEncoding::SignMagnitude);
    }
}
