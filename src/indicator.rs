//! Heartbeat status indicator
//!
//! Side-effect only. Failures to drive the LED are logged once and otherwise
//! ignored; the indicator never influences control flow.

use std::path::PathBuf;
use tracing::{debug, warn};

pub trait StatusIndicator: Send {
    fn on(&mut self);
    fn off(&mut self);
    fn toggle(&mut self);
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for Box<T> {
    fn on(&mut self) {
        (**self).on()
    }

    fn off(&mut self) {
        (**self).off()
    }

    fn toggle(&mut self) {
        (**self).toggle()
    }
}

/// Indicator that only tracks its level and traces changes.
/// Used when no LED is configured.
#[derive(Debug, Default)]
pub struct LogIndicator {
    lit: bool,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl StatusIndicator for LogIndicator {
    fn on(&mut self) {
        self.lit = true;
        debug!(lit = true, "Indicator");
    }

    fn off(&mut self) {
        self.lit = false;
        debug!(lit = false, "Indicator");
    }

    fn toggle(&mut self) {
        self.lit = !self.lit;
        debug!(lit = self.lit, "Indicator");
    }
}

/// LED driven through the Linux LED class (`/sys/class/leds/<name>`)
#[derive(Debug)]
pub struct SysfsLed {
    brightness: PathBuf,
    lit: bool,
    warned: bool,
}

impl SysfsLed {
    /// `led_dir` is the LED's sysfs directory, e.g. `/sys/class/leds/led0`
    pub fn new(led_dir: impl Into<PathBuf>) -> Self {
        Self {
            brightness: led_dir.into().join("brightness"),
            lit: false,
            warned: false,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Synchronous write: sysfs attributes live in kernel memory and never
    /// wait on storage, so this is safe to call from the supervisor task.
    fn set(&mut self, lit: bool) {
        self.lit = lit;
        let value = if lit { "1" } else { "0" };
        if let Err(e) = std::fs::write(&self.brightness, value) {
            if !self.warned {
                warn!(
                    path = %self.brightness.display(),
                    error = %e,
                    "Failed to drive status LED, further errors suppressed"
                );
                self.warned = true;
            }
        }
    }
}

impl StatusIndicator for SysfsLed {
    fn on(&mut self) {
        self.set(true);
    }

    fn off(&mut self) {
        self.set(false);
    }

    fn toggle(&mut self) {
        self.set(!self.lit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_indicator_toggles() {
        let mut indicator = LogIndicator::new();
        indicator.toggle();
        assert!(indicator.is_lit());
        indicator.toggle();
        assert!(!indicator.is_lit());
        indicator.on();
        indicator.off();
        assert!(!indicator.is_lit());
    }

    #[test]
    fn test_sysfs_led_writes_brightness() {
        let dir = tempfile::tempdir().unwrap();
        let mut led = SysfsLed::new(dir.path());

        led.on();
        assert_eq!(std::fs::read_to_string(dir.path().join("brightness")).unwrap(), "1");
        led.toggle();
        assert_eq!(std::fs::read_to_string(dir.path().join("brightness")).unwrap(), "0");
        assert!(!led.is_lit());
    }

    #[test]
    fn test_missing_led_is_not_fatal() {
        let mut led = SysfsLed::new("/nonexistent/leds/led0");
        led.on();
        led.toggle();
        assert!(!led.is_lit());
    }
}
