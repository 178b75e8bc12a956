//! Supervisor counters and retry policy

use std::time::Duration;

/// In-memory counters, reset only by restarting the process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub sessions_established: u64,
    pub state_publishes: u64,
    pub sensor_failures: u64,
    pub consecutive_sensor_failures: u64,
    pub backoffs: u64,
}

impl SupervisorStats {
    pub fn record_session(&mut self) {
        self.sessions_established += 1;
    }

    pub fn record_reading(&mut self) {
        self.consecutive_sensor_failures = 0;
    }

    pub fn record_publish(&mut self) {
        self.state_publishes += 1;
    }

    /// Returns the length of the current failure streak
    pub fn record_sensor_failure(&mut self) -> u64 {
        self.sensor_failures += 1;
        self.consecutive_sensor_failures += 1;
        self.consecutive_sensor_failures
    }

    pub fn record_backoff(&mut self) {
        self.backoffs += 1;
    }
}

/// Delay before retrying after a link or session failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    /// Same delay for every attempt, retried forever
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay before the given attempt, counting from 1 (pure function)
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(15))
    }
}
