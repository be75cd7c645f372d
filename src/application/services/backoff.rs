//! Reconnect policy with exponential backoff

use std::time::Duration;

use crate::infrastructure::config::ReconnectConfig;

/// How many times and how patiently the session reconnects
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Attempts before giving up
    pub max_attempts: u32,

    /// Delay before the first attempt
    pub initial_backoff: Duration,

    /// Upper bound for any single delay
    pub max_backoff: Duration,

    /// Growth factor between attempts
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            multiplier,
        }
    }

    /// Millisecond delays, for tests
    pub fn fast(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5), 2.0)
    }

    /// Delay before attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1);
        let delay = Duration::from_millis(millis.min(u64::MAX as f64) as u64);

        delay.min(self.max_backoff)
    }
}
