use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential backoff for push channel reconnects.
///
/// `delay(attempt) = min(base_delay_ms * multiplier^attempt, max_delay_ms)`,
/// for `attempt` in `0..max_attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 3000,
            multiplier: 1.5,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Capped delay in milliseconds, regardless of the attempt limit.
    pub fn delay_ms(&self, attempt: u32) -> f64 {
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        raw.min(self.max_delay_ms as f64)
    }

    /// Delay before reconnect number `attempt + 1`, or `None` once the
    /// automatic attempts are used up.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(Duration::from_secs_f64(self.delay_ms(attempt) / 1000.0))
    }
}
