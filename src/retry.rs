//! Bounded exponential backoff.
//!
//! Used for index readiness polling and for the optional HTTP retries of the
//! embedding and generation providers. Attempt numbers are 1-based; the delay
//! returned for attempt `n` is the pause taken *after* attempt `n` failed.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Policy for HTTP calls: `max_retries` retries after the first attempt,
    /// backing off 1s, 2s, 4s, ... capped at 32s.
    pub fn http(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            multiplier: 2.0,
        }
    }

    /// Delay after the given failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
