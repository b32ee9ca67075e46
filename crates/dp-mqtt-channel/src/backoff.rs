//! Exponential reconnect backoff.
//!
//! ```text
//! delay[n] = min(initial * multiplier^n, max)
//! ```
//!
//! Attempts are unbounded: a publisher keeps reconnecting until the
//! process exits. The delay resets once a CONNACK is received.

use std::time::Duration;

use crate::config::SessionConfig;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    attempt: u32,
}

impl Backoff {
    /// Multipliers below 1.0 are clamped so delays never shrink.
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                1.0
            },
            attempt: 0,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.reconnect_initial(),
            config.reconnect_max(),
            config.reconnect_multiplier,
        )
    }

    /// Delay before the next reconnect attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        self.attempt = self.attempt.saturating_add(1);

        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
