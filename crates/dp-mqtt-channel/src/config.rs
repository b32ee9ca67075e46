use std::time::Duration;

use serde::Deserialize;

/// Per-connection MQTT session settings, shared by every publisher.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
    /// Capacity of the client's request queue. A full queue makes
    /// `publish` wait, so a stalled session stalls its own loop only.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
    /// First reconnect delay after a connection loss, in milliseconds.
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    /// Upper bound for the reconnect delay, in seconds.
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
    /// Growth factor applied to the delay after each failed attempt.
    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,
}

impl SessionConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.into())
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive(),
            request_capacity: default_request_capacity(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_secs: default_reconnect_max_secs(),
            reconnect_multiplier: default_reconnect_multiplier(),
        }
    }
}

fn default_keepalive() -> u16 {
    30
}

fn default_request_capacity() -> usize {
    10
}

fn default_reconnect_initial_ms() -> u64 {
    1_000
}

fn default_reconnect_max_secs() -> u64 {
    600
}

fn default_reconnect_multiplier() -> f64 {
    2.0
}
