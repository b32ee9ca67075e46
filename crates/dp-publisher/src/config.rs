//! Publisher configuration, loadable from TOML.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use dp_mqtt_channel::{Descriptor, SessionConfig};
use dp_protocol::PayloadFormat;
use dp_protocol::topics::{self, TopicError};

use crate::publish_loop::PublisherPlan;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no publishers configured")]
    NoPublishers,

    #[error("publisher ID '{0}' is configured more than once")]
    DuplicateId(String),

    #[error("publisher '{0}' has a zero publish interval")]
    ZeroInterval(String),

    #[error("publisher '{publisher}' has an invalid topic: {source}")]
    InvalidTopic {
        publisher: String,
        #[source]
        source: TopicError,
    },
}

/// Top-level configuration for the publisher process.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// PEM bundle of trusted root certificates for the broker.
    pub ca_cert_path: String,
    /// How long shutdown waits for loops to finish before aborting them.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    /// MQTT session settings shared by every publisher.
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub publishers: Vec<PublisherEntry>,
}

/// One `[[publishers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherEntry {
    #[serde(flatten)]
    pub descriptor: Descriptor,
    /// Seconds between two status messages.
    pub interval_secs: u64,
    #[serde(default)]
    pub format: PayloadFormat,
}

fn default_shutdown_grace() -> u64 {
    5
}

impl PublisherConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Reject configurations the publisher cannot run.
    ///
    /// Duplicate client IDs are only warned about: the broker resolves
    /// them by disconnecting one of the sessions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publishers.is_empty() {
            return Err(ConfigError::NoPublishers);
        }

        let mut ids = HashSet::new();
        let mut client_ids = HashSet::new();

        for entry in &self.publishers {
            let d = &entry.descriptor;
            if !ids.insert(d.id()) {
                return Err(ConfigError::DuplicateId(d.id().to_string()));
            }
            if entry.interval_secs == 0 {
                return Err(ConfigError::ZeroInterval(d.id().to_string()));
            }
            topics::validate_publish_topic(d.topic()).map_err(|source| {
                ConfigError::InvalidTopic {
                    publisher: d.id().to_string(),
                    source,
                }
            })?;
            if !d.client_id().is_empty() && !client_ids.insert(d.client_id()) {
                tracing::warn!(
                    publisher = %d.id(),
                    client_id = %d.client_id(),
                    "client ID shared with another publisher; the broker will drop one session"
                );
            }
        }

        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// One plan per configured publisher, in file order.
    pub fn plans(&self) -> Vec<PublisherPlan> {
        self.publishers
            .iter()
            .map(|entry| PublisherPlan {
                descriptor: entry.descriptor.clone(),
                interval: Duration::from_secs(entry.interval_secs),
                format: entry.format,
            })
            .collect()
    }
}
