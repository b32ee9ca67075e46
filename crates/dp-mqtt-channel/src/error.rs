//! MQTT channel error types.

use thiserror::Error;

/// Errors that can occur while connecting or publishing.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("certificate load error: {0}")]
    CertificateLoad(String),

    #[error("invalid broker URL '{url}': {reason}")]
    InvalidBrokerUrl { url: String, reason: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for MQTT results.
pub type MqttResult<T> = Result<T, MqttError>;
