//! MQTT topic builders and validation for publisher status topics.
//!
//! Default topic structure:
//! ```text
//! topic/device/{kind}
//! ```
//! Any other publish topic is accepted as long as it passes
//! [`validate_publish_topic`].

use thiserror::Error;

const PREFIX: &str = "topic/device";

/// MQTT limits a topic to a length-prefixed UTF-8 string.
const MAX_TOPIC_LEN: usize = 65_535;

/// Reasons a topic cannot be used for publishing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,

    #[error("topic '{0}' contains a wildcard; publish topics must be concrete")]
    Wildcard(String),

    #[error("topic contains a NUL character")]
    NulChar,

    #[error("topic is {0} bytes, exceeding the MQTT limit")]
    TooLong(usize),
}

/// Status topic for a device kind, e.g. `topic/device/temperature`.
pub fn device_status(kind: &str) -> String {
    format!("{PREFIX}/{}", kind.to_lowercase())
}

/// Check that `topic` is a valid MQTT publish topic.
pub fn validate_publish_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(TopicError::TooLong(topic.len()));
    }
    if topic.contains('\0') {
        return Err(TopicError::NulChar);
    }
    if topic.contains(['+', '#']) {
        return Err(TopicError::Wildcard(topic.to_string()));
    }
    Ok(())
}
