use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a publisher renders its status reports on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// Human-readable line: `"<ID> is currently: <sequence>"`.
    #[default]
    Text,
    /// The full [`StatusReport`] as JSON.
    Json,
}

/// One periodic status message emitted by a publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// Unique message identifier (UUIDv7, time-ordered).
    pub message_id: Uuid,
    /// Human-readable publisher ID (e.g. "Temperature").
    pub publisher_id: String,
    /// Per-publisher counter, starting at 0 and incremented per attempt.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
}

impl StatusReport {
    pub fn new(publisher_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            publisher_id: publisher_id.into(),
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Text rendering, kept stable for existing consumers.
    pub fn text(&self) -> String {
        format!("{} is currently: {}", self.publisher_id, self.sequence)
    }

    /// Encode the report as an MQTT payload in the given format.
    pub fn encode(&self, format: PayloadFormat) -> Result<Vec<u8>, serde_json::Error> {
        match format {
            PayloadFormat::Text => Ok(self.text().into_bytes()),
            PayloadFormat::Json => serde_json::to_vec(self),
        }
    }
}
