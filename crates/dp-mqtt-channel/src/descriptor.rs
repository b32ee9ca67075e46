//! Publisher descriptors: who a publisher is and where it connects.

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::error::{MqttError, MqttResult};

const DEFAULT_TLS_PORT: u16 = 8883;
const DEFAULT_TCP_PORT: u16 = 1883;

/// Immutable identity, credentials and target topic of one publisher.
///
/// Construction performs no validation: an empty broker URL or client
/// ID surfaces as a connection failure when the publisher connects.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Descriptor {
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    client_id: String,
    broker_url: String,
    topic: String,
}

impl Descriptor {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
        broker_url: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
            client_id: client_id.into(),
            broker_url: broker_url.into(),
            topic: topic.into(),
        }
    }

    /// Human-readable publisher ID, unique within the process.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// MQTT client ID (must be unique among clients connected to the broker).
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Resolve the broker URL into a host, port and transport choice.
    pub fn endpoint(&self) -> MqttResult<BrokerEndpoint> {
        BrokerEndpoint::parse(&self.broker_url)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("broker_url", &self.broker_url)
            .field("topic", &self.topic)
            .finish()
    }
}

/// Broker address derived from a descriptor's URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    /// `true` for TLS schemes (`ssl`, `tls`, `mqtts`).
    pub secure: bool,
}

impl BrokerEndpoint {
    /// Parse `ssl://host:port` style broker URLs.
    pub fn parse(raw: &str) -> MqttResult<Self> {
        let invalid = |reason: String| MqttError::InvalidBrokerUrl {
            url: raw.to_string(),
            reason,
        };

        if raw.trim().is_empty() {
            return Err(invalid("broker URL is empty".into()));
        }

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

        let (secure, default_port) = match url.scheme() {
            "ssl" | "tls" | "mqtts" => (true, DEFAULT_TLS_PORT),
            "tcp" | "mqtt" => (false, DEFAULT_TCP_PORT),
            other => return Err(invalid(format!("unsupported scheme '{other}'"))),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".into()))?;

        Ok(Self {
            host: host.to_string(),
            port: url.port().unwrap_or(default_port),
            secure,
        })
    }
}
