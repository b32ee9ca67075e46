//! MQTT channel for devpub publishers.
//!
//! Provides the connection layer for each publisher:
//! - `TransportConfig` built from a trusted-root PEM bundle
//! - `Descriptor` describing one publisher's identity and credentials
//! - `MqttChannel`, a supervised connection with lifecycle observers
//! - `Channel` / `Connector` traits (mockable in tests)
//! - `MockChannel` / `MockConnector` for testing without a broker

pub mod backoff;
pub mod channel;
pub mod config;
pub mod connector;
pub mod descriptor;
pub mod error;
pub mod mock;
pub mod supervisor;
pub mod tls;

// Re-exports for convenience.
pub use backoff::Backoff;
pub use channel::{Channel, MqttChannel};
pub use config::SessionConfig;
pub use connector::{Connector, MqttConnector};
pub use descriptor::{BrokerEndpoint, Descriptor};
pub use error::{MqttError, MqttResult};
pub use mock::{MockChannel, MockConnector, ObservedEvent, PublishedMessage, RecordingObserver};
pub use supervisor::{ConnectionObserver, ConnectionState, ConnectionStatus, LogObserver};
pub use tls::TransportConfig;

pub use rumqttc::QoS;
