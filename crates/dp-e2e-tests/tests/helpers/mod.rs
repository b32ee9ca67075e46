//! Shared test harness for E2E integration tests.
//!
//! Runs the real orchestrator and publish loops against a
//! `MockConnector`, so every publisher talks to its own `MockChannel`.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use dp_mqtt_channel::{Descriptor, MockChannel, MockConnector};
use dp_protocol::PayloadFormat;
use dp_publisher::orchestrator::{self, Fleet, StartupError};
use dp_publisher::publish_loop::PublisherPlan;

pub const SAMPLE_PEM: &str = include_str!("../../../dp-mqtt-channel/testdata/test-ca.pem");

/// The three device publishers of the reference deployment.
pub const DEVICES: [(&str, u64); 3] = [("Temperature", 3), ("Speed", 5), ("Pressure", 7)];

pub fn plan(id: &str, interval_secs: u64) -> PublisherPlan {
    PublisherPlan {
        descriptor: Descriptor::new(
            id,
            "device",
            "secret",
            format!("{}-client", id.to_lowercase()),
            "ssl://broker.example.com:8883",
            dp_protocol::topics::device_status(id),
        ),
        interval: Duration::from_secs(interval_secs),
        format: PayloadFormat::Text,
    }
}

pub fn device_plans() -> Vec<PublisherPlan> {
    DEVICES.iter().map(|(id, secs)| plan(id, *secs)).collect()
}

/// Orchestrator wired to a mock broker connection per publisher.
pub struct TestHarness {
    pub connector: Arc<MockConnector>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            connector: Arc::new(MockConnector::new()),
        }
    }

    pub async fn start(&self, plans: Vec<PublisherPlan>) -> Result<Fleet, StartupError> {
        orchestrator::start(&self.connector, plans).await
    }

    /// Mock channel of a connected publisher.
    pub fn channel(&self, publisher_id: &str) -> Arc<MockChannel> {
        self.connector
            .channel(publisher_id)
            .unwrap_or_else(|| panic!("{publisher_id} never connected"))
    }

    /// Sequence numbers successfully published by `publisher_id`.
    pub fn sequences(&self, publisher_id: &str) -> Vec<u64> {
        let prefix = format!("{publisher_id} is currently: ");
        self.channel(publisher_id)
            .published()
            .iter()
            .map(|m| {
                m.payload_str()
                    .strip_prefix(&prefix)
                    .and_then(|n| n.parse().ok())
                    .unwrap_or_else(|| panic!("unexpected payload {:?}", m.payload_str()))
            })
            .collect()
    }
}

/// Write `contents` to a temporary file and return its handle.
pub fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// TOML config for the three reference devices using `ca_cert_path`.
pub fn device_config_toml(ca_cert_path: &str) -> String {
    let mut toml = format!("ca_cert_path = \"{ca_cert_path}\"\nshutdown_grace_secs = 2\n");
    for (id, secs) in DEVICES {
        toml.push_str(&format!(
            r#"
[[publishers]]
id = "{id}"
broker_url = "ssl://broker.example.com:8883"
username = "device"
password = "secret"
client_id = "{client}"
topic = "{topic}"
interval_secs = {secs}
"#,
            client = format!("{}-client", id.to_lowercase()),
            topic = dp_protocol::topics::device_status(id),
        ));
    }
    toml
}
