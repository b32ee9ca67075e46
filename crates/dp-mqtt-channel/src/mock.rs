//! Mock MQTT channel and connector for testing without a real broker.
//!
//! `MockChannel` records every publish and can simulate connection
//! loss, publish failures, slow brokers and a broker that never
//! acknowledges.
//! `MockConnector` hands out mock channels and can refuse selected
//! publishers. `RecordingObserver` captures lifecycle callbacks.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::QoS;

use crate::channel::Channel;
use crate::connector::Connector;
use crate::descriptor::Descriptor;
use crate::error::{MqttError, MqttResult};
use crate::supervisor::{ConnectionObserver, ConnectionState, ConnectionStatus};

/// A recorded publish call.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

impl PublishedMessage {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

/// Mock implementation of the `Channel` trait.
///
/// Stores all publishes in memory for test verification. Starts
/// connected, like a handle returned from a successful connect.
#[derive(Debug)]
pub struct MockChannel {
    published: Mutex<Vec<PublishedMessage>>,
    status: Mutex<ConnectionStatus>,
    publish_attempts: AtomicUsize,
    publish_failure: Mutex<Option<String>>,
    publish_delay: Mutex<Duration>,
    stalled: AtomicBool,
    disconnects: AtomicUsize,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            status: Mutex::new(ConnectionStatus {
                state: ConnectionState::Connected,
                last_error: None,
            }),
            publish_attempts: AtomicUsize::new(0),
            publish_failure: Mutex::new(None),
            publish_delay: Mutex::new(Duration::ZERO),
            stalled: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Get all successfully published messages.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Get the last published message.
    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.published.lock().unwrap().last().cloned()
    }

    /// Get published messages for a specific topic.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Publish calls made, including failed ones.
    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    /// Make every subsequent publish fail with `reason`.
    pub fn fail_publishes(&self, reason: impl Into<String>) {
        *self.publish_failure.lock().unwrap() = Some(reason.into());
    }

    /// Make subsequent publishes take `delay` before completing (slow
    /// broker). `Duration::ZERO` restores immediate completion.
    pub fn delay_publishes(&self, delay: Duration) {
        *self.publish_delay.lock().unwrap() = delay;
    }

    /// Make subsequent publishes never complete (unresponsive broker).
    pub fn stall_publishes(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Drop the session: publishes fail until [`restore_connection`](Self::restore_connection).
    pub fn simulate_connection_loss(&self, cause: impl Into<String>) {
        let mut status = self.status.lock().unwrap();
        status.state = ConnectionState::Disconnected;
        status.last_error = Some(cause.into());
    }

    pub fn restore_connection(&self) {
        self.status.lock().unwrap().state = ConnectionState::Connected;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.lock().unwrap().clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Clear all recorded state and injected faults.
    pub fn reset(&self) {
        self.published.lock().unwrap().clear();
        self.publish_attempts.store(0, Ordering::SeqCst);
        *self.publish_failure.lock().unwrap() = None;
        *self.publish_delay.lock().unwrap() = Duration::ZERO;
        self.stalled.store(false, Ordering::SeqCst);
        self.restore_connection();
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);

        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let delay = *self.publish_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        {
            let status = self.status.lock().unwrap();
            if status.state != ConnectionState::Connected {
                let cause = status.last_error.clone().unwrap_or_default();
                return Err(MqttError::ConnectionLost(cause));
            }
        }

        if let Some(reason) = self.publish_failure.lock().unwrap().clone() {
            return Err(MqttError::Publish(reason));
        }

        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.status.lock().unwrap().state
    }

    async fn disconnect(&self) -> MqttResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.status.lock().unwrap().state = ConnectionState::Disconnected;
        Ok(())
    }
}

// ── MockConnector ─────────────────────────────────────────────

/// Connector that creates a [`MockChannel`] per publisher.
#[derive(Debug, Default)]
pub struct MockConnector {
    channels: Mutex<Vec<(String, Arc<MockChannel>)>>,
    refused: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the connection for the publisher with this ID.
    pub fn refuse(&self, publisher_id: impl Into<String>) {
        self.refused.lock().unwrap().insert(publisher_id.into());
    }

    /// Publisher IDs in the order connections were attempted.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// The channel handed out to `publisher_id`, if it connected.
    pub fn channel(&self, publisher_id: &str) -> Option<Arc<MockChannel>> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == publisher_id)
            .map(|(_, ch)| ch.clone())
    }

    pub fn channels(&self) -> Vec<(String, Arc<MockChannel>)> {
        self.channels.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Channel = Arc<MockChannel>;

    async fn connect(&self, descriptor: &Descriptor) -> MqttResult<Arc<MockChannel>> {
        self.attempts
            .lock()
            .unwrap()
            .push(descriptor.id().to_string());

        if self.refused.lock().unwrap().contains(descriptor.id()) {
            return Err(MqttError::Connection(format!(
                "broker refused client '{}'",
                descriptor.client_id()
            )));
        }

        let channel = Arc::new(MockChannel::new());
        self.channels
            .lock()
            .unwrap()
            .push((descriptor.id().to_string(), channel.clone()));
        Ok(channel)
    }
}

// ── RecordingObserver ─────────────────────────────────────────

/// A lifecycle callback captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    Connected(String),
    Lost(String, String),
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ConnectionObserver for RecordingObserver {
    fn on_connected(&self, publisher_id: &str) {
        self.events
            .lock()
            .unwrap()
            .push(ObservedEvent::Connected(publisher_id.to_string()));
    }

    fn on_connection_lost(&self, publisher_id: &str, cause: &str) {
        self.events.lock().unwrap().push(ObservedEvent::Lost(
            publisher_id.to_string(),
            cause.to_string(),
        ));
    }
}
