//! Connection lifecycle supervision.
//!
//! Each connection owns one `Supervisor` that tracks the session state
//! machine and notifies a [`ConnectionObserver`]:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected (loss) -> Connecting -> ...
//! ```
//!
//! [`drive`] polls the rumqttc event loop and feeds the supervisor.
//! rumqttc re-establishes the session on the next poll after an error,
//! so reconnection is a matter of waiting out the backoff and polling
//! again.

use std::sync::Arc;

use rumqttc::{ConnectReturnCode, ConnectionError, Event, EventLoop, Outgoing, Packet};
use tokio::sync::{oneshot, watch};

use crate::backoff::Backoff;
use crate::error::{MqttError, MqttResult};

/// Session state of one publisher connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of a connection: its state and the most recent error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
}

/// Passive callbacks for connection lifecycle events.
pub trait ConnectionObserver: Send + Sync {
    /// The broker accepted the session (initial connect or reconnect).
    fn on_connected(&self, publisher_id: &str);

    /// An established session dropped without being asked to.
    fn on_connection_lost(&self, publisher_id: &str, cause: &str);
}

/// Observer that writes lifecycle events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ConnectionObserver for LogObserver {
    fn on_connected(&self, publisher_id: &str) {
        tracing::info!(publisher = %publisher_id, "publisher connected");
    }

    fn on_connection_lost(&self, publisher_id: &str, cause: &str) {
        tracing::warn!(publisher = %publisher_id, error = %cause, "publisher lost connection");
    }
}

/// State machine for one connection.
pub struct Supervisor {
    publisher_id: String,
    status: watch::Sender<ConnectionStatus>,
    observer: Arc<dyn ConnectionObserver>,
}

impl Supervisor {
    pub fn new(publisher_id: impl Into<String>, observer: Arc<dyn ConnectionObserver>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            publisher_id: publisher_id.into(),
            status,
            observer,
        }
    }

    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// A (re)connection attempt is starting.
    pub fn begin_connect(&self) {
        self.status.send_modify(|s| s.state = ConnectionState::Connecting);
    }

    /// CONNACK received.
    pub fn connected(&self) {
        self.status.send_modify(|s| s.state = ConnectionState::Connected);
        self.observer.on_connected(&self.publisher_id);
    }

    /// The session failed or dropped. Returns `true` if an established
    /// session was lost, in which case the observer is notified.
    pub fn lost(&self, cause: &str) -> bool {
        let mut was_connected = false;
        self.status.send_modify(|s| {
            was_connected = s.state == ConnectionState::Connected;
            s.state = ConnectionState::Disconnected;
            s.last_error = Some(cause.to_string());
        });
        if was_connected {
            self.observer.on_connection_lost(&self.publisher_id, cause);
        }
        was_connected
    }

    /// Explicit shutdown: terminal, not reported as a loss.
    pub fn closed(&self) {
        self.status
            .send_modify(|s| s.state = ConnectionState::Disconnected);
    }
}

/// Drive the rumqttc event loop for one connection until it is closed.
///
/// The first outcome (CONNACK or error) is reported on `ready`. An
/// error before the first CONNACK ends the driver: initial connection
/// failures are not retried. After that, every error is treated as a
/// loss and retried after the backoff delay, forever.
pub async fn drive(
    mut eventloop: EventLoop,
    supervisor: Supervisor,
    mut backoff: Backoff,
    ready: oneshot::Sender<MqttResult<()>>,
) {
    let mut ready = Some(ready);
    supervisor.begin_connect();

    loop {
        let cause = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) if ack.code == ConnectReturnCode::Success => {
                supervisor.connected();
                backoff.reset();
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
                continue;
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                format!("connection refused by broker: {:?}", ack.code)
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                supervisor.lost("disconnected by broker");
                continue;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!(publisher = %supervisor.publisher_id(), "disconnect sent");
                supervisor.closed();
                return;
            }
            Ok(event) => {
                tracing::trace!(publisher = %supervisor.publisher_id(), ?event, "mqtt event");
                continue;
            }
            Err(ConnectionError::RequestsDone) => {
                supervisor.closed();
                return;
            }
            Err(e) => e.to_string(),
        };

        supervisor.lost(&cause);
        if let Some(tx) = ready.take() {
            let _ = tx.send(Err(MqttError::Connection(cause)));
            return;
        }

        let delay = backoff.next_delay();
        tracing::warn!(
            publisher = %supervisor.publisher_id(),
            error = %cause,
            attempt = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            "MQTT connection error, reconnecting"
        );
        tokio::time::sleep(delay).await;
        supervisor.begin_connect();
    }
}
