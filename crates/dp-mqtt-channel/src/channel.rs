//! MQTT channel: one supervised broker connection per publisher.
//!
//! Wraps `rumqttc::AsyncClient` and spawns the event-loop driver that
//! keeps the session alive. `connect` returns only once the broker has
//! accepted the session (or refused it).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS, Transport};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use dp_protocol::topics;

use crate::backoff::Backoff;
use crate::config::SessionConfig;
use crate::descriptor::Descriptor;
use crate::error::{MqttError, MqttResult};
use crate::supervisor::{self, ConnectionObserver, ConnectionState, ConnectionStatus, Supervisor};
use crate::tls::TransportConfig;

/// Upper bound for handing the DISCONNECT packet to the session at shutdown.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

// ── Channel trait ─────────────────────────────────────────────

/// Abstraction over one publisher's broker session.
///
/// Enables mocking in tests without a real MQTT broker.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publish a raw payload to a topic, waiting until the session has
    /// taken it.
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()>;

    /// Current session state.
    fn state(&self) -> ConnectionState;

    /// Best-effort disconnect. The channel is unusable afterwards.
    async fn disconnect(&self) -> MqttResult<()>;
}

#[async_trait]
impl<C: Channel + ?Sized> Channel for Arc<C> {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        (**self).publish(topic, payload, qos).await
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    async fn disconnect(&self) -> MqttResult<()> {
        (**self).disconnect().await
    }
}

// ── MqttChannel ───────────────────────────────────────────────

/// Connection handle for one publisher.
///
/// Owns the `AsyncClient` used for publishing; the `EventLoop` lives in
/// a spawned driver task that handles reconnection.
pub struct MqttChannel {
    client: AsyncClient,
    publisher_id: String,
    status: watch::Receiver<ConnectionStatus>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MqttChannel {
    /// Connect a publisher to its broker.
    ///
    /// Waits for the broker's CONNACK. Any failure before that (bad URL,
    /// empty client ID, TCP/TLS error, refused credentials) is returned
    /// as an error and nothing keeps running in the background.
    pub async fn connect(
        descriptor: &Descriptor,
        transport: &TransportConfig,
        session: &SessionConfig,
        observer: Arc<dyn ConnectionObserver>,
    ) -> MqttResult<Self> {
        let options = mqtt_options(descriptor, transport, session)?;
        let (client, eventloop) = AsyncClient::new(options, session.request_capacity.max(1));

        let supervisor = Supervisor::new(descriptor.id(), observer);
        let status = supervisor.subscribe();
        let (ready_tx, ready_rx) = oneshot::channel();

        let driver = tokio::spawn(supervisor::drive(
            eventloop,
            supervisor,
            Backoff::from_config(session),
            ready_tx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                client,
                publisher_id: descriptor.id().to_string(),
                status,
                driver: Mutex::new(Some(driver)),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                driver.abort();
                Err(MqttError::Connection(
                    "connection driver stopped before the broker answered".into(),
                ))
            }
        }
    }

    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    /// Current state plus the last connection error, if any.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    fn take_driver(&self) -> Option<JoinHandle<()>> {
        match self.driver.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Translate a descriptor into rumqttc options.
fn mqtt_options(
    descriptor: &Descriptor,
    transport: &TransportConfig,
    session: &SessionConfig,
) -> MqttResult<MqttOptions> {
    let endpoint = descriptor.endpoint()?;

    // rumqttc panics on an empty or space-prefixed client ID.
    let client_id = descriptor.client_id();
    if client_id.is_empty() || client_id.starts_with(' ') {
        return Err(MqttError::Connection(format!(
            "invalid client ID '{client_id}'"
        )));
    }

    let mut options = MqttOptions::new(client_id, &endpoint.host, endpoint.port);
    options.set_keep_alive(session.keepalive());
    options.set_clean_session(true);

    if !descriptor.username().is_empty() {
        options.set_credentials(descriptor.username(), descriptor.password());
    }

    if endpoint.secure {
        options.set_transport(transport.to_transport());
    } else {
        tracing::warn!(
            publisher = %descriptor.id(),
            host = %endpoint.host,
            "plaintext MQTT transport (no TLS)"
        );
        options.set_transport(Transport::Tcp);
    }

    Ok(options)
}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> MqttResult<()> {
        topics::validate_publish_topic(topic).map_err(|e| MqttError::Publish(e.to_string()))?;
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    async fn disconnect(&self) -> MqttResult<()> {
        let sent = tokio::time::timeout(DISCONNECT_TIMEOUT, self.client.disconnect()).await;
        let driver = self.take_driver();

        let result = match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MqttError::Other(format!("disconnect failed: {e}"))),
            Err(_) => Err(MqttError::Other("disconnect timed out".into())),
        };

        if let Some(mut driver) = driver {
            if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut driver)
                .await
                .is_err()
            {
                driver.abort();
            }
        }

        result
    }
}
