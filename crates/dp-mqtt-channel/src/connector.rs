//! Factories that turn a descriptor into a connected channel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::{Channel, MqttChannel};
use crate::config::SessionConfig;
use crate::descriptor::Descriptor;
use crate::error::MqttResult;
use crate::supervisor::ConnectionObserver;
use crate::tls::TransportConfig;

/// Opens one connection per publisher.
#[async_trait]
pub trait Connector: Send + Sync {
    type Channel: Channel + 'static;

    /// Connect and wait for the broker to accept the session.
    async fn connect(&self, descriptor: &Descriptor) -> MqttResult<Self::Channel>;
}

#[async_trait]
impl<T: Connector> Connector for Arc<T> {
    type Channel = T::Channel;

    async fn connect(&self, descriptor: &Descriptor) -> MqttResult<Self::Channel> {
        (**self).connect(descriptor).await
    }
}

/// Production connector: TLS sessions against real brokers.
pub struct MqttConnector {
    transport: TransportConfig,
    session: SessionConfig,
    observer: Arc<dyn ConnectionObserver>,
}

impl MqttConnector {
    pub fn new(
        transport: TransportConfig,
        session: SessionConfig,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Self {
        Self {
            transport,
            session,
            observer,
        }
    }
}

#[async_trait]
impl Connector for MqttConnector {
    type Channel = MqttChannel;

    async fn connect(&self, descriptor: &Descriptor) -> MqttResult<MqttChannel> {
        tracing::debug!(
            publisher = %descriptor.id(),
            broker = %descriptor.broker_url(),
            client_id = %descriptor.client_id(),
            "connecting"
        );
        MqttChannel::connect(
            descriptor,
            &self.transport,
            &self.session,
            self.observer.clone(),
        )
        .await
    }
}
