//! Process startup: configuration checks, TLS material, connections.

use anyhow::Context;

use dp_mqtt_channel::{Connector, TransportConfig};

use crate::config::PublisherConfig;
use crate::orchestrator::{self, Fleet};

/// Validate `config`, load the CA bundle and start every publisher.
///
/// `build` turns the loaded TLS configuration into a connector. It is
/// only called once the bundle has loaded, so a bad bundle stops the
/// process before any connection is attempted.
pub async fn boot<C, F>(config: &PublisherConfig, build: F) -> anyhow::Result<Fleet>
where
    C: Connector,
    F: FnOnce(TransportConfig) -> C,
{
    config.validate().context("invalid configuration")?;

    let transport =
        TransportConfig::load(&config.ca_cert_path).context("failed to load TLS configuration")?;
    tracing::info!(
        path = %config.ca_cert_path,
        certificates = transport.certificate_count(),
        "trusted root certificates loaded"
    );

    let connector = build(transport);
    let fleet = orchestrator::start(&connector, config.plans()).await?;
    Ok(fleet)
}
