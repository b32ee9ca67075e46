//! devpub publisher: periodic device status over MQTT/TLS.
//!
//! Connects every configured publisher, runs one publish loop per
//! publisher and stops on SIGINT/SIGTERM.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use dp_mqtt_channel::{LogObserver, MqttConnector};
use dp_publisher::config::PublisherConfig;
use dp_publisher::startup;

const DEFAULT_CONFIG_PATH: &str = "/etc/devpub/publishers.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dp-publisher starting");

    // ── Load config ─────────────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DEVPUB_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = PublisherConfig::from_file(&config_path)?;
    tracing::info!(
        path = %config_path,
        publishers = config.publishers.len(),
        "config loaded"
    );

    // ── Connect and launch publishers ───────────────────────────
    let session = config.session.clone();
    let fleet = startup::boot(&config, |transport| {
        MqttConnector::new(transport, session, Arc::new(LogObserver))
    })
    .await
    .inspect_err(|e| {
        let detail = format!("{e:#}");
        tracing::error!(error = %detail, "startup failed");
    })?;

    tracing::info!(
        publishers = ?fleet.publisher_ids(),
        "dp-publisher ready"
    );

    // ── Wait for SIGINT/SIGTERM ─────────────────────────────────
    let signal = shutdown_signal().await?;
    tracing::info!(signal, "shutdown signal received");

    let report = fleet.shutdown(config.shutdown_grace()).await;
    for drained in &report.drained {
        tracing::info!(
            publisher = %drained.publisher_id,
            attempts = drained.attempts,
            failures = drained.failures,
            "publisher stopped"
        );
    }
    if !report.aborted.is_empty() {
        tracing::warn!(publishers = ?report.aborted, "publishers aborted after grace period");
    }

    tracing::info!("dp-publisher stopped");
    Ok(())
}

/// Resolve with the name of the first termination signal received.
#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
