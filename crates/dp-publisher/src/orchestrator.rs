//! Starts every publisher and owns their lifetime.
//!
//! All connections are established one after another before any loop
//! starts; a single failed connection aborts the whole startup. Each
//! loop then runs on its own tokio task and shares nothing with the
//! others except the shutdown signal.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dp_mqtt_channel::{Channel, Connector, MqttError};

use crate::publish_loop::{self, LoopReport, PublisherPlan};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no publishers configured")]
    NoPublishers,

    #[error("{publisher} publisher failed to connect")]
    Connect {
        publisher: String,
        #[source]
        source: MqttError,
    },
}

/// Running publish loops.
pub struct Fleet {
    loops: Vec<(String, JoinHandle<LoopReport>)>,
    shutdown: watch::Sender<bool>,
}

/// What happened to each loop during shutdown.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Loops that stopped on their own, in start order.
    pub drained: Vec<LoopReport>,
    /// Loops still busy (e.g. waiting on the broker) when the grace
    /// period ran out; they were aborted.
    pub aborted: Vec<String>,
}

/// Connect every publisher, then launch one loop per publisher.
///
/// Connections are made sequentially in plan order. If one fails, the
/// handles opened so far are disconnected and no loop is started.
pub async fn start<C: Connector>(
    connector: &C,
    plans: Vec<PublisherPlan>,
) -> Result<Fleet, StartupError> {
    if plans.is_empty() {
        return Err(StartupError::NoPublishers);
    }

    let mut connected: Vec<(PublisherPlan, C::Channel)> = Vec::with_capacity(plans.len());
    for plan in plans {
        match connector.connect(&plan.descriptor).await {
            Ok(channel) => {
                tracing::info!(
                    publisher = %plan.descriptor.id(),
                    topic = %plan.descriptor.topic(),
                    interval_secs = plan.interval.as_secs_f64(),
                    "publisher ready"
                );
                connected.push((plan, channel));
            }
            Err(source) => {
                let publisher = plan.descriptor.id().to_string();
                tracing::error!(publisher = %publisher, error = %source, "publisher failed to connect");
                for (plan, channel) in &connected {
                    if let Err(e) = channel.disconnect().await {
                        tracing::debug!(publisher = %plan.descriptor.id(), error = %e, "disconnect failed");
                    }
                }
                return Err(StartupError::Connect { publisher, source });
            }
        }
    }

    let (shutdown, _) = watch::channel(false);
    let loops = connected
        .into_iter()
        .map(|(plan, channel)| {
            let id = plan.descriptor.id().to_string();
            let rx = shutdown.subscribe();
            let handle = tokio::spawn(async move {
                let report = publish_loop::run(&plan, &channel, rx).await;
                if let Err(e) = channel.disconnect().await {
                    tracing::debug!(publisher = %report.publisher_id, error = %e, "disconnect failed");
                }
                report
            });
            (id, handle)
        })
        .collect();

    Ok(Fleet { loops, shutdown })
}

impl Fleet {
    /// Number of running publish loops.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn publisher_ids(&self) -> Vec<&str> {
        self.loops.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Signal every loop to stop and wait up to `grace` for them.
    ///
    /// Loops finish their current publish, disconnect and report. Loops
    /// still running when the grace period ends are aborted.
    pub async fn shutdown(self, grace: Duration) -> ShutdownReport {
        self.shutdown.send_replace(true);
        // No deadline when the grace period does not fit on the clock.
        let deadline = tokio::time::Instant::now().checked_add(grace);
        let mut report = ShutdownReport::default();

        for (id, mut handle) in self.loops {
            let joined = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, &mut handle).await,
                None => Ok((&mut handle).await),
            };
            match joined {
                Ok(Ok(loop_report)) => report.drained.push(loop_report),
                Ok(Err(e)) => {
                    tracing::error!(publisher = %id, error = %e, "publish loop task failed");
                }
                Err(_) => {
                    tracing::warn!(publisher = %id, "publish loop did not stop in time, aborting");
                    handle.abort();
                    report.aborted.push(id);
                }
            }
        }

        report
    }
}
