//! Periodic status publisher.
//!
//! Sends a `StatusReport` on the publisher's topic at a fixed interval
//! until shutdown is signalled.

use std::time::Duration;

use rumqttc::QoS;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use dp_mqtt_channel::{Channel, Descriptor};
use dp_protocol::{PayloadFormat, StatusReport};

/// Everything needed to run one publisher.
#[derive(Debug, Clone)]
pub struct PublisherPlan {
    pub descriptor: Descriptor,
    /// Time between two ticks.
    pub interval: Duration,
    pub format: PayloadFormat,
}

/// Outcome of a finished publish loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopReport {
    pub publisher_id: String,
    /// Publishes attempted; equals the next sequence number.
    pub attempts: u64,
    /// Attempts that returned an error.
    pub failures: u64,
}

/// Run the publish loop for one publisher until `shutdown` turns true
/// (or its sender is dropped).
///
/// The first tick fires one interval after start. Each tick's publish is
/// awaited before the next tick is considered; a late tick delays the
/// schedule rather than bursting to catch up. Shutdown is only observed
/// while waiting for a tick, never in the middle of a publish.
pub async fn run<C: Channel + ?Sized>(
    plan: &PublisherPlan,
    channel: &C,
    mut shutdown: watch::Receiver<bool>,
) -> LoopReport {
    let publisher = plan.descriptor.id();
    let topic = plan.descriptor.topic();

    let mut ticker = time::interval(plan.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first tick (fires immediately).
    ticker.tick().await;

    let mut report = LoopReport {
        publisher_id: publisher.to_string(),
        attempts: 0,
        failures: 0,
    };

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let sequence = report.attempts;
        let status = StatusReport::new(publisher, sequence);

        let outcome = match status.encode(plan.format) {
            Ok(payload) => channel
                .publish(topic, &payload, QoS::AtMostOnce)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(format!("failed to encode status report: {e}")),
        };

        if let Err(e) = outcome {
            report.failures += 1;
            tracing::warn!(
                publisher = %publisher,
                topic = %topic,
                sequence,
                error = %e,
                "failed to publish status"
            );
        } else {
            tracing::debug!(publisher = %publisher, sequence, "status published");
        }

        report.attempts += 1;
    }

    tracing::info!(
        publisher = %publisher,
        attempts = report.attempts,
        failures = report.failures,
        "publish loop stopped"
    );
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use dp_mqtt_channel::MockChannel;

    fn plan(id: &str, secs: u64, format: PayloadFormat) -> PublisherPlan {
        PublisherPlan {
            descriptor: Descriptor::new(
                id,
                "",
                "",
                format!("{id}-client"),
                "ssl://broker:8883",
                format!("topic/device/{}", id.to_lowercase()),
            ),
            interval: Duration::from_secs(secs),
            format,
        }
    }

    /// Spawn a loop, let `elapsed` pass, stop it and return its report.
    async fn run_for(
        plan: PublisherPlan,
        channel: Arc<MockChannel>,
        elapsed: Duration,
    ) -> LoopReport {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { run(&plan, &channel, rx).await });
        time::sleep(elapsed).await;
        tx.send(true).unwrap();
        task.await.unwrap()
    }

    /// Publish attempts seen by `channel` once the clock reaches `at`.
    async fn attempts_at(channel: &MockChannel, at: time::Instant) -> usize {
        time::sleep_until(at).await;
        channel.publish_attempts()
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_once_per_interval() {
        let channel = Arc::new(MockChannel::new());
        let report = run_for(
            plan("Temperature", 3, PayloadFormat::Text),
            channel.clone(),
            Duration::from_millis(10_500),
        )
        .await;

        // Ticks at 3, 6, 9 seconds.
        assert_eq!(report.attempts, 3);
        assert_eq!(report.failures, 0);
        assert_eq!(channel.published().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_publish_before_first_interval() {
        let channel = Arc::new(MockChannel::new());
        let report = run_for(
            plan("Speed", 5, PayloadFormat::Text),
            channel.clone(),
            Duration::from_millis(4_900),
        )
        .await;
        assert_eq!(report.attempts, 0);
        assert!(channel.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_starts_at_zero_and_increments() {
        let channel = Arc::new(MockChannel::new());
        run_for(
            plan("Pressure", 1, PayloadFormat::Text),
            channel.clone(),
            Duration::from_millis(4_500),
        )
        .await;

        let payloads: Vec<String> = channel
            .published()
            .iter()
            .map(|m| m.payload_str().to_string())
            .collect();
        assert_eq!(
            payloads,
            vec![
                "Pressure is currently: 0",
                "Pressure is currently: 1",
                "Pressure is currently: 2",
                "Pressure is currently: 3",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_to_descriptor_topic_at_most_once() {
        let channel = Arc::new(MockChannel::new());
        run_for(
            plan("Speed", 2, PayloadFormat::Text),
            channel.clone(),
            Duration::from_millis(2_500),
        )
        .await;

        let msg = channel.last_published().unwrap();
        assert_eq!(msg.topic, "topic/device/speed");
        assert_eq!(msg.qos, QoS::AtMostOnce);
    }

    #[tokio::test(start_paused = true)]
    async fn json_format_payload() {
        let channel = Arc::new(MockChannel::new());
        run_for(
            plan("Speed", 2, PayloadFormat::Json),
            channel.clone(),
            Duration::from_millis(4_500),
        )
        .await;

        let published = channel.published();
        assert_eq!(published.len(), 2);
        let second: StatusReport = serde_json::from_slice(&published[1].payload).unwrap();
        assert_eq!(second.publisher_id, "Speed");
        assert_eq!(second.sequence, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_errors_are_counted_and_loop_continues() {
        let channel = Arc::new(MockChannel::new());
        channel.fail_publishes("broker rejected message");

        let report = run_for(
            plan("Temperature", 1, PayloadFormat::Text),
            channel.clone(),
            Duration::from_millis(3_500),
        )
        .await;

        assert_eq!(report.attempts, 3);
        assert_eq!(report.failures, 3);
        assert_eq!(channel.publish_attempts(), 3);
        assert!(channel.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_advances_across_failed_attempts() {
        let channel = Arc::new(MockChannel::new());
        let (tx, rx) = watch::channel(false);
        let p = plan("Speed", 1, PayloadFormat::Text);
        let ch = channel.clone();
        let task = tokio::spawn(async move { run(&p, &ch, rx).await });

        time::sleep(Duration::from_millis(1_500)).await; // seq 0 ok
        channel.simulate_connection_loss("network down");
        time::sleep(Duration::from_secs(2)).await; // seq 1, 2 fail
        channel.restore_connection();
        time::sleep(Duration::from_secs(1)).await; // seq 3 ok
        tx.send(true).unwrap();
        let report = task.await.unwrap();

        assert_eq!(report.attempts, 4);
        assert_eq!(report.failures, 2);
        let payloads: Vec<String> = channel
            .published()
            .iter()
            .map(|m| m.payload_str().to_string())
            .collect();
        assert_eq!(
            payloads,
            vec!["Speed is currently: 0", "Speed is currently: 3"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_publish_delays_next_tick_without_catch_up() {
        let channel = Arc::new(MockChannel::new());
        channel.delay_publishes(Duration::from_millis(2_500));

        let (tx, rx) = watch::channel(false);
        let p = plan("Pressure", 1, PayloadFormat::Text);
        let ch = channel.clone();
        let start = time::Instant::now();
        let task = tokio::spawn(async move { run(&p, &ch, rx).await });
        let attempts_by = |ms: u64| attempts_at(&channel, start + Duration::from_millis(ms));

        // Tick at 1s starts a publish that takes until 3.5s.
        assert_eq!(attempts_by(1_500).await, 1);
        channel.delay_publishes(Duration::ZERO);
        assert_eq!(attempts_by(3_400).await, 1);

        // The ticks due at 2s and 3s collapse into one late tick at 3.5s...
        assert_eq!(attempts_by(3_600).await, 2);
        assert_eq!(channel.published().len(), 2);
        // ...and the schedule restarts from there: 4.5s, 5.5s.
        assert_eq!(attempts_by(4_400).await, 2);
        assert_eq!(attempts_by(4_600).await, 3);
        assert_eq!(attempts_by(5_600).await, 4);

        tx.send(true).unwrap();
        let report = task.await.unwrap();
        assert_eq!(report.attempts, 4);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_publish_blocks_further_ticks() {
        let channel = Arc::new(MockChannel::new());
        channel.stall_publishes();

        let (tx, rx) = watch::channel(false);
        let p = plan("Pressure", 1, PayloadFormat::Text);
        let ch = channel.clone();
        let task = tokio::spawn(async move { run(&p, &ch, rx).await });

        time::sleep(Duration::from_secs(10)).await;
        // The first publish never completes, so no further tick starts.
        assert_eq!(channel.publish_attempts(), 1);

        tx.send(true).unwrap();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_shutdown_sender_dropped() {
        let channel = Arc::new(MockChannel::new());
        let (tx, rx) = watch::channel(false);
        let p = plan("Speed", 1, PayloadFormat::Text);
        let ch = channel.clone();
        let task = tokio::spawn(async move { run(&p, &ch, rx).await });

        time::sleep(Duration::from_millis(2_500)).await;
        drop(tx);
        let report = task.await.unwrap();
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn already_signalled_shutdown_publishes_nothing() {
        let channel = MockChannel::new();
        let (_tx, rx) = watch::channel(true);
        let report = run(&plan("Speed", 1, PayloadFormat::Text), &channel, rx).await;
        assert_eq!(report.attempts, 0);
        assert_eq!(channel.publish_attempts(), 0);
    }
}
