//! E2E tests for process shutdown.

mod helpers;

use std::time::Duration;

use dp_mqtt_channel::{Channel, ConnectionState};
use helpers::{DEVICES, TestHarness, device_plans};

/// Shutdown drains every loop and disconnects every handle.
#[tokio::test(start_paused = true)]
async fn e2e_shutdown_drains_and_disconnects() {
    let h = TestHarness::new();
    let fleet = h.start(device_plans()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let report = fleet.shutdown(Duration::from_secs(2)).await;

    assert_eq!(report.drained.len(), 3);
    assert!(report.aborted.is_empty());
    for (id, _) in DEVICES {
        let channel = h.channel(id);
        assert_eq!(channel.disconnect_count(), 1, "{id}");
        assert_eq!(channel.state(), ConnectionState::Disconnected, "{id}");
    }

    let attempts: Vec<(String, u64)> = report
        .drained
        .iter()
        .map(|r| (r.publisher_id.clone(), r.attempts))
        .collect();
    assert_eq!(
        attempts,
        vec![
            ("Temperature".to_string(), 3),
            ("Speed".to_string(), 2),
            ("Pressure".to_string(), 1),
        ]
    );
}

/// No publish happens after shutdown returns.
#[tokio::test(start_paused = true)]
async fn e2e_no_publishes_after_shutdown() {
    let h = TestHarness::new();
    let fleet = h.start(device_plans()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(7_500)).await;
    fleet.shutdown(Duration::from_secs(2)).await;
    let counts: Vec<usize> = DEVICES
        .iter()
        .map(|(id, _)| h.channel(id).publish_attempts())
        .collect();

    tokio::time::sleep(Duration::from_secs(60)).await;
    let later: Vec<usize> = DEVICES
        .iter()
        .map(|(id, _)| h.channel(id).publish_attempts())
        .collect();
    assert_eq!(counts, later);
}

/// A publish stuck on the broker cannot hold shutdown past the grace period.
#[tokio::test(start_paused = true)]
async fn e2e_shutdown_bounded_with_inflight_publish() {
    let h = TestHarness::new();
    let fleet = h.start(device_plans()).await.unwrap();
    h.channel("Speed").stall_publishes();
    h.channel("Pressure").stall_publishes();

    tokio::time::sleep(Duration::from_millis(7_500)).await;
    let grace = Duration::from_secs(3);
    let started = tokio::time::Instant::now();
    let report = fleet.shutdown(grace).await;

    assert!(tokio::time::Instant::now() - started <= grace);
    assert_eq!(report.drained.len(), 1);
    assert_eq!(report.drained[0].publisher_id, "Temperature");
    assert_eq!(
        report.aborted,
        vec!["Speed".to_string(), "Pressure".to_string()]
    );
}
