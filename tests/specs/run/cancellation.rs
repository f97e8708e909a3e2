//! Cooperative cancellation: one token governs the whole run.

use crate::prelude::*;
use looper_adapters::container::FakeRun;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Scenario: container sleeps 300s, cancelled after a moment; the run
/// returns promptly and the interrupted iteration does not count.
#[tokio::test]
async fn cancellation_mid_iteration() {
    let h = harness();
    h.engine.queue_run(
        FakeRun::plain(Vec::new(), 0).with_wait_delay(Duration::from_secs(300)),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = h.runner.run(h.options(), cancel).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(result.loops_completed, 0);
    assert!(result.exit_reason.contains("context cancelled"));
    assert!(result.error.is_none());
}

/// The interrupted container is still cleaned up.
#[tokio::test]
async fn cancelled_container_is_released() {
    let h = harness();
    h.engine.queue_run(
        FakeRun::plain(Vec::new(), 0).with_wait_delay(Duration::from_secs(300)),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    h.runner.run(h.options(), cancel).await.unwrap();
    assert_eq!(h.engine.removed().len(), 1);
}

/// A token cancelled before the run starts stops it before any container.
#[tokio::test]
async fn pre_cancelled_token_runs_nothing() {
    let h = harness();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h.runner.run(h.options(), cancel).await.unwrap();
    assert_eq!(result.loops_completed, 0);
    assert!(result.exit_reason.contains("context cancelled"));
    assert_eq!(h.engine.created_count(), 0);
}

/// Cancellation between iterations keeps already-settled loops.
#[tokio::test]
async fn cancellation_during_delay() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 1, 0, false));

    let mut opts = h.options();
    opts.max_loops = 10;
    opts.loop_delay = Duration::from_secs(120);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = h.runner.run(opts, cancel).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(result.loops_completed, 1);
    assert!(result.exit_reason.contains("context cancelled"));
}
