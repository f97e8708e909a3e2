//! Boundary behavior: extreme but legal option values.

use crate::prelude::*;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn max_loops_one_runs_exactly_one_iteration() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 1, 1, false));
    h.queue_output(&status_block("IN_PROGRESS", 1, 1, false));

    let mut opts = h.options();
    opts.max_loops = 1;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 1);
    assert_eq!(result.exit_reason, "max loops reached");
    assert_eq!(h.engine.created_count(), 1);
}

#[tokio::test]
async fn stagnation_threshold_one_trips_on_first_idle_loop() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));

    let mut opts = h.options();
    opts.max_loops = 10;
    opts.stagnation_threshold = 1;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 1);
    assert!(result.exit_reason.contains("stagnation"));
}

#[tokio::test]
async fn unlimited_calls_per_hour_never_blocks() {
    let h = harness();
    for _ in 0..5 {
        h.queue_output(&status_block("IN_PROGRESS", 1, 0, false));
    }

    let mut opts = h.options();
    opts.max_loops = 5;
    opts.calls_per_hour = 0;

    let started = Instant::now();
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 5);
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn expired_session_starts_from_zero() {
    let h = harness();
    // Session that started far in the past
    let stale = looper_core::Session::new(PROJECT, AGENT, WORK_DIR, "old prompt", 1);
    h.runner.store().save_session(&stale).unwrap();

    h.queue_output(&status_block("COMPLETE", 1, 0, true));
    let mut opts = h.options();
    opts.session_expiration_hours = 24;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 1);
    let session = h.runner.store().load_session(PROJECT, AGENT).unwrap().unwrap();
    assert_eq!(session.loops_completed, 1);
    assert_ne!(session.started_at_ms, 1, "session was recreated");
}

#[tokio::test]
async fn run_timeout_ends_a_long_run() {
    let h = harness();
    for _ in 0..100 {
        h.queue_output(&status_block("IN_PROGRESS", 1, 0, false));
    }

    let mut opts = h.options();
    opts.max_loops = 100;
    opts.loop_delay = Duration::from_millis(50);
    opts.timeout = Some(Duration::from_millis(200));

    let started = Instant::now();
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(result.exit_reason.contains("timeout"));
    assert!(result.loops_completed < 100);
}
