//! Stagnation trips: the circuit breaker ends runs that stop progressing.

use crate::prelude::*;
use looper_core::HistoryEvent;
use tokio_util::sync::CancellationToken;

/// Scenario: every iteration reports zero progress; trips at the threshold.
#[tokio::test]
async fn stagnation_trip_at_threshold() {
    let h = harness();
    for _ in 0..20 {
        h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));
    }

    let mut opts = h.options();
    opts.max_loops = 20;
    opts.stagnation_threshold = 3;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 3);
    assert!(result.exit_reason.contains("stagnation"));
    assert!(result.error.is_some());

    let circuit = h.runner.store().load_circuit(PROJECT, AGENT).unwrap().unwrap();
    assert!(circuit.tripped);
    assert!(!circuit.trip_reason.is_empty());
    assert!(circuit.tripped_at_ms.is_some());

    let history = h.runner.store().load_history(PROJECT, AGENT).unwrap();
    let trips = history.iter().filter(|r| r.event == HistoryEvent::Trip).count();
    assert_eq!(trips, 1, "exactly one trip event per trip");
}

/// Scenario: the agent never emits a status block at all.
#[tokio::test]
async fn missing_status_block_stagnates() {
    let h = harness();
    for _ in 0..10 {
        h.queue_output("I did some work but forgot the status block\n");
    }

    let mut opts = h.options();
    opts.max_loops = 10;
    opts.stagnation_threshold = 3;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert!(result.exit_reason.contains("stagnation"));
    assert!((3..=4).contains(&result.loops_completed));
}

/// The no-progress streak tracks the current suffix of idle iterations.
#[tokio::test]
async fn progress_resets_the_streak() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));
    h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));
    h.queue_output(&status_block("IN_PROGRESS", 1, 0, false));
    for _ in 0..3 {
        h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));
    }

    let mut opts = h.options();
    opts.max_loops = 10;
    opts.stagnation_threshold = 3;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    // Two idle, one productive, then three idle → trips at loop 6
    assert_eq!(result.loops_completed, 6);
    assert!(result.exit_reason.contains("stagnation"));
}

/// Repeating the same error signature trips the same-error rule.
#[tokio::test]
async fn same_error_signature_trips() {
    let h = harness();
    for _ in 0..5 {
        h.queue_output("error: connection refused by registry\n");
    }

    let mut opts = h.options();
    opts.max_loops = 10;
    opts.stagnation_threshold = 10;
    opts.same_error_threshold = 3;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 3);
    assert!(result.exit_reason.contains("same error"));
    assert!(result.exit_reason.contains("connection refused"));
}

/// Session counters satisfy the per-iteration invariants after a trip.
#[tokio::test]
async fn counters_match_iteration_sums() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 2, 1, false));
    h.queue_output(&status_block("IN_PROGRESS", 0, 3, false));
    for _ in 0..3 {
        h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));
    }

    let mut opts = h.options();
    opts.max_loops = 10;
    opts.stagnation_threshold = 3;
    h.runner.run(opts, CancellationToken::new()).await.unwrap();

    let session = h.runner.store().load_session(PROJECT, AGENT).unwrap().unwrap();
    assert_eq!(session.loops_completed, 5);
    assert_eq!(session.total_tasks_completed, 2);
    assert_eq!(session.total_files_modified, 4);
    assert_eq!(session.no_progress_count, 3);
}
