//! Circuit state across runs: pre-tripped refusal and explicit reset.

use crate::prelude::*;
use looper_core::{CircuitState, HistoryEvent};
use tokio_util::sync::CancellationToken;

/// Scenario: a tripped circuit on disk blocks the run before any container.
#[tokio::test]
async fn pre_tripped_circuit_without_reset() {
    let h = harness();
    h.runner
        .store()
        .save_circuit(
            PROJECT,
            AGENT,
            &CircuitState::trip("stagnation: no progress for 3 loops", 1),
        )
        .unwrap();

    let result = h
        .runner
        .run(h.options(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.loops_completed, 0);
    assert!(result.exit_reason.contains("circuit already tripped"));
    assert!(result.error.is_some());
    assert_eq!(h.engine.created_count(), 0, "no container may be created");
}

/// `reset_circuit` clears the trip before iteration 1 and records a reset.
#[tokio::test]
async fn reset_circuit_allows_the_run() {
    let h = harness();
    h.runner
        .store()
        .save_circuit(
            PROJECT,
            AGENT,
            &CircuitState::trip("stagnation: same error 3 times: boom", 1),
        )
        .unwrap();
    h.queue_output(&status_block("COMPLETE", 1, 0, true));

    let mut opts = h.options();
    opts.reset_circuit = true;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 1);
    assert!(result.exit_reason.contains("completion"));
    assert!(h.runner.store().load_circuit(PROJECT, AGENT).unwrap().is_none());

    let history = h.runner.store().load_history(PROJECT, AGENT).unwrap();
    assert!(history.iter().any(|r| r.event == HistoryEvent::Reset));
}

/// A trip in one run blocks the next run until reset.
#[tokio::test]
async fn trip_then_refusal_then_reset_round_trip() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));

    let mut opts = h.options();
    opts.stagnation_threshold = 1;
    opts.max_loops = 5;
    let first = h.runner.run(opts, CancellationToken::new()).await.unwrap();
    assert!(first.exit_reason.contains("stagnation"));

    // Second run refuses
    let second = h
        .runner
        .run(h.options(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.loops_completed, 0);
    assert!(second.exit_reason.contains("circuit already tripped"));

    // Third run resets and proceeds
    h.queue_output(&status_block("COMPLETE", 1, 0, true));
    let mut opts = h.options();
    opts.reset_circuit = true;
    let third = h.runner.run(opts, CancellationToken::new()).await.unwrap();
    assert!(third.exit_reason.contains("completion"));
}

/// Expiration clears the session but leaves the circuit tripped.
#[tokio::test]
async fn expiration_does_not_clear_the_circuit() {
    let h = harness();
    h.runner
        .store()
        .save_circuit(
            PROJECT,
            AGENT,
            &CircuitState::trip("stagnation: no progress for 3 loops", 1),
        )
        .unwrap();
    let stale = looper_core::Session::new(PROJECT, AGENT, WORK_DIR, "old", 1);
    h.runner.store().save_session(&stale).unwrap();

    let mut opts = h.options();
    opts.session_expiration_hours = 1;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert!(result.exit_reason.contains("circuit already tripped"));
    assert!(h.runner.store().load_circuit(PROJECT, AGENT).unwrap().is_some());
}
