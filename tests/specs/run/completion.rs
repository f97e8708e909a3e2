//! Completion exits: the agent reports COMPLETE with an exit signal.

use crate::prelude::*;
use looper_core::StatusKind;
use tokio_util::sync::CancellationToken;

/// Scenario: one iteration, agent completes immediately.
#[tokio::test]
async fn single_iteration_completion() {
    let h = harness();
    h.queue_output(&status_block("COMPLETE", 1, 2, true));

    let mut opts = h.options();
    opts.max_loops = 1;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 1);
    assert!(result.exit_reason.contains("completion"));
    assert!(result.error.is_none());

    let session = h.runner.store().load_session(PROJECT, AGENT).unwrap().unwrap();
    assert_eq!(session.loops_completed, 1);
    assert_eq!(session.total_tasks_completed, 1);
    assert_eq!(session.total_files_modified, 2);

    // No circuit state was created
    assert!(h.runner.store().load_circuit(PROJECT, AGENT).unwrap().is_none());
}

/// Scenario: progress first, then completion; totals accumulate.
#[tokio::test]
async fn progress_then_completion() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 1, 1, false));
    h.queue_output(&status_block("COMPLETE", 2, 3, true));

    let mut opts = h.options();
    opts.max_loops = 10;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 2);
    let status = result.final_status.unwrap();
    assert_eq!(status.status, StatusKind::Complete);
    assert!(status.exit_signal);

    let session = h.runner.store().load_session(PROJECT, AGENT).unwrap().unwrap();
    assert_eq!(session.total_tasks_completed, 3);
    assert_eq!(session.total_files_modified, 4);
}

/// COMPLETE without an exit signal keeps looping until max loops.
#[tokio::test]
async fn complete_without_exit_signal_keeps_going() {
    let h = harness();
    h.queue_output(&status_block("COMPLETE", 1, 0, false));
    h.queue_output(&status_block("COMPLETE", 1, 0, false));

    let mut opts = h.options();
    opts.max_loops = 2;
    let result = h.runner.run(opts, CancellationToken::new()).await.unwrap();

    assert_eq!(result.loops_completed, 2);
    assert_eq!(result.exit_reason, "max loops reached");
}

/// The status block may be buried in chatter and NDJSON events.
#[tokio::test]
async fn status_block_amid_mixed_output() {
    let h = harness();
    let output = format!(
        "{}\n{}\n{}",
        r#"{"type":"system","subtype":"init"}"#,
        "Let me wrap up.",
        status_block("COMPLETE", 1, 0, true),
    );
    h.queue_output(&output);

    let result = h
        .runner
        .run(h.options(), CancellationToken::new())
        .await
        .unwrap();
    assert!(result.exit_reason.contains("completion"));
}
