//! What an external status reader can see while and after a run.

use crate::prelude::*;
use looper_adapters::parse_status;
use looper_core::HistoryEvent;
use looper_engine::build_system_prompt;
use tokio_util::sync::CancellationToken;

/// The session file appears with work_dir and prompt recorded, before the
/// outcome of any iteration matters.
#[tokio::test]
async fn session_records_run_inputs() {
    let h = harness();
    h.queue_output(&status_block("COMPLETE", 1, 0, true));

    let mut opts = h.options();
    opts.prompt = "migrate the storage layer".to_string();
    h.runner.run(opts, CancellationToken::new()).await.unwrap();

    let session = h.runner.store().load_session(PROJECT, AGENT).unwrap().unwrap();
    assert_eq!(session.work_dir, WORK_DIR);
    assert_eq!(session.prompt, "migrate the storage layer");
    assert!(session.updated_at_ms >= session.started_at_ms);
}

/// Rate-limit usage is visible in the session record.
#[tokio::test]
async fn rate_limit_usage_is_observable() {
    let h = harness();
    h.queue_output(&status_block("IN_PROGRESS", 1, 0, false));
    h.queue_output(&status_block("COMPLETE", 1, 0, true));

    let mut opts = h.options();
    opts.max_loops = 2;
    opts.calls_per_hour = 50;
    h.runner.run(opts, CancellationToken::new()).await.unwrap();

    let session = h.runner.store().load_session(PROJECT, AGENT).unwrap().unwrap();
    assert_eq!(session.rate_limit.calls, 2);
    assert!(session.rate_limit.window_start_ms > 0);
}

/// History tells the full story: created, one update per loop, trip.
#[tokio::test]
async fn history_is_append_only_and_ordered() {
    let h = harness();
    for _ in 0..2 {
        h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));
    }

    let mut opts = h.options();
    opts.max_loops = 10;
    opts.stagnation_threshold = 2;
    h.runner.run(opts, CancellationToken::new()).await.unwrap();

    let history = h.runner.store().load_history(PROJECT, AGENT).unwrap();
    let events: Vec<HistoryEvent> = history.iter().map(|r| r.event).collect();
    assert_eq!(
        events,
        vec![
            HistoryEvent::Created,
            HistoryEvent::Updated,
            HistoryEvent::Updated,
            HistoryEvent::Trip,
        ]
    );
    // Updated records carry the iteration and the status snapshot
    assert_eq!(history[1].iteration, Some(1));
    assert!(history[1].status.is_some());
    // The trip record carries its reason
    assert!(history[3].detail.as_deref().unwrap_or("").contains("stagnation"));
}

/// list_sessions surfaces every agent under a project.
#[tokio::test]
async fn list_sessions_shows_parallel_agents() {
    let h = harness();
    h.queue_output(&status_block("COMPLETE", 1, 0, true));
    h.queue_output(&status_block("COMPLETE", 1, 0, true));

    let mut first = h.options();
    first.agent = Some("loop-amber-otter".to_string());
    h.runner.run(first, CancellationToken::new()).await.unwrap();

    let mut second = h.options();
    second.agent = Some("loop-bold-wren".to_string());
    h.runner.run(second, CancellationToken::new()).await.unwrap();

    let sessions = h.runner.store().list_sessions(PROJECT).unwrap();
    let agents: Vec<&str> = sessions.iter().map(|s| s.agent.as_str()).collect();
    assert_eq!(agents, vec!["loop-amber-otter", "loop-bold-wren"]);
}

/// The on-disk layout is stable: sessions/, circuits/, history/ with
/// `<project>.<agent>` file names, plain JSON inside.
#[tokio::test]
async fn persistence_layout_is_stable() {
    let h = harness();
    for _ in 0..2 {
        h.queue_output(&status_block("IN_PROGRESS", 0, 0, false));
    }

    let mut opts = h.options();
    opts.max_loops = 5;
    opts.stagnation_threshold = 2;
    h.runner.run(opts, CancellationToken::new()).await.unwrap();

    let session_path = h.dir.path().join(format!("sessions/{PROJECT}.{AGENT}.json"));
    let circuit_path = h.dir.path().join(format!("circuits/{PROJECT}.{AGENT}.json"));
    let history_path = h.dir.path().join(format!("history/{PROJECT}.{AGENT}.jsonl"));
    assert!(session_path.is_file());
    assert!(circuit_path.is_file());
    assert!(history_path.is_file());

    let session: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session_path).unwrap()).unwrap();
    assert_eq!(session["project"], PROJECT);
    assert_eq!(session["loops_completed"], 2);

    let circuit: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&circuit_path).unwrap()).unwrap();
    assert_eq!(circuit["tripped"], true);

    // One JSON object per history line
    for line in std::fs::read_to_string(&history_path).unwrap().lines() {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(record.get("event").is_some());
    }
}

/// The agent-facing prompt's example block round-trips through the parser.
#[tokio::test]
async fn system_prompt_example_round_trips() {
    let prompt = build_system_prompt("");
    let status = parse_status(&prompt).expect("the documented example must parse");
    assert_eq!(status.status.as_token(), "IN_PROGRESS");
    assert!(!status.exit_signal);
}
