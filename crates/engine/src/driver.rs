// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Iteration driver.
//!
//! One `run` invocation drives iterations sequentially:
//!
//! ```text
//!  START → PRE_FLIGHT → [tripped? → EXIT_TRIPPED]
//!         → INIT_SESSION → LOOP
//!  LOOP   → RATE_GATE → CREATE → CAPTURE → PARSE → UPDATE
//!         → exit decision → DELAY → LOOP
//! ```
//!
//! Each iteration body (create, capture, parse) runs in its own task so a
//! panic surfaces as a join error and becomes a trip instead of unwinding
//! into the caller. Session mutations for iteration N are persisted before
//! iteration N+1 begins.

use crate::breaker::{self, BreakerConfig, BreakerOutcome};
use crate::error::{RunError, RunFailure};
use crate::hooks::{resolve_hooks, ResolvedHooks, SETTINGS_PATH};
use crate::limiter::{next_call, RateDecision};
use crate::options::{OutputFn, RunOptions};
use crate::provider::ContainerProvider;
use crate::runner::RunResult;
use looper_adapters::container::tar;
use looper_adapters::{
    error_signature, parse_status, ContainerEngine, ContainerError, FrameDemuxer, OutputScanner,
};
use looper_core::{
    generate_agent_name, CircuitState, Clock, HistoryEvent, HistoryRecord, ResultEvent, Session,
    Status,
};
use looper_storage::SessionStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

const CAPTURE_BUF_LEN: usize = 8192;

pub(crate) struct Driver<E, C> {
    pub(crate) engine: Arc<E>,
    pub(crate) store: Arc<SessionStore>,
    pub(crate) clock: C,
}

/// What one iteration produced.
enum IterationOutcome {
    Settled(Box<SettledIteration>),
    Cancelled,
    DeadlineExceeded,
}

#[derive(Default)]
struct SettledIteration {
    status: Option<Status>,
    result: Option<ResultEvent>,
    signature: Option<String>,
    error: Option<ContainerError>,
}

impl SettledIteration {
    fn failed(error: ContainerError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

enum GateOutcome {
    Proceed,
    Cancelled,
}

/// How capture ended.
enum CaptureEnd {
    Finished { text: String, result: Option<ResultEvent> },
    Cancelled,
    DeadlineExceeded,
}

impl<E: ContainerEngine, C: Clock> Driver<E, C> {
    pub(crate) async fn run(
        &self,
        opts: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunResult, RunError> {
        opts.validate()?;
        let project = opts.project.clone();
        let agent = opts
            .agent
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(generate_agent_name);
        tracing::info!(project = %project, agent = %agent, max_loops = opts.max_loops, "run starting");

        // === PRE_FLIGHT ===
        let now_ms = self.clock.epoch_ms();
        if let Some(circuit) = self.store.load_circuit(&project, &agent)? {
            if circuit.is_tripped() {
                if opts.reset_circuit {
                    self.store.delete_circuit(&project, &agent)?;
                    self.store.append_history(
                        &project,
                        &agent,
                        &HistoryRecord::new(HistoryEvent::Reset, now_ms),
                    )?;
                    tracing::info!(reason = %circuit.trip_reason, "circuit reset");
                } else {
                    tracing::warn!(reason = %circuit.trip_reason, "circuit already tripped");
                    return Ok(RunResult {
                        loops_completed: 0,
                        exit_reason: "circuit already tripped".to_string(),
                        final_status: None,
                        error: Some(RunFailure::CircuitTripped {
                            reason: circuit.trip_reason,
                        }),
                    });
                }
            }
        }

        let mut session = match self.store.load_session_with_expiration(
            &project,
            &agent,
            now_ms,
            opts.session_expiration_hours,
        )? {
            Some(existing) if existing.work_dir != opts.work_dir => {
                return Err(RunError::WorkDirConflict {
                    project,
                    agent,
                    existing: existing.work_dir,
                    requested: opts.work_dir,
                });
            }
            Some(mut existing) => {
                existing.prompt.clone_from(&opts.prompt);
                existing.touch(now_ms);
                existing
            }
            None => {
                let session =
                    Session::new(&project, &agent, &opts.work_dir, &opts.prompt, now_ms);
                self.store.append_history(
                    &project,
                    &agent,
                    &HistoryRecord::new(HistoryEvent::Created, now_ms),
                )?;
                session
            }
        };
        // The created session must be observable before the first container
        // produces any output.
        self.store.save_session(&session)?;

        // Hooks are resolved once, before iteration 1
        let hooks = resolve_hooks(opts.hooks_file.as_deref().map(Path::new))?;
        let archive = build_hook_archive(&hooks)?;

        let breaker_config = BreakerConfig {
            stagnation_threshold: opts.stagnation_threshold,
            same_error_threshold: opts.same_error_threshold,
        };
        let deadline = opts.timeout.map(|timeout| self.clock.now() + timeout);
        let mut final_status: Option<Status> = None;

        // === LOOP ===
        let result = loop {
            // RATE_GATE
            match self
                .rate_gate(&mut session, opts.calls_per_hour, &cancel)
                .await
            {
                Ok(GateOutcome::Proceed) => {}
                Ok(GateOutcome::Cancelled) => {
                    break self.exit_cancelled(&session, final_status.take());
                }
                Err(failure) => {
                    self.record_trip(&project, &agent, "internal error: store");
                    break self.exit(
                        &session,
                        "internal error: store",
                        final_status.take(),
                        Some(failure),
                    );
                }
            }
            if deadline.is_some_and(|d| self.clock.now() >= d) {
                break self.exit(&session, "run timeout reached", final_status.take(), None);
            }

            // CREATE / CAPTURE / PARSE run in their own task so panics
            // become join errors
            let iteration = session.loops_completed + 1;
            let handle = tokio::spawn(run_iteration(IterationInput {
                engine: self.engine.clone(),
                provider: opts.provider.clone(),
                on_output: opts.on_output.clone(),
                archive: archive.clone(),
                cancel: cancel.clone(),
                capture_timeout: deadline.map(|d| d.saturating_duration_since(self.clock.now())),
            }));
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let message = panic_message(join_error);
                    let reason = format!("internal error: {message}");
                    tracing::error!(reason = %reason, "iteration panicked");
                    self.record_trip(&project, &agent, &reason);
                    break self.exit(
                        &session,
                        &reason,
                        final_status.take(),
                        Some(RunFailure::Internal(message)),
                    );
                }
            };

            let settled = match outcome {
                IterationOutcome::Cancelled => {
                    break self.exit_cancelled(&session, final_status.take());
                }
                IterationOutcome::DeadlineExceeded => {
                    break self.exit(&session, "run timeout reached", final_status.take(), None);
                }
                IterationOutcome::Settled(settled) => settled,
            };

            // === UPDATE ===
            if let Some(error) = &settled.error {
                tracing::warn!(iteration, error = %error, "iteration failed");
            }
            session.record_iteration(settled.status.as_ref(), self.clock.epoch_ms());
            if settled.status.is_some() {
                final_status.clone_from(&settled.status);
            }
            let breaker_outcome = breaker::evaluate(
                &mut session,
                settled.status.as_ref(),
                settled.signature.as_deref(),
                &breaker_config,
            );
            if let Err(failure) = self.persist_update(&session, iteration, &settled) {
                self.record_trip(&project, &agent, "internal error: store");
                break self.exit(
                    &session,
                    "internal error: store",
                    final_status.take(),
                    Some(failure),
                );
            }
            if let BreakerOutcome::Trip { reason } = &breaker_outcome {
                self.record_trip(&project, &agent, reason);
            }
            if let Some(on_loop_end) = &opts.on_loop_end {
                on_loop_end(
                    iteration,
                    settled.status.as_ref(),
                    settled.result.as_ref(),
                    settled.error.as_ref(),
                );
            }
            tracing::info!(
                iteration,
                status = final_status
                    .as_ref()
                    .map(|s| s.status.as_token())
                    .unwrap_or("none"),
                no_progress = session.no_progress_count,
                "iteration settled"
            );

            // === EXIT decision, highest precedence first ===
            if cancel.is_cancelled() {
                break self.exit_cancelled(&session, final_status.take());
            }
            match breaker_outcome {
                BreakerOutcome::Complete => {
                    break self.exit(
                        &session,
                        "completion signal received",
                        final_status.take(),
                        None,
                    );
                }
                BreakerOutcome::Trip { reason } => {
                    let failure = RunFailure::CircuitTripped {
                        reason: reason.clone(),
                    };
                    break self.exit(&session, &reason, final_status.take(), Some(failure));
                }
                BreakerOutcome::Continue => {}
            }
            if session.loops_completed >= opts.max_loops {
                break self.exit(&session, "max loops reached", final_status.take(), None);
            }
            if deadline.is_some_and(|d| self.clock.now() >= d) {
                break self.exit(&session, "run timeout reached", final_status.take(), None);
            }

            // === DELAY ===
            if opts.loop_delay > Duration::ZERO {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break self.exit_cancelled(&session, final_status.take());
                    }
                    _ = tokio::time::sleep(opts.loop_delay) => {}
                }
            }
        };

        Ok(result)
    }

    /// Block until the rate limiter admits the next call (persisting the
    /// mutated window state) or the run is cancelled.
    async fn rate_gate(
        &self,
        session: &mut Session,
        calls_per_hour: u32,
        cancel: &CancellationToken,
    ) -> Result<GateOutcome, RunFailure> {
        loop {
            if cancel.is_cancelled() {
                return Ok(GateOutcome::Cancelled);
            }
            match next_call(&mut session.rate_limit, calls_per_hour, self.clock.epoch_ms()) {
                RateDecision::Proceed => {
                    if calls_per_hour > 0 {
                        self.persist_session(session)?;
                    }
                    return Ok(GateOutcome::Proceed);
                }
                RateDecision::WaitFor(wait) => {
                    tracing::info!(
                        wait_ms = wait.as_millis() as u64,
                        calls = session.rate_limit.calls,
                        "rate limit reached, waiting for window rollover"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(GateOutcome::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    fn exit(
        &self,
        session: &Session,
        exit_reason: &str,
        final_status: Option<Status>,
        error: Option<RunFailure>,
    ) -> RunResult {
        tracing::info!(
            loops = session.loops_completed,
            exit_reason,
            "run finished"
        );
        RunResult {
            loops_completed: session.loops_completed,
            exit_reason: exit_reason.to_string(),
            final_status,
            error,
        }
    }

    fn exit_cancelled(&self, session: &Session, final_status: Option<Status>) -> RunResult {
        self.exit(session, "context cancelled", final_status, None)
    }

    /// Save the session, demoting store failures after PRE_FLIGHT.
    fn persist_session(&self, session: &Session) -> Result<(), RunFailure> {
        self.store.save_session(session).map_err(|error| {
            tracing::error!(error = %error, "failed to persist session");
            RunFailure::Internal("store".to_string())
        })
    }

    fn persist_update(
        &self,
        session: &Session,
        iteration: u32,
        settled: &SettledIteration,
    ) -> Result<(), RunFailure> {
        self.persist_session(session)?;
        let record = HistoryRecord::new(HistoryEvent::Updated, self.clock.epoch_ms())
            .with_iteration(iteration)
            .with_status(settled.status.clone());
        self.store
            .append_history(&session.project, &session.agent, &record)
            .map_err(|error| {
                tracing::error!(error = %error, "failed to append history");
                RunFailure::Internal("store".to_string())
            })
    }

    /// Persist a trip. Best effort: a store failure here is logged, not
    /// surfaced, because the run is already exiting with the trip.
    fn record_trip(&self, project: &str, agent: &str, reason: &str) {
        let now_ms = self.clock.epoch_ms();
        let circuit = CircuitState::trip(reason, now_ms);
        if let Err(error) = self.store.save_circuit(project, agent, &circuit) {
            tracing::error!(error = %error, "failed to persist circuit trip");
        }
        let record = HistoryRecord::new(HistoryEvent::Trip, now_ms).with_detail(reason);
        if let Err(error) = self.store.append_history(project, agent, &record) {
            tracing::error!(error = %error, "failed to append trip history");
        }
        tracing::warn!(project, agent, reason, "circuit tripped");
    }
}

struct IterationInput<E> {
    engine: Arc<E>,
    provider: Arc<dyn ContainerProvider>,
    on_output: Option<OutputFn>,
    archive: Option<Arc<Vec<u8>>>,
    cancel: CancellationToken,
    capture_timeout: Option<Duration>,
}

/// One iteration: CREATE → CAPTURE → PARSE. The container lease is cleaned
/// up on every path out.
async fn run_iteration<E: ContainerEngine>(input: IterationInput<E>) -> IterationOutcome {
    // CREATE
    let mut lease = match input.provider.create().await {
        Ok(lease) => lease,
        Err(error) => {
            return IterationOutcome::Settled(Box::new(SettledIteration::failed(error)));
        }
    };
    let container_id = lease.container_id.clone();

    // CAPTURE
    let captured = capture(&input, &container_id).await;
    lease.cleanup().await;

    // PARSE
    match captured {
        Ok(CaptureEnd::Cancelled) => IterationOutcome::Cancelled,
        Ok(CaptureEnd::DeadlineExceeded) => IterationOutcome::DeadlineExceeded,
        Ok(CaptureEnd::Finished { text, result }) => {
            let status = parse_status(&text);
            let signature = error_signature(&text, status.as_ref());
            IterationOutcome::Settled(Box::new(SettledIteration {
                status,
                result,
                signature,
                error: None,
            }))
        }
        Err(error) => IterationOutcome::Settled(Box::new(SettledIteration::failed(error))),
    }
}

/// Start the container and drain its output while watching for exit,
/// cancellation, and the run deadline. The reader and waiter run
/// concurrently and join before capture returns.
async fn capture<E: ContainerEngine>(
    input: &IterationInput<E>,
    container_id: &str,
) -> Result<CaptureEnd, ContainerError> {
    if let Some(archive) = &input.archive {
        input
            .engine
            .copy_to_container(container_id, "/", archive)
            .await?;
    }
    input.engine.start(container_id).await?;
    let mut stream = input.engine.logs(container_id).await?;

    let mut demux = FrameDemuxer::new();
    let mut scanner = OutputScanner::new();
    let mut buf = vec![0u8; CAPTURE_BUF_LEN];

    let wait_fut = input.engine.wait(container_id);
    tokio::pin!(wait_fut);
    let mut wait_done = false;

    // A year-long sleep stands in for "no deadline"
    let timeout_sleep = tokio::time::sleep(
        input
            .capture_timeout
            .unwrap_or(Duration::from_secs(365 * 24 * 3600)),
    );
    tokio::pin!(timeout_sleep);
    let has_deadline = input.capture_timeout.is_some();

    loop {
        tokio::select! {
            _ = input.cancel.cancelled() => return Ok(CaptureEnd::Cancelled),
            _ = &mut timeout_sleep, if has_deadline => return Ok(CaptureEnd::DeadlineExceeded),
            read = stream.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(on_output) = &input.on_output {
                        on_output(&buf[..n]);
                    }
                    let payload = demux.feed(&buf[..n]);
                    scanner.feed(&payload);
                }
                Err(error) => {
                    tracing::warn!(container_id, error = %error, "log stream read failed");
                    break;
                }
            },
            exited = &mut wait_fut, if !wait_done => {
                wait_done = true;
                match exited {
                    Ok(code) => tracing::debug!(container_id, exit_code = code, "container exited"),
                    Err(error) => tracing::warn!(container_id, error = %error, "container wait failed"),
                }
            }
        }
    }

    // Stream drained; make sure the container is done before settling
    if !wait_done {
        tokio::select! {
            _ = input.cancel.cancelled() => return Ok(CaptureEnd::Cancelled),
            _ = &mut timeout_sleep, if has_deadline => return Ok(CaptureEnd::DeadlineExceeded),
            exited = &mut wait_fut => {
                if let Err(error) = exited {
                    tracing::warn!(container_id, error = %error, "container wait failed");
                }
            }
        }
    }

    scanner.feed(&demux.finish());
    let outcome = scanner.finish();
    Ok(CaptureEnd::Finished {
        text: outcome.text,
        result: outcome.result,
    })
}

/// Build the tar archive of hook files, including the settings document.
fn build_hook_archive(hooks: &ResolvedHooks) -> Result<Option<Arc<Vec<u8>>>, RunError> {
    let mut files = hooks.files.clone();
    let settings = serde_json::to_vec_pretty(&hooks.settings)
        .map_err(|e| RunError::InvalidOptions(format!("hook settings: {e}")))?;
    files.insert(SETTINGS_PATH.to_string(), settings);
    if files.is_empty() {
        return Ok(None);
    }
    let archive = tar::archive(&files)
        .map_err(|e| RunError::InvalidOptions(format!("hook archive: {e}")))?;
    Ok(Some(Arc::new(archive)))
}

fn panic_message(error: tokio::task::JoinError) -> String {
    if error.is_panic() {
        let payload = error.into_panic();
        if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "iteration panicked".to_string()
        }
    } else {
        "iteration task aborted".to_string()
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
