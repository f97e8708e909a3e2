// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Public runner façade.

use crate::driver::Driver;
use crate::error::{RunError, RunFailure};
use crate::exec::{self, ExecResult};
use crate::options::RunOptions;
use looper_adapters::ContainerEngine;
use looper_core::{Clock, Status, SystemClock};
use looper_storage::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Final record of one run.
#[derive(Debug)]
pub struct RunResult {
    /// Fully settled iterations only.
    pub loops_completed: u32,
    /// Why the run ended; compared by substring, never parsed.
    pub exit_reason: String,
    /// Last non-empty parsed status.
    pub final_status: Option<Status>,
    /// Set when the circuit tripped or an internal failure ended the run.
    pub error: Option<RunFailure>,
}

/// Drives loop runs against a container engine and a session store.
///
/// The runner owns no state between runs beyond its configured stores.
/// Concurrent runs for distinct (project, agent) pairs may proceed in
/// parallel; concurrent runs against one pair are rejected via the
/// persisted work_dir.
pub struct Runner<E, C = SystemClock> {
    driver: Driver<E, C>,
}

impl<E: ContainerEngine> Runner<E, SystemClock> {
    pub fn new(engine: Arc<E>, store: Arc<SessionStore>) -> Self {
        Self::with_clock(engine, store, SystemClock)
    }
}

impl<E: ContainerEngine, C: Clock> Runner<E, C> {
    pub fn with_clock(engine: Arc<E>, store: Arc<SessionStore>, clock: C) -> Self {
        Self {
            driver: Driver {
                engine,
                store,
                clock,
            },
        }
    }

    /// Run the loop until completion, trip, cancellation, max loops, or
    /// timeout. Returns an error only when the session cannot even be
    /// established (invalid options, pre-flight store failure).
    pub async fn run(
        &self,
        opts: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunResult, RunError> {
        self.driver.run(opts, cancel).await
    }

    /// Run a one-shot command inside an existing container. Returns within
    /// bounded time after `timeout`: on deadline the partial output comes
    /// back with exit code `-1` and a "timed out" error.
    pub async fn exec_capture(
        &self,
        container_id: &str,
        cmd: &[String],
        timeout: Duration,
    ) -> ExecResult {
        exec::exec_capture(self.driver.engine.as_ref(), container_id, cmd, timeout).await
    }

    /// The session store backing this runner.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.driver.store
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
