// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inputs to a loop run

use crate::error::RunError;
use crate::provider::ContainerProvider;
use looper_adapters::ContainerError;
use looper_core::{ResultEvent, Status};
use std::sync::Arc;
use std::time::Duration;

/// Raw output callback, invoked with every captured chunk.
pub type OutputFn = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// End-of-iteration callback: iteration number, parsed status, terminal
/// result event, and the container error if the iteration failed.
pub type LoopEndFn =
    Arc<dyn Fn(u32, Option<&Status>, Option<&ResultEvent>, Option<&ContainerError>) + Send + Sync>;

/// Configuration for one `Run` invocation.
#[derive(Clone)]
pub struct RunOptions {
    /// Project the session belongs to.
    pub project: String,
    /// Agent name; generated when empty.
    pub agent: Option<String>,
    /// Prompt recorded in the session for observers.
    pub prompt: String,
    /// Workspace directory the worker operates on.
    pub work_dir: String,
    /// Maximum iterations (≥ 1).
    pub max_loops: u32,
    /// Wall-clock limit for the whole run.
    pub timeout: Option<Duration>,
    /// Delay between iterations.
    pub loop_delay: Duration,
    /// Consecutive no-progress iterations before tripping (≥ 1).
    pub stagnation_threshold: u32,
    /// Repeats of one error signature before tripping (≥ 1).
    pub same_error_threshold: u32,
    /// Calls allowed per rolling hour; 0 disables the gate.
    pub calls_per_hour: u32,
    /// Session age before a fresh start; 0 disables expiration.
    pub session_expiration_hours: u64,
    /// Clear a tripped circuit before iteration 1.
    pub reset_circuit: bool,
    /// Custom hook settings file; the built-in hook set when `None`.
    pub hooks_file: Option<String>,
    /// Creates one container per iteration.
    pub provider: Arc<dyn ContainerProvider>,
    pub on_output: Option<OutputFn>,
    pub on_loop_end: Option<LoopEndFn>,
}

impl RunOptions {
    pub fn new(
        project: impl Into<String>,
        work_dir: impl Into<String>,
        provider: Arc<dyn ContainerProvider>,
    ) -> Self {
        Self {
            project: project.into(),
            agent: None,
            prompt: String::new(),
            work_dir: work_dir.into(),
            max_loops: 1,
            timeout: None,
            loop_delay: Duration::ZERO,
            stagnation_threshold: 3,
            same_error_threshold: 3,
            calls_per_hour: 0,
            session_expiration_hours: 0,
            reset_circuit: false,
            hooks_file: None,
            provider,
            on_output: None,
            on_loop_end: None,
        }
    }

    /// Validate before any state is touched.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.project.is_empty() {
            return Err(RunError::InvalidOptions("project must not be empty".into()));
        }
        if self.work_dir.is_empty() {
            return Err(RunError::InvalidOptions("work_dir must not be empty".into()));
        }
        if self.max_loops < 1 {
            return Err(RunError::InvalidOptions("max_loops must be at least 1".into()));
        }
        if self.stagnation_threshold < 1 {
            return Err(RunError::InvalidOptions(
                "stagnation_threshold must be at least 1".into(),
            ));
        }
        if self.same_error_threshold < 1 {
            return Err(RunError::InvalidOptions(
                "same_error_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("project", &self.project)
            .field("agent", &self.agent)
            .field("work_dir", &self.work_dir)
            .field("max_loops", &self.max_loops)
            .field("timeout", &self.timeout)
            .field("loop_delay", &self.loop_delay)
            .field("stagnation_threshold", &self.stagnation_threshold)
            .field("same_error_threshold", &self.same_error_threshold)
            .field("calls_per_hour", &self.calls_per_hour)
            .field("session_expiration_hours", &self.session_expiration_hours)
            .field("reset_circuit", &self.reset_circuit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
