// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the loop runner

use looper_adapters::ContainerError;
use looper_storage::StoreError;
use thiserror::Error;

/// Fatal errors from `Run`. These are only raised before any iteration
/// state is mutated: invalid options or pre-flight store failures.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("hook resolution failed: {0}")]
    Hooks(#[from] HookError),
    #[error(
        "session {project}/{agent} belongs to another run (work dir {existing}, requested {requested})"
    )]
    WorkDirConflict {
        project: String,
        agent: String,
        existing: String,
        requested: String,
    },
}

/// Non-fatal run outcome error, carried in the run result rather than
/// returned from `Run` itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    #[error("circuit tripped: {reason}")]
    CircuitTripped { reason: String },
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors from `ExecCapture`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("exec timed out after {0:?}")]
    TimedOut(std::time::Duration),
    #[error(transparent)]
    Engine(#[from] ContainerError),
}

/// Errors from hook resolution.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to read hook settings {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("hook settings {path} is not valid JSON: {source}")]
    InvalidJson {
        path: String,
        source: serde_json::Error,
    },
}
