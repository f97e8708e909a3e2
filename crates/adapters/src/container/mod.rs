// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container engine abstraction.
//!
//! The `ContainerEngine` trait is the complete vocabulary the runner needs
//! from an engine (Docker-compatible or otherwise): create/start/wait/logs
//! for containers, exec plumbing for one-shot commands, and tar-addressed
//! file injection. The concrete transport is not this crate's concern.

mod frame;
pub mod tar;

pub use frame::FrameDemuxer;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{EngineCall, FakeContainerEngine, FakeExec, FakeRun};

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from container engine operations
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("create failed: {0}")]
    CreateFailed(String),
    #[error("start failed: {0}")]
    StartFailed(String),
    #[error("wait failed: {0}")]
    WaitFailed(String),
    #[error("logs unavailable: {0}")]
    LogsFailed(String),
    #[error("exec failed: {0}")]
    ExecFailed(String),
    #[error("copy failed: {0}")]
    CopyFailed(String),
    #[error("remove failed: {0}")]
    RemoveFailed(String),
}

/// Byte stream of container or exec output, multiplexed with the engine's
/// 8-byte frame headers (see [`FrameDemuxer`]).
pub type LogStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Minimal creation spec. Callers that need richer engine features build
/// containers themselves and hand the runner an id via its provider seam.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    pub env: Vec<(String, String)>,
    pub working_dir: Option<String>,
    pub labels: BTreeMap<String, String>,
}

/// Result of inspecting an exec instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecStatus {
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// Adapter for a container engine
#[async_trait]
pub trait ContainerEngine: Send + Sync + 'static {
    /// Create a container, returning its id.
    async fn create(&self, spec: ContainerSpec) -> Result<String, ContainerError>;

    /// Start a created container.
    async fn start(&self, id: &str) -> Result<(), ContainerError>;

    /// Block until the container exits, returning its exit code.
    async fn wait(&self, id: &str) -> Result<i64, ContainerError>;

    /// Stream the container's output from the beginning.
    async fn logs(&self, id: &str) -> Result<LogStream, ContainerError>;

    /// Create an exec instance for a one-shot command.
    async fn exec_create(&self, id: &str, cmd: &[String]) -> Result<String, ContainerError>;

    /// Start an exec instance and stream its output.
    async fn exec_start(&self, exec_id: &str) -> Result<LogStream, ContainerError>;

    /// Inspect an exec instance for liveness and exit code.
    async fn exec_inspect(&self, exec_id: &str) -> Result<ExecStatus, ContainerError>;

    /// Unpack a tar archive at `dest_path` inside the container.
    async fn copy_to_container(
        &self,
        id: &str,
        dest_path: &str,
        archive: &[u8],
    ) -> Result<(), ContainerError>;

    /// Remove a container, optionally killing it first.
    async fn remove(&self, id: &str, force: bool) -> Result<(), ContainerError>;
}
