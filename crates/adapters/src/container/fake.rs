// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake container engine for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ContainerEngine, ContainerError, ContainerSpec, ExecStatus, LogStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Recorded call to FakeContainerEngine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Create,
    Start { id: String },
    Wait { id: String },
    Logs { id: String },
    ExecCreate { id: String, cmd: Vec<String> },
    ExecStart { exec_id: String },
    CopyToContainer { id: String, dest_path: String },
    Remove { id: String, force: bool },
}

/// Scripted behavior for one container run.
#[derive(Debug, Clone, Default)]
pub struct FakeRun {
    /// Raw bytes the container "prints" (already framed or plain)
    pub stdout: Vec<u8>,
    pub exit_code: i64,
    /// How long `wait` blocks before returning
    pub wait_delay: Duration,
}

impl FakeRun {
    pub fn plain(stdout: impl Into<Vec<u8>>, exit_code: i64) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code,
            wait_delay: Duration::ZERO,
        }
    }

    pub fn with_wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = delay;
        self
    }
}

/// Scripted behavior for one exec instance.
#[derive(Debug, Clone, Default)]
pub struct FakeExec {
    pub stdout: Vec<u8>,
    pub exit_code: i64,
    /// How long the exec "runs" before its output stream ends
    pub run_delay: Duration,
}

#[derive(Default)]
struct FakeEngineState {
    queued_runs: Vec<FakeRun>,
    queued_execs: Vec<FakeExec>,
    containers: HashMap<String, FakeRun>,
    execs: HashMap<String, FakeExec>,
    calls: Vec<EngineCall>,
    next_id: u64,
    create_error: Option<String>,
    logs_error: Option<String>,
    removed: Vec<String>,
}

/// Fake container engine.
///
/// Queue scripted runs with [`queue_run`](FakeContainerEngine::queue_run);
/// each `create` call consumes the next one. All calls are recorded.
#[derive(Clone, Default)]
pub struct FakeContainerEngine {
    inner: Arc<Mutex<FakeEngineState>>,
}

impl FakeContainerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behavior for the next created container.
    pub fn queue_run(&self, run: FakeRun) {
        self.inner.lock().queued_runs.push(run);
    }

    /// Queue the behavior for the next exec instance.
    pub fn queue_exec(&self, exec: FakeExec) {
        self.inner.lock().queued_execs.push(exec);
    }

    /// Register a pre-existing container (for exec tests).
    pub fn add_container(&self, id: &str) {
        self.inner
            .lock()
            .containers
            .insert(id.to_string(), FakeRun::default());
    }

    /// Fail the next `create` call with the given message.
    pub fn set_create_error(&self, message: &str) {
        self.inner.lock().create_error = Some(message.to_string());
    }

    /// Fail every `logs` call with the given message.
    pub fn set_logs_error(&self, message: &str) {
        self.inner.lock().logs_error = Some(message.to_string());
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    /// Ids of removed containers, in removal order.
    pub fn removed(&self) -> Vec<String> {
        self.inner.lock().removed.clone()
    }

    /// Number of containers created so far.
    pub fn created_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, EngineCall::Create))
            .count()
    }
}

#[async_trait]
impl ContainerEngine for FakeContainerEngine {
    async fn create(&self, _spec: ContainerSpec) -> Result<String, ContainerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Create);
        if let Some(message) = inner.create_error.take() {
            return Err(ContainerError::CreateFailed(message));
        }
        inner.next_id += 1;
        let id = format!("ctr-{}", inner.next_id);
        let run = if inner.queued_runs.is_empty() {
            FakeRun::default()
        } else {
            inner.queued_runs.remove(0)
        };
        inner.containers.insert(id.clone(), run);
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), ContainerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Start { id: id.to_string() });
        if !inner.containers.contains_key(id) {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn wait(&self, id: &str) -> Result<i64, ContainerError> {
        let run = {
            let mut inner = self.inner.lock();
            inner.calls.push(EngineCall::Wait { id: id.to_string() });
            inner
                .containers
                .get(id)
                .cloned()
                .ok_or_else(|| ContainerError::NotFound(id.to_string()))?
        };
        if run.wait_delay > Duration::ZERO {
            tokio::time::sleep(run.wait_delay).await;
        }
        Ok(run.exit_code)
    }

    async fn logs(&self, id: &str) -> Result<LogStream, ContainerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Logs { id: id.to_string() });
        if let Some(message) = inner.logs_error.clone() {
            return Err(ContainerError::LogsFailed(message));
        }
        let run = inner
            .containers
            .get(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        Ok(Box::new(std::io::Cursor::new(run.stdout.clone())))
    }

    async fn exec_create(&self, id: &str, cmd: &[String]) -> Result<String, ContainerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::ExecCreate {
            id: id.to_string(),
            cmd: cmd.to_vec(),
        });
        if !inner.containers.contains_key(id) {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        inner.next_id += 1;
        let exec_id = format!("exec-{}", inner.next_id);
        let exec = if inner.queued_execs.is_empty() {
            FakeExec::default()
        } else {
            inner.queued_execs.remove(0)
        };
        inner.execs.insert(exec_id.clone(), exec);
        Ok(exec_id)
    }

    async fn exec_start(&self, exec_id: &str) -> Result<LogStream, ContainerError> {
        let exec = {
            let mut inner = self.inner.lock();
            inner.calls.push(EngineCall::ExecStart {
                exec_id: exec_id.to_string(),
            });
            inner
                .execs
                .get(exec_id)
                .cloned()
                .ok_or_else(|| ContainerError::NotFound(exec_id.to_string()))?
        };
        if exec.run_delay > Duration::ZERO {
            Ok(Box::new(SlowReader {
                delay: Box::pin(tokio::time::sleep(exec.run_delay)),
                data: std::io::Cursor::new(exec.stdout),
            }))
        } else {
            Ok(Box::new(std::io::Cursor::new(exec.stdout)))
        }
    }

    async fn exec_inspect(&self, exec_id: &str) -> Result<ExecStatus, ContainerError> {
        let inner = self.inner.lock();
        let exec = inner
            .execs
            .get(exec_id)
            .ok_or_else(|| ContainerError::NotFound(exec_id.to_string()))?;
        Ok(ExecStatus {
            running: false,
            exit_code: Some(exec.exit_code),
        })
    }

    async fn copy_to_container(
        &self,
        id: &str,
        dest_path: &str,
        _archive: &[u8],
    ) -> Result<(), ContainerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::CopyToContainer {
            id: id.to_string(),
            dest_path: dest_path.to_string(),
        });
        if !inner.containers.contains_key(id) {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), ContainerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Remove {
            id: id.to_string(),
            force,
        });
        inner.containers.remove(id);
        inner.removed.push(id.to_string());
        Ok(())
    }
}

/// A reader that withholds its data until a delay elapses, simulating a
/// long-running exec.
struct SlowReader {
    delay: std::pin::Pin<Box<tokio::time::Sleep>>,
    data: std::io::Cursor<Vec<u8>>,
}

impl tokio::io::AsyncRead for SlowReader {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        use std::task::Poll;
        if self.delay.as_mut().poll(cx).is_pending() {
            return Poll::Pending;
        }
        let pos = self.data.position() as usize;
        let inner = self.data.get_ref();
        let remaining = &inner[pos.min(inner.len())..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.data.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
