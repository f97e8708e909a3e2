// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot command execution inside a pre-existing container.

use crate::error::ExecError;
use looper_adapters::{ContainerEngine, ContainerError, FrameDemuxer};
use std::time::Duration;
use tokio::io::AsyncReadExt;

const INSPECT_POLL: Duration = Duration::from_millis(50);

/// Outcome of `exec_capture`. On timeout the partial output survives,
/// `exit_code` is `-1`, and `error` says the command timed out.
#[derive(Debug)]
pub struct ExecResult {
    pub output: String,
    pub exit_code: i32,
    pub error: Option<ExecError>,
}

pub(crate) async fn exec_capture<E: ContainerEngine>(
    engine: &E,
    container_id: &str,
    cmd: &[String],
    timeout: Duration,
) -> ExecResult {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut collected = Vec::new();

    match run(engine, container_id, cmd, timeout, deadline, &mut collected).await {
        Ok(exit_code) => ExecResult {
            output: String::from_utf8_lossy(&collected).into_owned(),
            exit_code,
            error: None,
        },
        Err(error) => ExecResult {
            output: String::from_utf8_lossy(&collected).into_owned(),
            exit_code: -1,
            error: Some(error),
        },
    }
}

async fn run<E: ContainerEngine>(
    engine: &E,
    container_id: &str,
    cmd: &[String],
    timeout: Duration,
    deadline: tokio::time::Instant,
    collected: &mut Vec<u8>,
) -> Result<i32, ExecError> {
    let exec_id = engine.exec_create(container_id, cmd).await?;
    let mut stream = engine.exec_start(&exec_id).await?;

    let mut demux = FrameDemuxer::new();
    let mut buf = vec![0u8; 8192];
    loop {
        match tokio::time::timeout_at(deadline, stream.read(&mut buf)).await {
            Err(_) => {
                tracing::warn!(container_id, exec_id = %exec_id, "exec timed out");
                return Err(ExecError::TimedOut(timeout));
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => collected.extend(demux.feed(&buf[..n])),
            Ok(Err(error)) => {
                return Err(ContainerError::ExecFailed(error.to_string()).into());
            }
        }
    }
    collected.extend(demux.finish());

    // The stream can close a beat before the engine reports the exit code
    loop {
        let status = engine.exec_inspect(&exec_id).await?;
        if !status.running {
            return Ok(status.exit_code.unwrap_or(-1) as i32);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ExecError::TimedOut(timeout));
        }
        tokio::time::sleep(INSPECT_POLL).await;
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
