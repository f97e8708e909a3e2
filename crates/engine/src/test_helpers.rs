// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests

use crate::provider::{ContainerLease, ContainerProvider};
use crate::runner::Runner;
use crate::options::RunOptions;
use async_trait::async_trait;
use looper_adapters::{ContainerEngine, ContainerError, ContainerSpec, FakeContainerEngine};
use looper_core::SystemClock;
use looper_storage::SessionStore;
use std::sync::Arc;
use tempfile::TempDir;

/// Provider that creates containers on a fake engine and force-removes
/// them on cleanup.
#[derive(Clone)]
pub(crate) struct EngineProvider {
    engine: FakeContainerEngine,
}

impl EngineProvider {
    pub(crate) fn new(engine: FakeContainerEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ContainerProvider for EngineProvider {
    async fn create(&self) -> Result<ContainerLease, ContainerError> {
        let id = self.engine.create(ContainerSpec::default()).await?;
        let engine = self.engine.clone();
        let cleanup_id = id.clone();
        Ok(ContainerLease::new(id, move || async move {
            let _ = engine.remove(&cleanup_id, true).await;
        }))
    }
}

/// Provider whose `create` panics, for panic-conversion tests.
pub(crate) struct PanickingProvider;

#[async_trait]
impl ContainerProvider for PanickingProvider {
    async fn create(&self) -> Result<ContainerLease, ContainerError> {
        panic!("provider exploded");
    }
}

/// A runner over a fake engine with a temp-dir store.
pub(crate) fn test_runner(
    engine: &FakeContainerEngine,
) -> (TempDir, Runner<FakeContainerEngine, SystemClock>) {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(SessionStore::open(dir.path()).expect("store"));
    let runner = Runner::new(Arc::new(engine.clone()), store);
    (dir, runner)
}

/// Default options against the given engine, one loop, no delays.
pub(crate) fn test_options(engine: &FakeContainerEngine) -> RunOptions {
    let mut opts = RunOptions::new(
        "demo",
        "/tmp/demo-workspace",
        Arc::new(EngineProvider::new(engine.clone())),
    );
    opts.agent = Some("loop-test-agent".to_string());
    opts.prompt = "do the work".to_string();
    opts
}

/// Render a status block the way a well-behaved agent would.
pub(crate) fn status_block(status: &str, tasks: u32, files: u32, exit_signal: bool) -> String {
    format!(
        "---LOOP_STATUS---\n\
         STATUS: {status}\n\
         TASKS_COMPLETED_THIS_LOOP: {tasks}\n\
         FILES_MODIFIED: {files}\n\
         EXIT_SIGNAL: {exit_signal}\n\
         ---END_LOOP_STATUS---\n"
    )
}
