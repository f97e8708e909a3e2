//! Shared harness for the spec tests.

use async_trait::async_trait;
use looper_adapters::{ContainerEngine, ContainerError, ContainerSpec, FakeContainerEngine};
use looper_core::SystemClock;
use looper_engine::{ContainerLease, ContainerProvider, RunOptions, Runner};
use looper_storage::SessionStore;
use std::sync::Arc;
use tempfile::TempDir;

pub const PROJECT: &str = "specs";
pub const AGENT: &str = "loop-spec-agent";
pub const WORK_DIR: &str = "/tmp/specs-workspace";

/// Provider that creates containers on the fake engine and force-removes
/// them on cleanup, like a real caller would.
#[derive(Clone)]
pub struct SpecProvider {
    engine: FakeContainerEngine,
}

#[async_trait]
impl ContainerProvider for SpecProvider {
    async fn create(&self) -> Result<ContainerLease, ContainerError> {
        let id = self.engine.create(ContainerSpec::default()).await?;
        let engine = self.engine.clone();
        let cleanup_id = id.clone();
        Ok(ContainerLease::new(id, move || async move {
            let _ = engine.remove(&cleanup_id, true).await;
        }))
    }
}

pub struct Harness {
    pub engine: FakeContainerEngine,
    pub runner: Runner<FakeContainerEngine, SystemClock>,
    pub dir: TempDir,
}

pub fn harness() -> Harness {
    let engine = FakeContainerEngine::new();
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());
    let runner = Runner::new(Arc::new(engine.clone()), store);
    Harness { engine, runner, dir }
}

impl Harness {
    pub fn options(&self) -> RunOptions {
        let mut opts = RunOptions::new(
            PROJECT,
            WORK_DIR,
            Arc::new(SpecProvider {
                engine: self.engine.clone(),
            }),
        );
        opts.agent = Some(AGENT.to_string());
        opts.prompt = "keep the build green".to_string();
        opts
    }

    /// Queue one iteration's worth of agent output.
    pub fn queue_output(&self, output: &str) {
        self.engine.queue_run(
            looper_adapters::container::FakeRun::plain(output.as_bytes().to_vec(), 0),
        );
    }
}

/// Render a status block the way the agent-facing prompt documents it.
pub fn status_block(status: &str, tasks: u32, files: u32, exit_signal: bool) -> String {
    format!(
        "---LOOP_STATUS---\n\
         STATUS: {status}\n\
         TASKS_COMPLETED_THIS_LOOP: {tasks}\n\
         FILES_MODIFIED: {files}\n\
         EXIT_SIGNAL: {exit_signal}\n\
         ---END_LOOP_STATUS---\n"
    )
}
