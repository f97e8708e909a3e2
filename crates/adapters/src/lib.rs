// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! looper-adapters: container-engine seam and worker output parsing

pub mod agent;
pub mod container;

pub use agent::{error_signature, parse_status, OutputScanner, ScanOutcome};
pub use container::{
    ContainerEngine, ContainerError, ContainerSpec, ExecStatus, FrameDemuxer, LogStream,
};

#[cfg(any(test, feature = "test-support"))]
pub use container::{EngineCall, FakeContainerEngine, FakeExec, FakeRun};
