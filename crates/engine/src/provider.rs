// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container provisioning seam.
//!
//! The caller owns image selection, labels, workdir binding, and network
//! configuration; the runner only needs an id to drive and a cleanup to
//! invoke. Cleanup runs on every exit path and must be quick.

use looper_adapters::ContainerError;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

type CleanupFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type CleanupFn = Box<dyn FnOnce() -> CleanupFuture + Send>;

/// Creates one worker container per iteration.
#[async_trait]
pub trait ContainerProvider: Send + Sync {
    async fn create(&self) -> Result<ContainerLease, ContainerError>;
}

/// A created container plus its deferred cleanup.
pub struct ContainerLease {
    pub container_id: String,
    cleanup: Option<CleanupFn>,
}

impl ContainerLease {
    pub fn new<F, Fut>(container_id: impl Into<String>, cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            container_id: container_id.into(),
            cleanup: Some(Box::new(move || Box::pin(cleanup()))),
        }
    }

    /// A lease whose container needs no teardown (tests, external owners).
    pub fn without_cleanup(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            cleanup: None,
        }
    }

    /// Run the cleanup. Idempotent: later calls are no-ops.
    pub async fn cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup().await;
        }
    }
}

impl std::fmt::Debug for ContainerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerLease")
            .field("container_id", &self.container_id)
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}
