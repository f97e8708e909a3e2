// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only history of session lifecycle events.

use crate::status::Status;
use serde::{Deserialize, Serialize};

/// Kind of lifecycle event. Lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEvent {
    Created,
    Updated,
    Trip,
    Reset,
}

/// One line of the per-(project, agent) history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub at_ms: u64,
    pub event: HistoryEvent,
    /// Iteration number for `updated` records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    /// Status snapshot for `updated` records that parsed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Trip reason or other human-readable context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HistoryRecord {
    pub fn new(event: HistoryEvent, at_ms: u64) -> Self {
        Self {
            at_ms,
            event,
            iteration: None,
            status: None,
            detail: None,
        }
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn with_status(mut self, status: Option<Status>) -> Self {
        self.status = status;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
