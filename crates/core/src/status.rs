// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-iteration status reported by the worker agent.
//!
//! A `Status` is transient: it is parsed from one iteration's output and
//! folded into the durable [`Session`](crate::session::Session) totals. The
//! `ResultEvent` is the terminal record of the worker's NDJSON event stream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The agent's self-reported state for one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    InProgress,
    Complete,
    Blocked,
    Failed,
    /// An uppercase token outside the known set. Preserved verbatim so an
    /// observer sees what the agent actually said; bookkeeping treats it
    /// like `InProgress`.
    Other(String),
}

impl StatusKind {
    /// Parse an uppercase status token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "IN_PROGRESS" => StatusKind::InProgress,
            "COMPLETE" => StatusKind::Complete,
            "BLOCKED" => StatusKind::Blocked,
            "FAILED" => StatusKind::Failed,
            other => StatusKind::Other(other.to_string()),
        }
    }

    pub fn as_token(&self) -> &str {
        match self {
            StatusKind::InProgress => "IN_PROGRESS",
            StatusKind::Complete => "COMPLETE",
            StatusKind::Blocked => "BLOCKED",
            StatusKind::Failed => "FAILED",
            StatusKind::Other(token) => token,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_token())
    }
}

/// One iteration's parsed `LOOP_STATUS` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub status: StatusKind,
    #[serde(default)]
    pub tasks_completed: u32,
    #[serde(default)]
    pub files_modified: u32,
    #[serde(default)]
    pub completion_indicators: String,
    #[serde(default)]
    pub tests_status: String,
    #[serde(default)]
    pub work_type: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub exit_signal: bool,
}

impl Status {
    pub fn new(status: StatusKind) -> Self {
        Self {
            status,
            tasks_completed: 0,
            files_modified: 0,
            completion_indicators: String::new(),
            tests_status: String::new(),
            work_type: String::new(),
            recommendation: String::new(),
            exit_signal: false,
        }
    }

    /// True when the iteration reported neither completed tasks nor
    /// modified files.
    pub fn is_no_progress(&self) -> bool {
        self.tasks_completed == 0 && self.files_modified == 0
    }

    /// True when the agent both reports completion and asks to exit.
    pub fn is_completion(&self) -> bool {
        self.status == StatusKind::Complete && self.exit_signal
    }
}

/// Terminal `result` event of the worker's NDJSON stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEvent {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
