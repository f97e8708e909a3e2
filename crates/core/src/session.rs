// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-(project, agent) session record.
//!
//! A session accumulates iteration bookkeeping for one loop run and carries
//! the rate-limit window so an external status reader sees current call
//! usage without a second file to read. All timestamps are epoch
//! milliseconds.

use crate::status::Status;
use serde::{Deserialize, Serialize};

/// Rolling one-hour call window, embedded in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    #[serde(default)]
    pub window_start_ms: u64,
    #[serde(default)]
    pub calls: u32,
}

/// Durable record of one loop run for a (project, agent) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub project: String,
    pub agent: String,
    pub started_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub loops_completed: u32,
    #[serde(default)]
    pub total_tasks_completed: u64,
    #[serde(default)]
    pub total_files_modified: u64,
    #[serde(default)]
    pub no_progress_count: u32,
    /// Mirror of the last parsed STATUS token, empty before the first parse.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub work_dir: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub rate_limit: RateLimitState,
    #[serde(default)]
    pub last_error_signature: String,
    #[serde(default)]
    pub same_error_count: u32,
}

impl Session {
    pub fn new(
        project: impl Into<String>,
        agent: impl Into<String>,
        work_dir: impl Into<String>,
        prompt: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            project: project.into(),
            agent: agent.into(),
            started_at_ms: now_ms,
            updated_at_ms: now_ms,
            loops_completed: 0,
            total_tasks_completed: 0,
            total_files_modified: 0,
            no_progress_count: 0,
            status: String::new(),
            work_dir: work_dir.into(),
            prompt: prompt.into(),
            rate_limit: RateLimitState {
                window_start_ms: now_ms,
                calls: 0,
            },
            last_error_signature: String::new(),
            same_error_count: 0,
        }
    }

    /// Whether the session has outlived `expiration_hours` (0 = never).
    pub fn is_expired(&self, now_ms: u64, expiration_hours: u64) -> bool {
        if expiration_hours == 0 {
            return false;
        }
        now_ms.saturating_sub(self.started_at_ms) > expiration_hours * 3_600_000
    }

    /// Fold one settled iteration's status into the running totals and
    /// advance `loops_completed`. Called once per settled iteration.
    pub fn record_iteration(&mut self, status: Option<&Status>, now_ms: u64) {
        self.loops_completed += 1;
        if let Some(status) = status {
            self.total_tasks_completed += u64::from(status.tasks_completed);
            self.total_files_modified += u64::from(status.files_modified);
            self.status = status.status.as_token().to_string();
        }
        self.touch(now_ms);
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.updated_at_ms = self.updated_at_ms.max(now_ms);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
