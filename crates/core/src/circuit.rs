// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker trip state.
//!
//! Created on first trip, cleared by explicit reset. A tripped circuit
//! blocks further runs for its (project, agent) pair.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitState {
    #[serde(default)]
    pub tripped: bool,
    #[serde(default)]
    pub trip_reason: String,
    #[serde(default)]
    pub tripped_at_ms: Option<u64>,
}

impl CircuitState {
    /// Construct a tripped circuit. Invariant: a tripped circuit always has
    /// a non-empty reason and a trip timestamp.
    pub fn trip(reason: impl Into<String>, now_ms: u64) -> Self {
        Self {
            tripped: true,
            trip_reason: reason.into(),
            tripped_at_ms: Some(now_ms),
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }
}

#[cfg(test)]
#[path = "circuit_tests.rs"]
mod tests;
