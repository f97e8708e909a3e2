// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stagnation detection.
//!
//! After each settled iteration the breaker folds the parsed status and
//! error signature into the session's counters and decides whether the
//! loop should keep running. Completion always wins over a trip that could
//! fire in the same iteration.

use looper_core::{Session, Status};

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub stagnation_threshold: u32,
    pub same_error_threshold: u32,
}

/// Decision for one settled iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerOutcome {
    Continue,
    /// The agent reported COMPLETE with an exit signal.
    Complete,
    Trip {
        reason: String,
    },
}

/// Apply the breaker rules, in order, mutating the session's counters.
pub fn evaluate(
    session: &mut Session,
    status: Option<&Status>,
    signature: Option<&str>,
    config: &BreakerConfig,
) -> BreakerOutcome {
    // 1. Completion exit beats everything else
    if status.is_some_and(Status::is_completion) {
        return BreakerOutcome::Complete;
    }

    // 2. No-progress counting ("no status" counts as no progress)
    if status.is_none_or(Status::is_no_progress) {
        session.no_progress_count += 1;
    } else {
        session.no_progress_count = 0;
    }

    // 3. Stagnation trip
    if session.no_progress_count >= config.stagnation_threshold {
        return BreakerOutcome::Trip {
            reason: format!(
                "stagnation: no progress for {} loops",
                session.no_progress_count
            ),
        };
    }

    // 4. Same-error counting
    if let Some(signature) = signature {
        if signature == session.last_error_signature {
            session.same_error_count += 1;
        } else {
            session.last_error_signature = signature.to_string();
            session.same_error_count = 1;
        }

        // 5. Same-error trip
        if session.same_error_count >= config.same_error_threshold {
            return BreakerOutcome::Trip {
                reason: format!(
                    "stagnation: same error {} times: {}",
                    session.same_error_count, signature
                ),
            };
        }
    }

    BreakerOutcome::Continue
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
