// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session rate gate over a rolling one-hour window.
//!
//! The window state lives inside the session record so an external status
//! reader sees current call usage. The decision is pure; the driver owns
//! the (cancellable) sleeping.

use looper_core::RateLimitState;
use std::time::Duration;

const WINDOW_MS: u64 = 3_600_000;

/// Outcome of asking for one call slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The call is admitted; the state was mutated and must be persisted.
    Proceed,
    /// The window is full; retry after the given wait.
    WaitFor(Duration),
}

/// Claim one call slot. `calls_per_hour = 0` disables the gate entirely.
pub fn next_call(state: &mut RateLimitState, calls_per_hour: u32, now_ms: u64) -> RateDecision {
    if calls_per_hour == 0 {
        return RateDecision::Proceed;
    }
    if now_ms.saturating_sub(state.window_start_ms) >= WINDOW_MS {
        state.window_start_ms = now_ms;
        state.calls = 1;
        return RateDecision::Proceed;
    }
    if state.calls < calls_per_hour {
        state.calls += 1;
        return RateDecision::Proceed;
    }
    let rollover = state.window_start_ms + WINDOW_MS;
    RateDecision::WaitFor(Duration::from_millis(rollover.saturating_sub(now_ms)))
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;
