// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `LOOP_STATUS` block extraction and error-signature normalization.

use looper_core::{Status, StatusKind};

pub const LOOP_STATUS_START: &str = "---LOOP_STATUS---";
pub const LOOP_STATUS_END: &str = "---END_LOOP_STATUS---";

/// Extract the agent's status from accumulated output text.
///
/// If several blocks appear, the last well-formed one wins (the agent's
/// final summary). Returns `None` when no block is present or the required
/// `STATUS` key is missing or malformed.
pub fn parse_status(text: &str) -> Option<Status> {
    let mut last = None;
    let mut from = 0;
    while let Some(start) = text[from..].find(LOOP_STATUS_START) {
        let body_start = from + start + LOOP_STATUS_START.len();
        let Some(end) = text[body_start..].find(LOOP_STATUS_END) else {
            break;
        };
        let body = &text[body_start..body_start + end];
        if let Some(status) = parse_block(body) {
            last = Some(status);
        }
        from = body_start + end + LOOP_STATUS_END.len();
    }
    last
}

/// Parse the `KEY: VALUE` lines of one block body.
fn parse_block(body: &str) -> Option<Status> {
    let mut status: Option<StatusKind> = None;
    let mut parsed = Status::new(StatusKind::InProgress);

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "STATUS" => {
                if is_status_token(value) {
                    status = Some(StatusKind::from_token(value));
                }
            }
            "TASKS_COMPLETED_THIS_LOOP" => {
                parsed.tasks_completed = value.parse().unwrap_or(0);
            }
            "FILES_MODIFIED" => {
                parsed.files_modified = value.parse().unwrap_or(0);
            }
            "COMPLETION_INDICATORS" => parsed.completion_indicators = value.to_string(),
            "TESTS_STATUS" => parsed.tests_status = value.to_string(),
            "WORK_TYPE" => parsed.work_type = value.to_string(),
            "RECOMMENDATION" => parsed.recommendation = value.to_string(),
            "EXIT_SIGNAL" => parsed.exit_signal = value.eq_ignore_ascii_case("true"),
            _ => {} // unknown keys are ignored
        }
    }

    parsed.status = status?;
    Some(parsed)
}

/// Uppercase alphanumeric (plus underscore) status token.
fn is_status_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Extract a normalized error signature from the output text.
///
/// Only applicable when no status was parsed or the agent reported
/// `FAILED`/`BLOCKED`. The first line that mentions an error keyword is
/// normalized to lowercase alphanumerics with collapsed spaces; equal
/// signatures across iterations indicate the agent is stuck on one error.
pub fn error_signature(text: &str, status: Option<&Status>) -> Option<String> {
    let applicable = match status {
        None => true,
        Some(status) => matches!(status.status, StatusKind::Failed | StatusKind::Blocked),
    };
    if !applicable {
        return None;
    }

    for line in text.lines() {
        let lower = line.to_lowercase();
        if ["error", "failed", "refused"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            let signature = normalize(&lower);
            if !signature.is_empty() {
                return Some(signature);
            }
        }
    }
    None
}

/// Keep lowercase alphanumerics, collapse everything else to single spaces.
fn normalize(line: &str) -> String {
    let mapped: String = line
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
