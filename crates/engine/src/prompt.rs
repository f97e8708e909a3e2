// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System prompt for the worker agent.

pub use looper_adapters::agent::{LOOP_STATUS_END, LOOP_STATUS_START};

/// Build the system prompt handed to the worker agent.
///
/// The prompt documents the status block contract; the embedded example
/// round-trips through the status parser (covered by tests).
pub fn build_system_prompt(additional: &str) -> String {
    let mut prompt = format!(
        r#"You are one iteration of an autonomous coding loop. Work on the task,
then report what you did so the loop driver can decide whether to continue.

At the end of EVERY response, print a status block:

{start}
STATUS: IN_PROGRESS
TASKS_COMPLETED_THIS_LOOP: 1
FILES_MODIFIED: 2
COMPLETION_INDICATORS: unit tests pass
TESTS_STATUS: passing
WORK_TYPE: implementation
RECOMMENDATION: continue with the remaining modules
EXIT_SIGNAL: false
{end}

Field reference:
- STATUS: one of IN_PROGRESS, COMPLETE, BLOCKED, FAILED.
- TASKS_COMPLETED_THIS_LOOP: integer count of tasks you finished this iteration.
- FILES_MODIFIED: integer count of files you changed this iteration.
- COMPLETION_INDICATORS: evidence the work is converging.
- TESTS_STATUS: current test suite state.
- WORK_TYPE: the kind of work you did (implementation, debugging, review, ...).
- RECOMMENDATION: what the next iteration should do.
- EXIT_SIGNAL: true only when the overall task is COMPLETE and the loop
  should stop.

Reporting zero tasks and zero files for several iterations trips the loop's
circuit breaker, so make measurable progress or say why you are blocked.
"#,
        start = LOOP_STATUS_START,
        end = LOOP_STATUS_END,
    );

    if !additional.is_empty() {
        prompt.push('\n');
        prompt.push_str(additional);
        prompt.push('\n');
    }

    prompt
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
