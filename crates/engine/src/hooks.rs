// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook configuration resolution.
//!
//! Hooks customize the worker agent's behavior inside the container. The
//! default set wires a `Stop` hook to the stop-check script (which reminds
//! the agent to emit its status block before ending a turn) and a
//! `SessionStart` hook. A user-supplied settings file replaces the default
//! set completely: if the user wants `Stop`, they must include it.

use crate::error::HookError;
use crate::prompt::{LOOP_STATUS_END, LOOP_STATUS_START};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Container path of the injected stop-check script.
pub const STOP_CHECK_SCRIPT_PATH: &str = "/opt/looper/hooks/stop-check.sh";

/// Container path the resolved settings document is injected at.
pub const SETTINGS_PATH: &str = "/root/.claude/settings.json";

/// Resolved hook configuration: the settings document plus the files to
/// inject, keyed by absolute container path. Injection itself is the
/// engine adapter's concern.
#[derive(Debug, Clone)]
pub struct ResolvedHooks {
    pub settings: Value,
    pub files: BTreeMap<String, Vec<u8>>,
}

/// Resolve the hook configuration: built-in defaults, or the user's file.
pub fn resolve_hooks(custom: Option<&Path>) -> Result<ResolvedHooks, HookError> {
    match custom {
        None => Ok(default_hooks()),
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| HookError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let settings =
                serde_json::from_str(&content).map_err(|source| HookError::InvalidJson {
                    path: path.display().to_string(),
                    source,
                })?;
            Ok(ResolvedHooks {
                settings,
                files: BTreeMap::new(),
            })
        }
    }
}

fn default_hooks() -> ResolvedHooks {
    let settings = json!({
        "hooks": {
            "Stop": [
                {
                    "hooks": [
                        { "type": "command", "command": STOP_CHECK_SCRIPT_PATH }
                    ]
                }
            ],
            "SessionStart": [
                {
                    "hooks": [
                        { "type": "command", "command": "echo 'loop iteration starting'" }
                    ]
                }
            ]
        }
    });

    let mut files = BTreeMap::new();
    files.insert(
        STOP_CHECK_SCRIPT_PATH.to_string(),
        stop_check_script().into_bytes(),
    );

    ResolvedHooks { settings, files }
}

/// The stop-check script blocks the agent's turn end until a status block
/// was printed, so every iteration yields something the parser can read.
fn stop_check_script() -> String {
    format!(
        r#"#!/bin/sh
# Runs on the agent's Stop hook. Blocks the first stop of a turn and asks
# for the status block; the marker file lets the retried stop through.
flag=/tmp/looper-stop-seen
if [ -f "$flag" ]; then
    rm -f "$flag"
    exit 0
fi
touch "$flag"
cat <<'EOF'
{{"decision": "block", "reason": "Print your status block before stopping: a {start} line, KEY: VALUE fields (STATUS, TASKS_COMPLETED_THIS_LOOP, FILES_MODIFIED, TESTS_STATUS, WORK_TYPE, RECOMMENDATION, EXIT_SIGNAL), then {end}."}}
EOF
exit 0
"#,
        start = LOOP_STATUS_START,
        end = LOOP_STATUS_END,
    )
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
