// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Friendly agent name generation.
//!
//! Names look like `loop-quiet-otter`: three hyphen-separated lowercase
//! segments. Successive in-process calls walk the adjective/noun space with
//! a stride coprime to its size, so names never repeat within one full
//! cycle (far more than the 100 consecutive calls callers rely on).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

const ADJECTIVES: [&str; 24] = [
    "amber", "bold", "brisk", "calm", "clever", "dusty", "eager", "fuzzy", "gentle", "humble",
    "keen", "lively", "mellow", "nimble", "patient", "quiet", "rapid", "sly", "steady", "sunny",
    "swift", "tidy", "vivid", "wry",
];

const NOUNS: [&str; 24] = [
    "badger", "beaver", "bison", "crane", "dingo", "falcon", "ferret", "gecko", "heron", "ibis",
    "jackal", "koala", "lemur", "lynx", "marmot", "marten", "otter", "owl", "panda", "raven",
    "shrew", "stoat", "tapir", "wren",
];

const COMBINATIONS: usize = ADJECTIVES.len() * NOUNS.len();

// Coprime to COMBINATIONS (576), so consecutive indices cover the whole
// space before repeating.
const STRIDE: usize = 175;

fn slot() -> &'static AtomicUsize {
    static SLOT: OnceLock<AtomicUsize> = OnceLock::new();
    SLOT.get_or_init(|| AtomicUsize::new(rand::random::<u32>() as usize % COMBINATIONS))
}

/// Generate a `loop-<adjective>-<noun>` agent name.
pub fn generate_agent_name() -> String {
    let n = slot().fetch_add(STRIDE, Ordering::Relaxed) % COMBINATIONS;
    let adjective = ADJECTIVES[n / NOUNS.len()];
    let noun = NOUNS[n % NOUNS.len()];
    format!("loop-{adjective}-{noun}")
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
