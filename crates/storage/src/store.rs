// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem store for session, circuit, and history records.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/sessions/<project>.<agent>.json    one Session per pair
//! <root>/circuits/<project>.<agent>.json    one CircuitState per pair
//! <root>/history/<project>.<agent>.jsonl    append-only HistoryRecords
//! ```
//!
//! Every write goes to a temp file in the same directory and is renamed
//! into place, so a crash never leaves a half-written record. Writers for
//! one (project, agent) pair are serialized by an in-process keyed lock;
//! cross-process coordination is not this store's concern.

use looper_core::{CircuitState, HistoryRecord, Session};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt record at {}: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable store rooted at a single directory.
pub struct SessionStore {
    sessions_dir: PathBuf,
    circuits_dir: PathBuf,
    history_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let sessions_dir = root.join("sessions");
        let circuits_dir = root.join("circuits");
        let history_dir = root.join("history");
        fs::create_dir_all(&sessions_dir)?;
        fs::create_dir_all(&circuits_dir)?;
        fs::create_dir_all(&history_dir)?;
        Ok(Self {
            sessions_dir,
            circuits_dir,
            history_dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    // === sessions ===

    pub fn load_session(
        &self,
        project: &str,
        agent: &str,
    ) -> Result<Option<Session>, StoreError> {
        read_json(&self.session_path(project, agent))
    }

    /// Load a session, treating one older than `expiration_hours` as absent.
    /// An expired session is deleted so the next run starts fresh.
    /// `expiration_hours = 0` disables the check.
    pub fn load_session_with_expiration(
        &self,
        project: &str,
        agent: &str,
        now_ms: u64,
        expiration_hours: u64,
    ) -> Result<Option<Session>, StoreError> {
        let Some(session) = self.load_session(project, agent)? else {
            return Ok(None);
        };
        if session.is_expired(now_ms, expiration_hours) {
            warn!(
                project,
                agent,
                started_at_ms = session.started_at_ms,
                expiration_hours,
                "session expired, clearing"
            );
            self.delete_session(project, agent)?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        let lock = self.key_lock(&session.project, &session.agent);
        let _guard = lock.lock();
        write_json_atomic(&self.session_path(&session.project, &session.agent), session)
    }

    pub fn delete_session(&self, project: &str, agent: &str) -> Result<(), StoreError> {
        let lock = self.key_lock(project, agent);
        let _guard = lock.lock();
        remove_if_exists(&self.session_path(project, agent))
    }

    /// All decodable sessions recorded for a project.
    pub fn list_sessions(&self, project: &str) -> Result<Vec<Session>, StoreError> {
        let prefix = format!("{}.", sanitize(project));
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.sessions_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            match read_json::<Session>(&entry.path())? {
                Some(session) => sessions.push(session),
                None => continue,
            }
        }
        sessions.sort_by(|a, b| a.agent.cmp(&b.agent));
        Ok(sessions)
    }

    // === circuits ===

    pub fn load_circuit(
        &self,
        project: &str,
        agent: &str,
    ) -> Result<Option<CircuitState>, StoreError> {
        read_json(&self.circuit_path(project, agent))
    }

    pub fn save_circuit(
        &self,
        project: &str,
        agent: &str,
        circuit: &CircuitState,
    ) -> Result<(), StoreError> {
        let lock = self.key_lock(project, agent);
        let _guard = lock.lock();
        write_json_atomic(&self.circuit_path(project, agent), circuit)
    }

    pub fn delete_circuit(&self, project: &str, agent: &str) -> Result<(), StoreError> {
        let lock = self.key_lock(project, agent);
        let _guard = lock.lock();
        remove_if_exists(&self.circuit_path(project, agent))
    }

    // === history ===

    pub fn append_history(
        &self,
        project: &str,
        agent: &str,
        record: &HistoryRecord,
    ) -> Result<(), StoreError> {
        let lock = self.key_lock(project, agent);
        let _guard = lock.lock();
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path(project, agent))?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Read the full history log. Undecodable lines are an error: history is
    /// append-only JSON lines, so a bad line means the file was damaged.
    pub fn load_history(
        &self,
        project: &str,
        agent: &str,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        let path = self.history_path(project, agent);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record =
                serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            records.push(record);
        }
        Ok(records)
    }

    // === paths and locks ===

    fn session_path(&self, project: &str, agent: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", key(project, agent)))
    }

    fn circuit_path(&self, project: &str, agent: &str) -> PathBuf {
        self.circuits_dir.join(format!("{}.json", key(project, agent)))
    }

    fn history_path(&self, project: &str, agent: &str) -> PathBuf {
        self.history_dir.join(format!("{}.jsonl", key(project, agent)))
    }

    /// Exclusive per-(project, agent) lock guarding writes.
    fn key_lock(&self, project: &str, agent: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(key(project, agent))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Build the `<project>.<agent>` file stem with sanitized segments.
fn key(project: &str, agent: &str) -> String {
    format!("{}.{}", sanitize(project), sanitize(agent))
}

/// Replace characters unfit for file names with hyphens.
fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '-',
        })
        .collect()
}

/// Read a JSON record. Missing file is `Ok(None)`; undecodable content is
/// a `Corrupt` error, distinct from not-found.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Write to a temp file in the same directory, then rename into place.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp_path = tmp_sibling(path);
    let data = serde_json::to_vec_pretty(value)?;
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn remove_if_exists(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
