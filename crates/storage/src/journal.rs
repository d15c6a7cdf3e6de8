// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run journal: crash-safe task-state ledger.
//!
//! A journal's on-disk shape is split across two files in the run
//! directory: `journal.json` (task states plus a config digest) and
//! `config.snapshot.json` (the full config used to plan the run, read
//! back on resume to check compatibility).

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lb_core::{BenchmarkConfig, Task, TaskError, TaskKey, TaskStatus};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::JournalError;

const JOURNAL_FILE: &str = "journal.json";
const SNAPSHOT_FILE: &str = "config.snapshot.json";
const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalDocument {
    run_id: String,
    created_ts: u64,
    updated_ts: u64,
    config_digest: String,
    tasks: IndexMap<TaskKey, Task>,
    /// The controller's terminal FSM state name (`"FINISHED"`, `"ABORTED"`,
    /// ...), set once the run reaches one. `None` while still in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_state: Option<String>,
}

/// A run's task-state ledger, bound to a run directory on disk.
pub struct Journal {
    document: JournalDocument,
    dir: PathBuf,
}

impl Journal {
    /// Create a fresh journal for `plan`, every task starting `PENDING`.
    /// Writes `config.snapshot.json` and an initial `journal.json` before
    /// returning.
    pub fn new(
        dir: impl Into<PathBuf>,
        run_id: impl Into<String>,
        config: &BenchmarkConfig,
        plan: &[TaskKey],
        now: u64,
    ) -> Result<Self, JournalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| JournalError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let snapshot_bytes = serde_json::to_vec_pretty(config).map_err(|source| JournalError::Corrupt {
            path: snapshot_path.display().to_string(),
            source,
        })?;
        atomic_write(&snapshot_path, &snapshot_bytes)?;

        let mut tasks = IndexMap::with_capacity(plan.len());
        for key in plan {
            tasks.insert(key.clone(), Task::pending(now));
        }

        let document = JournalDocument {
            run_id: run_id.into(),
            created_ts: now,
            updated_ts: now,
            config_digest: digest_bytes(&snapshot_bytes),
            tasks,
            final_state: None,
        };

        let journal = Self { document, dir };
        journal.flush()?;
        Ok(journal)
    }

    /// Load an existing journal from `dir`, verifying it against `current_config`.
    ///
    /// Fails with [`JournalError::Corrupt`] if either on-disk file does not
    /// parse, and [`JournalError::SchemaMismatch`] if the snapshot's config
    /// is not resume-compatible with `current_config`.
    pub fn load(dir: impl Into<PathBuf>, current_config: &BenchmarkConfig) -> Result<Self, JournalError> {
        let dir = dir.into();
        let journal_path = dir.join(JOURNAL_FILE);
        let journal_bytes = fs::read(&journal_path).map_err(|source| JournalError::Io {
            path: journal_path.display().to_string(),
            source,
        })?;
        let document: JournalDocument =
            serde_json::from_slice(&journal_bytes).map_err(|source| JournalError::Corrupt {
                path: journal_path.display().to_string(),
                source,
            })?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let snapshot_bytes = fs::read(&snapshot_path).map_err(|source| JournalError::Io {
            path: snapshot_path.display().to_string(),
            source,
        })?;
        if digest_bytes(&snapshot_bytes) != document.config_digest {
            return Err(JournalError::DigestMismatch { path: snapshot_path.display().to_string() });
        }
        let stored_config: BenchmarkConfig =
            serde_json::from_slice(&snapshot_bytes).map_err(|source| JournalError::Corrupt {
                path: snapshot_path.display().to_string(),
                source,
            })?;
        if !stored_config.is_compatible_for_resume(current_config) {
            return Err(JournalError::SchemaMismatch {
                reason: "hosts, workload enablement, or repetitions changed since the run started".into(),
            });
        }

        Ok(Self { document, dir })
    }

    pub fn run_id(&self) -> &str {
        &self.document.run_id
    }

    pub fn created_ts(&self) -> u64 {
        self.document.created_ts
    }

    pub fn updated_ts(&self) -> u64 {
        self.document.updated_ts
    }

    pub fn final_state(&self) -> Option<&str> {
        self.document.final_state.as_deref()
    }

    /// Record the controller's terminal FSM state once the run ends.
    pub fn set_final_state(&mut self, state: impl Into<String>, now: u64) {
        self.document.final_state = Some(state.into());
        self.document.updated_ts = now;
    }

    pub fn get(&self, key: &TaskKey) -> Option<&Task> {
        self.document.tasks.get(key)
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&TaskKey, &Task)> {
        self.document.tasks.iter()
    }

    /// Task keys outstanding (`PENDING` or `FAILED`), in plan order (I1).
    pub fn pending(&self) -> Vec<TaskKey> {
        self.document
            .tasks
            .iter()
            .filter(|(_, task)| task.status.is_outstanding())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// `true` once every task in the plan has reached a terminal status (P2).
    pub fn is_complete(&self) -> bool {
        self.document.tasks.values().all(|task| task.status.is_terminal())
    }

    /// Validate and apply a task transition (I2, I3); the journal itself is
    /// the sole mutator callers should route status changes through.
    pub fn update(
        &mut self,
        key: &TaskKey,
        next: TaskStatus,
        now: u64,
        error: Option<TaskError>,
    ) -> Result<(), JournalError> {
        let task = self
            .document
            .tasks
            .entry(key.clone())
            .or_insert_with(|| Task::pending(now));
        task.transition(next, now, error)?;
        self.document.updated_ts = now;
        Ok(())
    }

    /// Atomically persist the journal to `<dir>/journal.json`.
    pub fn flush(&self) -> Result<(), JournalError> {
        let bytes = serde_json::to_vec_pretty(&self.document).map_err(|source| JournalError::Corrupt {
            path: self.dir.join(JOURNAL_FILE).display().to_string(),
            source,
        })?;
        atomic_write(&self.dir.join(JOURNAL_FILE), &bytes)
    }
}

fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write `bytes` to `path` via a temp file, fsync, and rename, rotating up
/// to [`MAX_BAK_FILES`] prior generations out of the way first.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), JournalError> {
    let io_err = |source: std::io::Error| JournalError::Io { path: path.display().to_string(), source };

    if path.exists() {
        rotate_backups(path);
        fs::rename(path, backup_path(path, 1)).map_err(io_err)?;
    }

    let tmp_path = path.with_extension("tmp");
    let mut tmp = fs::File::create(&tmp_path).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.sync_all().map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

fn backup_path(path: &Path, n: u32) -> PathBuf {
    if n == 1 {
        path.with_extension("bak")
    } else {
        path.with_extension(format!("bak.{n}"))
    }
}

fn rotate_backups(path: &Path) {
    let oldest = backup_path(path, MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = backup_path(path, n);
        if src.exists() {
            let _ = fs::rename(&src, backup_path(path, n + 1));
        }
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
