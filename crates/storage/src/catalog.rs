// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Enumerating and inspecting prior runs under an output root.

use std::fs;
use std::path::{Path, PathBuf};

use lb_core::{BenchmarkConfig, Task, TaskKey, TaskStatus};
use serde::Serialize;

use crate::error::CatalogError;
use crate::journal::Journal;

/// Aggregated task-status counts for one run, used by catalog listings.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunTaskCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunTaskCounts {
    fn from_tasks<'a>(tasks: impl Iterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }
}

/// Summary of one run, as returned by [`RunCatalog::list`] and [`RunCatalog::resolve`].
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub run_id: String,
    pub created_ts: u64,
    pub updated_ts: u64,
    pub host_count: usize,
    pub final_state: Option<String>,
    pub task_counts: RunTaskCounts,
}

/// The full detail returned by [`RunCatalog::show`]: the run summary plus
/// every task and the artifact paths found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct RunDetail {
    pub info: RunInfo,
    pub tasks: Vec<(TaskKey, Task)>,
    pub artifact_paths: Vec<PathBuf>,
}

/// Scans an output root for prior runs.
pub struct RunCatalog {
    root: PathBuf,
}

impl RunCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// List every run directory under the root that contains a `journal.json`.
    pub fn list(&self) -> Result<Vec<RunInfo>, CatalogError> {
        let mut runs = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|source| CatalogError::Io {
            path: self.root.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| CatalogError::Io { path: self.root.display().to_string(), source })?;
            let path = entry.path();
            if path.join("journal.json").is_file() {
                if let Ok(info) = self.read_info(&path) {
                    runs.push(info);
                }
            }
        }
        runs.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        Ok(runs)
    }

    /// Resolve a run by id, or `"latest"` for the lexically-greatest run id present.
    pub fn resolve(&self, id_or_latest: &str) -> Result<RunInfo, CatalogError> {
        if id_or_latest == "latest" {
            return self
                .list()?
                .into_iter()
                .max_by(|a, b| a.run_id.cmp(&b.run_id))
                .ok_or_else(|| CatalogError::NotFound("latest".to_string()));
        }
        self.read_info(&self.root.join(id_or_latest))
            .map_err(|_| CatalogError::NotFound(id_or_latest.to_string()))
    }

    /// Full detail for one run: journal tasks plus the artifact tree on disk.
    pub fn show(&self, id: &str) -> Result<RunDetail, CatalogError> {
        let dir = self.root.join(id);
        let info = self.read_info(&dir)?;
        let config = self.read_snapshot(&dir)?;
        let journal = Journal::load(&dir, &config)?;
        let tasks = journal.tasks().map(|(k, v)| (k.clone(), v.clone())).collect();
        let artifact_paths = list_artifacts(&dir);
        Ok(RunDetail { info, tasks, artifact_paths })
    }

    fn read_info(&self, dir: &Path) -> Result<RunInfo, CatalogError> {
        let config = self.read_snapshot(dir)?;
        let journal = Journal::load(dir, &config)?;
        let host_count = config.hosts.len();
        let task_counts = RunTaskCounts::from_tasks(journal.tasks().map(|(_, t)| t));
        Ok(RunInfo {
            run_id: journal.run_id().to_string(),
            created_ts: journal.created_ts(),
            updated_ts: journal.updated_ts(),
            host_count,
            final_state: journal.final_state().map(str::to_string),
            task_counts,
        })
    }

    fn read_snapshot(&self, dir: &Path) -> Result<BenchmarkConfig, CatalogError> {
        let path = dir.join("config.snapshot.json");
        let bytes = fs::read(&path).map_err(|source| CatalogError::Io { path: path.display().to_string(), source })?;
        serde_json::from_slice(&bytes).map_err(|source| {
            CatalogError::Journal(crate::error::JournalError::Corrupt { path: path.display().to_string(), source })
        })
    }
}

fn list_artifacts(dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = fs::read_dir(&current) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                paths.push(path);
            }
        }
    }
    paths.sort();
    paths
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
