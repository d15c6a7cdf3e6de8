// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy.
//!
//! `TaskError` is what gets embedded in a journal entry's `error` field.
//! `ConfigError` is surfaced before a run starts and never recorded on a task.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Free-form key/value context attached to an error for diagnostics.
pub type ErrorContext = HashMap<String, String>;

/// The kind of failure recorded against a single task.
///
/// `Unknown` is reserved for workload panics caught at the executor
/// boundary: they are never silently absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    StopRequested,
    WorkloadError,
    MetricCollectionError,
    ArtifactPersistError,
    RemoteExecutionError,
    Unknown,
}

crate::simple_display! {
    TaskErrorKind {
        StopRequested => "stop_requested",
        WorkloadError => "workload_error",
        MetricCollectionError => "metric_collection_error",
        ArtifactPersistError => "artifact_persist_error",
        RemoteExecutionError => "remote_execution_error",
        Unknown => "unknown",
    }
}

/// The error payload stored on a `FAILED` [`crate::Task`] (journal shape: `error.kind`, `error.message`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: TaskErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: ErrorContext,
}

impl TaskError {
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), context: ErrorContext::new() }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TaskError {}

/// Invalid or unresolvable `BenchmarkConfig`; surfaced before run start (exit code 4).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config field {field:?} is invalid: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("host name {0:?} is used more than once")]
    DuplicateHost(String),
    #[error("workload {workload:?} references unknown plugin {plugin:?}")]
    UnknownPlugin { workload: String, plugin: String },
    #[error("no hosts configured")]
    NoHosts,
    #[error("failed to read config file {path:?}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

/// Sub-kind of a [`crate::error::JournalError`]-class failure (fatal for the whole run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalErrorKind {
    Corrupt,
    SchemaMismatch,
    InvalidTransition,
    Io,
}

crate::simple_display! {
    JournalErrorKind {
        Corrupt => "CORRUPT_JOURNAL",
        SchemaMismatch => "SCHEMA_MISMATCH",
        InvalidTransition => "INVALID_TRANSITION",
        Io => "IO",
    }
}
