// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `RunEvent` wire record.
//!
//! This module defines the typed, in-memory shape. `lb-wire` owns the
//! `LB_EVENT ...` line codec that (de)serializes it to/from the
//! EventStream file format.

use crate::error::{TaskError, TaskErrorKind};
use serde::{Deserialize, Serialize};

/// The three event kinds an EventStream line can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Status,
    Log,
    Progress,
}

crate::simple_display! {
    EventType {
        Status => "status",
        Log => "log",
        Progress => "progress",
    }
}

/// Repetition-level status carried by `type=status` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Done,
    Failed,
}

crate::simple_display! {
    RunStatus {
        Running => "running",
        Done => "done",
        Failed => "failed",
    }
}

impl RunStatus {
    /// Whether this status terminates a repetition (`running` does not).
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }
}

/// Log level carried by `type=log` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

crate::simple_display! {
    LogLevel {
        Debug => "DEBUG",
        Info => "INFO",
        Warning => "WARNING",
        Error => "ERROR",
    }
}

/// One event emitted onto a host's EventStream file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_type: EventType,
    pub run_id: String,
    pub host: String,
    pub workload: String,
    pub repetition: u32,
    pub total_repetitions: u32,
    pub ts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl RunEvent {
    /// Build a `status=running` event.
    pub fn running(
        run_id: impl Into<String>,
        host: impl Into<String>,
        workload: impl Into<String>,
        repetition: u32,
        total_repetitions: u32,
        ts: u64,
    ) -> Self {
        Self {
            event_type: EventType::Status,
            run_id: run_id.into(),
            host: host.into(),
            workload: workload.into(),
            repetition,
            total_repetitions,
            ts,
            status: Some(RunStatus::Running),
            level: None,
            message: None,
            error: None,
        }
    }

    /// Build a `status=done` event.
    pub fn done(
        run_id: impl Into<String>,
        host: impl Into<String>,
        workload: impl Into<String>,
        repetition: u32,
        total_repetitions: u32,
        ts: u64,
    ) -> Self {
        Self {
            event_type: EventType::Status,
            run_id: run_id.into(),
            host: host.into(),
            workload: workload.into(),
            repetition,
            total_repetitions,
            ts,
            status: Some(RunStatus::Done),
            level: None,
            message: None,
            error: None,
        }
    }

    /// Build a `status=failed` event carrying a typed error.
    pub fn failed(
        run_id: impl Into<String>,
        host: impl Into<String>,
        workload: impl Into<String>,
        repetition: u32,
        total_repetitions: u32,
        ts: u64,
        error: TaskError,
    ) -> Self {
        Self {
            event_type: EventType::Status,
            run_id: run_id.into(),
            host: host.into(),
            workload: workload.into(),
            repetition,
            total_repetitions,
            ts,
            status: Some(RunStatus::Failed),
            level: None,
            message: None,
            error: Some(error),
        }
    }

    /// Build a `type=log` heartbeat event.
    pub fn heartbeat(
        run_id: impl Into<String>,
        host: impl Into<String>,
        workload: impl Into<String>,
        repetition: u32,
        total_repetitions: u32,
        ts: u64,
    ) -> Self {
        Self {
            event_type: EventType::Log,
            run_id: run_id.into(),
            host: host.into(),
            workload: workload.into(),
            repetition,
            total_repetitions,
            ts,
            status: None,
            level: Some(LogLevel::Info),
            message: Some("heartbeat".to_string()),
            error: None,
        }
    }

    /// The de-duplication key used by consumers: consumers
    /// dedupe on `(run_id, host, workload, repetition, status, type, message_hash)`.
    pub fn dedup_key(&self) -> (String, String, String, u32, Option<RunStatus>, EventType, u64) {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.message.hash(&mut hasher);
        (
            self.run_id.clone(),
            self.host.clone(),
            self.workload.clone(),
            self.repetition,
            self.status,
            self.event_type,
            hasher.finish(),
        )
    }

    /// Classify a terminal status event's error kind for the task journal
    /// when none is attached (e.g. a bare `failed` with no error payload).
    pub fn error_or_unknown(&self) -> Option<TaskError> {
        match self.status {
            Some(RunStatus::Failed) => {
                Some(self.error.clone().unwrap_or_else(|| {
                    TaskError::new(TaskErrorKind::Unknown, "repetition failed with no error detail")
                }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
