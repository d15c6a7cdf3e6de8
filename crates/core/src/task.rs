// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identity and state machine.
//!
//! A [`Task`] is the journal's unit of work: one `(host, workload, repetition)`
//! triple. Status transitions are validated centrally here so the journal,
//! the controller, and tests all agree on what is legal (I1-I4 in the
//! design doc).

use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite key identifying a single repetition of a workload on a host.
///
/// Serializes to/from `"host::workload::rep"` for use as a journal map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub host: String,
    pub workload: String,
    pub repetition: u32,
}

impl TaskKey {
    pub fn new(host: impl Into<String>, workload: impl Into<String>, repetition: u32) -> Self {
        Self { host: host.into(), workload: workload.into(), repetition }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.host, self.workload, self.repetition)
    }
}

/// Error returned when a `"host::workload::rep"` string does not parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid task key {0:?}: expected \"host::workload::rep\"")]
pub struct TaskKeyParseError(String);

impl std::str::FromStr for TaskKey {
    type Err = TaskKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split("::");
        let (Some(host), Some(workload), Some(rep_str), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TaskKeyParseError(s.to_string()));
        };
        let repetition: u32 = rep_str.parse().map_err(|_| TaskKeyParseError(s.to_string()))?;
        if host.is_empty() || workload.is_empty() {
            return Err(TaskKeyParseError(s.to_string()));
        }
        Ok(TaskKey { host: host.to_string(), workload: workload.to_string(), repetition })
    }
}

impl Serialize for TaskKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle status of a [`Task`].
///
/// Legal transitions (I3): `Pending -> Running -> {Completed | Failed}`;
/// `Failed -> Running` only on explicit retry; `Completed` is terminal.
/// `Skipped` may only be assigned before the task's first `Running` (I4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

crate::simple_display! {
    TaskStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Skipped => "SKIPPED",
    }
}

impl TaskStatus {
    /// Whether the status is terminal (no further transitions are legal).
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped)
    }

    /// Whether a journal holding only terminal/running-free tasks considers this "done".
    pub fn is_outstanding(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Failed)
    }

    /// Validate `self -> next` against I3/I4. Returns `Ok(())` if legal.
    pub fn validate_transition(self, next: TaskStatus) -> Result<(), InvalidTransition> {
        let legal = match (self, next) {
            // Idempotent no-op transitions (R2) are always legal.
            (a, b) if a == b => true,
            (TaskStatus::Pending, TaskStatus::Running) => true,
            (TaskStatus::Pending, TaskStatus::Skipped) => true,
            (TaskStatus::Running, TaskStatus::Completed) => true,
            (TaskStatus::Running, TaskStatus::Failed) => true,
            (TaskStatus::Failed, TaskStatus::Running) => true,
            _ => false,
        };
        if legal {
            Ok(())
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }
}

/// A rejected status transition, per I3/I4.
#[derive(Debug, thiserror::Error)]
#[error("invalid task transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// A single journal entry: the last known state of one `(host, workload, repetition)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub status: TaskStatus,
    /// Epoch seconds of the last mutation.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(default)]
    pub attempts: u32,
}

impl Task {
    /// A freshly planned task: `PENDING`, zero attempts, stamped at `now`.
    pub fn pending(now: u64) -> Self {
        Self { status: TaskStatus::Pending, timestamp: now, error: None, attempts: 0 }
    }

    /// Apply a validated transition, bumping `attempts` on entry to `Running`
    /// and clearing `error` unless the new status is `Failed`.
    pub fn transition(
        &mut self,
        next: TaskStatus,
        now: u64,
        error: Option<TaskError>,
    ) -> Result<(), InvalidTransition> {
        self.status.validate_transition(next)?;
        if next == TaskStatus::Running && self.status != TaskStatus::Running {
            self.attempts += 1;
        }
        self.status = next;
        self.timestamp = now;
        self.error = if next == TaskStatus::Failed { error } else { None };
        Ok(())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
