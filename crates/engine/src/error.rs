// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine's error taxonomy, distinct from the thin, journal-shaped
//! [`lb_core::TaskError`] it gets collapsed into once a repetition finishes.

use lb_core::{TaskError, TaskErrorKind};

/// A failure raised by the execution engine at repetition, phase, or
/// run scope. Only [`EngineError::StopRequested`] short-circuits a
/// repetition loop; the rest are recorded on the task and execution
/// continues.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("stop requested")]
    StopRequested,

    #[error("workload {workload} rep {repetition} failed{}", exit_code.map(|c| format!(" (exit {c})")).unwrap_or_default())]
    Workload { workload: String, repetition: u32, command: Option<String>, exit_code: Option<i32> },

    #[error("collector {collector} on host {host} failed to produce metrics")]
    MetricCollection { collector: String, host: String },

    #[error("failed to persist artifact at {path}")]
    ArtifactPersist { path: String },

    #[error("playbook {playbook_id} failed during {phase} (exit {exit_code:?})")]
    RemoteExecution { phase: String, playbook_id: String, exit_code: Option<i32> },

    #[error("stopping wait for runners timed out")]
    StopTimeout,

    #[error("{message}")]
    Unknown { message: String },
}

impl EngineError {
    pub fn kind(&self) -> TaskErrorKind {
        match self {
            EngineError::StopRequested => TaskErrorKind::StopRequested,
            EngineError::Workload { .. } => TaskErrorKind::WorkloadError,
            EngineError::MetricCollection { .. } => TaskErrorKind::MetricCollectionError,
            EngineError::ArtifactPersist { .. } => TaskErrorKind::ArtifactPersistError,
            EngineError::RemoteExecution { .. } => TaskErrorKind::RemoteExecutionError,
            EngineError::StopTimeout => TaskErrorKind::Unknown,
            EngineError::Unknown { .. } => TaskErrorKind::Unknown,
        }
    }

    /// Collapse into the journal-shaped error recorded on a `FAILED` task.
    pub fn into_task_error(self) -> TaskError {
        let kind = self.kind();
        let mut error = TaskError::new(kind, self.to_string());
        match self {
            EngineError::Workload { command, exit_code, .. } => {
                if let Some(cmd) = command {
                    error = error.with_context("command", cmd);
                }
                if let Some(code) = exit_code {
                    error = error.with_context("exit_code", code.to_string());
                }
            }
            EngineError::RemoteExecution { playbook_id, exit_code, .. } => {
                error = error.with_context("playbook_id", playbook_id);
                if let Some(code) = exit_code {
                    error = error.with_context("exit_code", code.to_string());
                }
            }
            EngineError::MetricCollection { collector, host } => {
                error = error.with_context("collector", collector).with_context("host", host);
            }
            EngineError::ArtifactPersist { path } => {
                error = error.with_context("path", path);
            }
            _ => {}
        }
        error
    }
}

impl From<lb_core::StopRequested> for EngineError {
    fn from(_: lb_core::StopRequested) -> Self {
        EngineError::StopRequested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_error_carries_command_and_exit_code_into_context() {
        let error = EngineError::Workload {
            workload: "sleep".to_string(),
            repetition: 2,
            command: Some("sleep-bin --ms 10".to_string()),
            exit_code: Some(1),
        };
        let task_error = error.into_task_error();
        assert_eq!(task_error.kind, TaskErrorKind::WorkloadError);
        assert_eq!(task_error.context.get("exit_code").map(String::as_str), Some("1"));
        assert_eq!(task_error.context.get("command").map(String::as_str), Some("sleep-bin --ms 10"));
    }

    #[test]
    fn stop_requested_maps_to_the_stop_requested_kind() {
        assert_eq!(EngineError::StopRequested.kind(), TaskErrorKind::StopRequested);
    }

    #[test]
    fn stop_token_error_converts_via_from() {
        let engine_error: EngineError = lb_core::StopRequested.into();
        assert!(matches!(engine_error, EngineError::StopRequested));
    }
}
