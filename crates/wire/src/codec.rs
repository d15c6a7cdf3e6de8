// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `LB_EVENT` line codec.
//!
//! Each EventStream line is a space-separated `key=value` record prefixed
//! by the literal token `LB_EVENT`. Values containing whitespace are
//! double-quoted with `\"` and `\\` backslash-escaped; all other values are
//! bare tokens. This keeps the format `tail -f`-able and greppable while
//! still round-tripping arbitrary log messages.

use std::collections::HashMap;
use std::fmt::Write as _;

use lb_core::{EventType, LogLevel, RunEvent, RunStatus, TaskError, TaskErrorKind};

use crate::error::WireError;

const PREFIX: &str = "LB_EVENT";

/// Render a [`RunEvent`] as one `LB_EVENT ...` line (no trailing newline).
pub fn encode_line(event: &RunEvent) -> String {
    let mut out = String::from(PREFIX);
    write_field(&mut out, "type", &event.event_type.to_string());
    write_field(&mut out, "run_id", &event.run_id);
    write_field(&mut out, "host", &event.host);
    write_field(&mut out, "workload", &event.workload);
    write_field(&mut out, "repetition", &event.repetition.to_string());
    write_field(&mut out, "total_repetitions", &event.total_repetitions.to_string());
    write_field(&mut out, "ts", &event.ts.to_string());
    if let Some(status) = event.status {
        write_field(&mut out, "status", &status.to_string());
    }
    if let Some(level) = event.level {
        write_field(&mut out, "level", &level.to_string());
    }
    if let Some(message) = &event.message {
        write_field(&mut out, "message", message);
    }
    if let Some(error) = &event.error {
        write_field(&mut out, "error_kind", &error.kind.to_string());
        write_field(&mut out, "error_message", &error.message);
        if !error.context.is_empty() {
            let json = serde_json::to_string(&error.context).unwrap_or_default();
            write_field(&mut out, "error_context", &json);
        }
    }
    out
}

fn write_field(out: &mut String, key: &str, value: &str) {
    let _ = write!(out, " {key}=");
    if value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
        out.push('"');
        for c in value.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(value);
    }
}

/// Parse one `LB_EVENT ...` line back into a [`RunEvent`].
pub fn decode_line(line: &str) -> Result<RunEvent, WireError> {
    let rest = line
        .strip_prefix(PREFIX)
        .ok_or(WireError::MissingPrefix)?
        .trim_start();
    let fields = tokenize(rest)?;

    let get = |key: &str| -> Result<&str, WireError> {
        fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| WireError::MissingField(key.to_string()))
    };
    let parse_u32 = |key: &str, value: &str| -> Result<u32, WireError> {
        value
            .parse()
            .map_err(|_| WireError::InvalidValue { field: key.to_string(), value: value.to_string() })
    };
    let parse_u64 = |key: &str, value: &str| -> Result<u64, WireError> {
        value
            .parse()
            .map_err(|_| WireError::InvalidValue { field: key.to_string(), value: value.to_string() })
    };

    let event_type = parse_event_type(get("type")?)?;
    let run_id = get("run_id")?.to_string();
    let host = get("host")?.to_string();
    let workload = get("workload")?.to_string();
    let repetition = parse_u32("repetition", get("repetition")?)?;
    let total_repetitions = parse_u32("total_repetitions", get("total_repetitions")?)?;
    let ts = parse_u64("ts", get("ts")?)?;

    let status = fields.get("status").map(|v| parse_run_status(v)).transpose()?;
    let level = fields.get("level").map(|v| parse_log_level(v)).transpose()?;
    let message = fields.get("message").cloned();

    let error = if fields.contains_key("error_kind") || fields.contains_key("error_message") {
        let kind = parse_task_error_kind(get("error_kind")?)?;
        let message = get("error_message")?.to_string();
        let context = match fields.get("error_context") {
            Some(raw) => serde_json::from_str(raw).map_err(|_| WireError::InvalidValue {
                field: "error_context".to_string(),
                value: raw.clone(),
            })?,
            None => Default::default(),
        };
        Some(TaskError { kind, message, context })
    } else {
        None
    };

    Ok(RunEvent {
        event_type,
        run_id,
        host,
        workload,
        repetition,
        total_repetitions,
        ts,
        status,
        level,
        message,
        error,
    })
}

/// Split `key=value` tokens, honoring double-quoted values.
fn tokenize(rest: &str) -> Result<HashMap<String, String>, WireError> {
    let mut fields = HashMap::new();
    let mut chars = rest.chars().peekable();

    while chars.peek().is_some() {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.peek() != Some(&'=') {
            return Err(WireError::MissingField(key));
        }
        chars.next();

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(next) = chars.next() {
                            value.push(next);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(WireError::UnterminatedQuote);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }

        fields.insert(key, value);
    }

    Ok(fields)
}

fn parse_event_type(value: &str) -> Result<EventType, WireError> {
    match value {
        "status" => Ok(EventType::Status),
        "log" => Ok(EventType::Log),
        "progress" => Ok(EventType::Progress),
        other => Err(WireError::InvalidValue { field: "type".to_string(), value: other.to_string() }),
    }
}

fn parse_run_status(value: &str) -> Result<RunStatus, WireError> {
    match value {
        "running" => Ok(RunStatus::Running),
        "done" => Ok(RunStatus::Done),
        "failed" => Ok(RunStatus::Failed),
        other => Err(WireError::InvalidValue { field: "status".to_string(), value: other.to_string() }),
    }
}

fn parse_log_level(value: &str) -> Result<LogLevel, WireError> {
    match value {
        "DEBUG" => Ok(LogLevel::Debug),
        "INFO" => Ok(LogLevel::Info),
        "WARNING" => Ok(LogLevel::Warning),
        "ERROR" => Ok(LogLevel::Error),
        other => Err(WireError::InvalidValue { field: "level".to_string(), value: other.to_string() }),
    }
}

fn parse_task_error_kind(value: &str) -> Result<TaskErrorKind, WireError> {
    match value {
        "stop_requested" => Ok(TaskErrorKind::StopRequested),
        "workload_error" => Ok(TaskErrorKind::WorkloadError),
        "metric_collection_error" => Ok(TaskErrorKind::MetricCollectionError),
        "artifact_persist_error" => Ok(TaskErrorKind::ArtifactPersistError),
        "remote_execution_error" => Ok(TaskErrorKind::RemoteExecutionError),
        "unknown" => Ok(TaskErrorKind::Unknown),
        other => Err(WireError::InvalidValue { field: "error_kind".to_string(), value: other.to_string() }),
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
