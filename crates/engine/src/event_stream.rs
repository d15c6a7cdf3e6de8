// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-host EventStream: an append-only `LB_EVENT` log plus an
//! incremental tailer.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write as _};
use std::path::{Path, PathBuf};

use lb_core::RunEvent;
use lb_wire::{decode_line, encode_line};

/// De-duplication window size: large enough to absorb a tailer restart
/// re-reading its last few lines, small enough to stay O(1).
const DEDUP_WINDOW: usize = 256;

/// Append-only writer for one host's `lb_events.stream.log`.
///
/// Line-buffered: every event is flushed immediately so a tailer attached
/// to the same file sees it promptly.
pub struct EventStreamWriter {
    file: File,
}

impl EventStreamWriter {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn append(&mut self, event: &RunEvent) -> std::io::Result<()> {
        writeln!(self.file, "{}", encode_line(event))?;
        self.file.flush()
    }
}

/// Incremental reader over an EventStream file.
///
/// Tracks a byte offset so repeated polls only return newly-appended,
/// complete lines; a trailing partial line (writer mid-flush) is left
/// unconsumed until the next poll completes it.
pub struct EventStreamTailer {
    path: PathBuf,
    offset: u64,
    seen: VecDeque<EventDedupKey>,
}

type EventDedupKey = (String, String, String, u32, Option<lb_core::RunStatus>, lb_core::EventType, u64);

impl EventStreamTailer {
    /// Attach at the current end of file, so events from a previous run's
    /// stream at this path are not re-emitted.
    pub fn attach_at_eof(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let offset = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Ok(Self { path, offset, seen: VecDeque::with_capacity(DEDUP_WINDOW) })
    }

    /// Attach at the start of an existing (or not-yet-created) stream file.
    pub fn attach_from_start(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), offset: 0, seen: VecDeque::with_capacity(DEDUP_WINDOW) }
    }

    /// Read every complete line appended since the last poll, decode it,
    /// drop malformed lines (logged by the caller), and de-duplicate.
    pub fn poll(&mut self) -> std::io::Result<Vec<RunEvent>> {
        let Ok(mut file) = File::open(&self.path) else {
            return Ok(Vec::new());
        };
        file.seek(SeekFrom::Start(self.offset))?;
        let mut reader = BufReader::new(file);

        let mut events = Vec::new();
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            if !line.ends_with('\n') {
                // Partial line: writer hasn't flushed the newline yet. Leave
                // the offset before it so the next poll re-reads it whole.
                break;
            }
            self.offset += bytes_read as u64;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            match decode_line(trimmed) {
                Ok(event) => {
                    if self.admit(&event) {
                        events.push(event);
                    }
                }
                Err(error) => {
                    tracing::warn!(path = %self.path.display(), %error, "dropping malformed event line");
                }
            }
        }
        Ok(events)
    }

    fn admit(&mut self, event: &RunEvent) -> bool {
        let key = event.dedup_key();
        if self.seen.contains(&key) {
            return false;
        }
        if self.seen.len() == DEDUP_WINDOW {
            self.seen.pop_front();
        }
        self.seen.push_back(key);
        true
    }

    /// Whether this event is the final one expected for the stream: a
    /// terminal status for `(run_id, host, workload, repetition)` on the
    /// last workload of the plan.
    pub fn is_stream_end(event: &RunEvent, final_workload: &str) -> bool {
        event.status.is_some_and(|s| s.is_terminal()) && event.workload == final_workload
    }
}

#[cfg(test)]
#[path = "event_stream_tests.rs"]
mod tests;
