// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract playbook execution boundary and the concrete
//! process-group-based implementation used when no remote transport plugin
//! is configured.

use std::collections::HashMap;
use std::io;
use std::os::unix::process::CommandExt as _;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// One line of output from a running playbook subprocess.
#[derive(Debug, Clone)]
pub struct PlaybookOutputLine {
    pub stream: PlaybookStream,
    pub line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybookStream {
    Stdout,
    Stderr,
}

/// What a playbook run resolved to.
#[derive(Debug, Clone)]
pub struct PlaybookOutcome {
    pub exit_code: Option<i32>,
    pub interrupted: bool,
}

/// Launches an external orchestration subprocess per phase; interruptible.
///
/// The subprocess MUST run in its own process group so `interrupt()` can
/// terminate it without touching the parent orchestrator.
#[async_trait]
pub trait PlaybookExecutor: Send + Sync {
    /// Start `playbook_id` against `inventory` with the given `extravars`
    /// and environment. Returns a receiver of output lines and a join
    /// handle resolving to the outcome once the process exits or is
    /// interrupted.
    async fn run(
        &self,
        playbook_id: &str,
        inventory: &str,
        extravars: &HashMap<String, String>,
        env: &HashMap<String, String>,
    ) -> io::Result<(mpsc::Receiver<PlaybookOutputLine>, tokio::task::JoinHandle<PlaybookOutcome>)>;

    /// Interrupt the active subprocess, if any. Idempotent.
    fn interrupt(&self);

    /// Whether a subprocess is currently in flight.
    fn is_running(&self) -> bool;
}

/// Reference `PlaybookExecutor` that spawns the playbook as a shell command
/// in its own process group and kills the whole group on interrupt.
///
/// `command_template` is the binary to spawn; `playbook_id` and `inventory`
/// are passed as its first two arguments, extravars as repeated `-e k=v`
/// flags, matching the conventions of common playbook runners.
pub struct ProcessGroupExecutor {
    command_template: String,
    active_pid: Arc<Mutex<Option<u32>>>,
}

impl ProcessGroupExecutor {
    pub fn new(command_template: impl Into<String>) -> Self {
        Self { command_template: command_template.into(), active_pid: Arc::new(Mutex::new(None)) }
    }
}

#[async_trait]
impl PlaybookExecutor for ProcessGroupExecutor {
    async fn run(
        &self,
        playbook_id: &str,
        inventory: &str,
        extravars: &HashMap<String, String>,
        env: &HashMap<String, String>,
    ) -> io::Result<(mpsc::Receiver<PlaybookOutputLine>, tokio::task::JoinHandle<PlaybookOutcome>)> {
        let mut cmd = Command::new(&self.command_template);
        cmd.arg(playbook_id).arg(inventory);
        let mut keys: Vec<&String> = extravars.keys().collect();
        keys.sort();
        for key in keys {
            cmd.arg("-e").arg(format!("{key}={}", extravars[key]));
        }
        cmd.envs(env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Spawn into its own process group (stable API, no libc FFI) so a
        // later interrupt can kill the whole tree via killpg.
        cmd.process_group(0);

        let mut child = cmd.spawn()?;
        let pid = child.id().ok_or_else(|| io::Error::other("spawned child has no pid"))?;
        *self.active_pid.lock() = Some(pid);

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let (tx, rx) = mpsc::channel(256);
        let stdout_tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stdout_tx.send(PlaybookOutputLine { stream: PlaybookStream::Stdout, line }).await.is_err() {
                    break;
                }
            }
        });
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(PlaybookOutputLine { stream: PlaybookStream::Stderr, line }).await.is_err() {
                    break;
                }
            }
        });

        let active_pid = self.active_pid.clone();
        let handle = tokio::spawn(async move {
            let status = child.wait().await;
            *active_pid.lock() = None;
            match status {
                Ok(status) => PlaybookOutcome { exit_code: status.code(), interrupted: false },
                Err(_) => PlaybookOutcome { exit_code: None, interrupted: false },
            }
        });

        Ok((rx, handle))
    }

    fn interrupt(&self) {
        let Some(pid) = *self.active_pid.lock() else {
            return;
        };
        #[cfg(unix)]
        {
            let pgid = nix::unistd::Pid::from_raw(pid as i32);
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGTERM);
        }
    }

    fn is_running(&self) -> bool {
        self.active_pid.lock().is_some()
    }
}

#[cfg(test)]
#[path = "playbook_executor_tests.rs"]
mod tests;
