// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! How a workload's fleet-wide phase hooks run, and how a host's pending
//! repetitions actually get bootstrapped: through a [`PlaybookExecutor`]
//! wrapper when remote execution is enabled, or directly in-process via a
//! [`LocalRunner`] when it is not. Resolves which path the Controller takes
//! (open question, decided in `DESIGN.md`).

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use lb_core::{PluginDescriptor, StopToken, SystemClock, WorkloadEntry};

use crate::error::EngineError;
use crate::local_runner::{HostRunOutcome, LocalRunner, RepetitionReport};
use crate::playbook_executor::PlaybookExecutor;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a per-host repetition bootstrap needs, independent of whether
/// the host runs in-process or through a remote playbook.
pub struct HostRunRequest<'a> {
    pub run_id: &'a str,
    pub workload_name: &'a str,
    pub total_repetitions: u32,
    pub pending: &'a [u32],
    pub plugin: &'a PluginDescriptor,
    pub entry: &'a WorkloadEntry,
    pub host_dir: &'a Path,
    pub extravars: &'a HashMap<String, String>,
}

/// How a workload's fleet-wide phase hooks run, and how a host's pending
/// repetitions get bootstrapped and reported back.
#[async_trait]
pub trait HostDriver: Send + Sync {
    /// Run one fleet-wide phase hook (setup/collect_pre/collect_post/
    /// teardown) once, against whatever hosts this driver's inventory
    /// covers. `phase` identifies the call for logging and error context.
    async fn run_phase(&self, phase: &str, playbook_id: &str, extravars: &HashMap<String, String>, stop: &StopToken) -> Result<(), EngineError>;

    /// Bootstrap one host's pending repetitions and wait for it to report
    /// back what ran.
    async fn run_host(&self, host: &str, request: &HostRunRequest<'_>, stop: &StopToken) -> Result<HostRunOutcome, EngineError>;

    fn interrupt(&self, host: &str);
}

/// Routes both phase hooks and per-host repetition bootstraps through an
/// external [`PlaybookExecutor`] (remote_execution enabled). One executor
/// instance is shared across hosts; `interrupt` only affects the executor's
/// current subprocess, so callers must serialize concurrent hosts through
/// distinct executor instances if true per-host interruption is required.
pub struct PlaybookHostDriver {
    executor: Arc<dyn PlaybookExecutor>,
    inventory: String,
    env: HashMap<String, String>,
}

impl PlaybookHostDriver {
    pub fn new(executor: Arc<dyn PlaybookExecutor>, inventory: impl Into<String>, env: HashMap<String, String>) -> Self {
        Self { executor, inventory: inventory.into(), env }
    }

    async fn run_playbook(&self, label: &str, playbook_id: &str, extravars: &HashMap<String, String>, stop: &StopToken) -> Result<(), EngineError> {
        let (mut lines, handle) = self
            .executor
            .run(playbook_id, &self.inventory, extravars, &self.env)
            .await
            .map_err(|_| EngineError::RemoteExecution { phase: label.to_string(), playbook_id: playbook_id.to_string(), exit_code: None })?;

        let drain = async {
            while let Some(output) = lines.recv().await {
                tracing::debug!(line = %output.line, stream = ?output.stream, "playbook output");
            }
        };
        tokio::select! {
            biased;
            _ = stop.wait() => {
                self.executor.interrupt();
                drain.await;
                return Err(EngineError::StopRequested);
            }
            _ = drain => {}
        }

        let outcome = handle.await.map_err(|_| EngineError::RemoteExecution { phase: label.to_string(), playbook_id: playbook_id.to_string(), exit_code: None })?;
        match outcome.exit_code {
            Some(0) => Ok(()),
            code => Err(EngineError::RemoteExecution { phase: label.to_string(), playbook_id: playbook_id.to_string(), exit_code: code }),
        }
    }
}

#[async_trait]
impl HostDriver for PlaybookHostDriver {
    async fn run_phase(&self, phase: &str, playbook_id: &str, extravars: &HashMap<String, String>, stop: &StopToken) -> Result<(), EngineError> {
        self.run_playbook(phase, playbook_id, extravars, stop).await
    }

    /// The bootstrap target is the workload's own plugin: a small wrapper
    /// playbook that starts a runner on the remote host and reports exit
    /// status. A real transport would parse per-repetition telemetry out of
    /// the playbook's output; this one maps a single exit code onto every
    /// pending repetition, since that transport is out of scope here.
    async fn run_host(&self, host: &str, request: &HostRunRequest<'_>, stop: &StopToken) -> Result<HostRunOutcome, EngineError> {
        match self.run_playbook(host, &request.entry.plugin, request.extravars, stop).await {
            Ok(()) => {
                Ok(HostRunOutcome { reports: request.pending.iter().map(|&repetition| RepetitionReport { repetition, error: None }).collect(), stopped: false })
            }
            Err(EngineError::StopRequested) => Ok(HostRunOutcome { reports: Vec::new(), stopped: true }),
            Err(error) => {
                let task_error = error.into_task_error();
                Ok(HostRunOutcome {
                    reports: request.pending.iter().map(|&repetition| RepetitionReport { repetition, error: Some(task_error.clone()) }).collect(),
                    stopped: false,
                })
            }
        }
    }

    fn interrupt(&self, _host: &str) {
        self.executor.interrupt();
    }
}

/// Bypasses remote transport entirely: runs a [`LocalRunner`] in-process for
/// each host's repetitions, used when `remote_execution.enabled = false`. A
/// local run has no playbooks to invoke, so `phase_fn` is a no-op in
/// production; it is kept pluggable so tests can still observe phase-hook
/// call counts without standing up a real playbook executor.
pub struct LocalHostDriver<F> {
    runner: LocalRunner,
    clock: SystemClock,
    phase_fn: F,
}

impl<F> LocalHostDriver<F>
where
    F: for<'a> Fn(&'a str, &'a str, &'a StopToken) -> BoxFuture<'a, Result<(), EngineError>> + Send + Sync,
{
    pub fn new(runner: LocalRunner, phase_fn: F) -> Self {
        Self { runner, clock: SystemClock, phase_fn }
    }
}

#[async_trait]
impl<F> HostDriver for LocalHostDriver<F>
where
    F: for<'a> Fn(&'a str, &'a str, &'a StopToken) -> BoxFuture<'a, Result<(), EngineError>> + Send + Sync,
{
    async fn run_phase(&self, phase: &str, playbook_id: &str, _extravars: &HashMap<String, String>, stop: &StopToken) -> Result<(), EngineError> {
        if stop.should_stop() {
            return Err(EngineError::StopRequested);
        }
        (self.phase_fn)(phase, playbook_id, stop).await
    }

    async fn run_host(&self, host: &str, request: &HostRunRequest<'_>, stop: &StopToken) -> Result<HostRunOutcome, EngineError> {
        self.runner
            .run(
                request.run_id,
                host,
                request.workload_name,
                request.total_repetitions,
                request.pending,
                request.plugin,
                request.entry,
                request.host_dir,
                stop,
                &self.clock,
            )
            .await
    }

    fn interrupt(&self, _host: &str) {}
}

#[cfg(test)]
#[path = "host_driver_tests.rs"]
mod tests;
