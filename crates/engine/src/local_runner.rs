// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binds a run to a single host: iterates its repetitions through a
//! [`RepetitionExecutor`], emitting every transition to the host's
//! EventStream plus periodic heartbeats.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lb_core::{Clock, PluginDescriptor, StopToken, TaskError, WorkloadEntry};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::event_stream::EventStreamWriter;
use crate::repetition_executor::RepetitionExecutor;

/// Outcome of one repetition, as observed by the caller driving the journal.
pub struct RepetitionReport {
    pub repetition: u32,
    pub error: Option<TaskError>,
}

/// What a host's batch of repetitions produced. `reports` covers every
/// repetition that actually ran to completion (success or failure) before
/// `stopped` was set - a stop mid-batch does not discard prior progress.
pub struct HostRunOutcome {
    pub reports: Vec<RepetitionReport>,
    pub stopped: bool,
}

pub struct LocalRunner {
    repetition_executor: RepetitionExecutor,
    heartbeat_interval: Duration,
}

impl LocalRunner {
    pub fn new(repetition_executor: RepetitionExecutor, heartbeat_interval: Duration) -> Self {
        Self { repetition_executor, heartbeat_interval }
    }

    /// Run every repetition in `pending` (caller-filtered: resume skips
    /// already-completed ones) for `workload_name` on `host`, writing
    /// events to `host_dir/<host>/lb_events.stream.log`.
    ///
    /// Reports are returned in repetition order for every repetition that
    /// completed before a stop was observed; `stopped` tells the caller
    /// whether the batch was cut short, without discarding what already
    /// finished.
    pub async fn run<C: Clock + 'static>(
        &self,
        run_id: &str,
        host: &str,
        workload_name: &str,
        total_repetitions: u32,
        pending: &[u32],
        plugin: &PluginDescriptor,
        entry: &WorkloadEntry,
        host_dir: &Path,
        stop: &StopToken,
        clock: &C,
    ) -> Result<HostRunOutcome, EngineError> {
        let stream_path = host_dir.join("lb_events.stream.log");
        let writer = Arc::new(Mutex::new(
            EventStreamWriter::create(&stream_path).map_err(|_| EngineError::ArtifactPersist { path: stream_path.display().to_string() })?,
        ));

        let heartbeat_cancel = CancellationToken::new();
        let heartbeat_handle = self.spawn_heartbeat(
            run_id.to_string(),
            host.to_string(),
            workload_name.to_string(),
            total_repetitions,
            writer.clone(),
            clock.clone(),
            heartbeat_cancel.clone(),
        );

        let mut reports = Vec::with_capacity(pending.len());
        let mut stopped = false;

        for &repetition in pending {
            if stop.should_stop() {
                stopped = true;
                break;
            }

            {
                let mut writer = writer.lock();
                let event = lb_core::RunEvent::running(run_id, host, workload_name, repetition, total_repetitions, clock.epoch_ms());
                let _ = writer.append(&event);
            }

            let outcome = self.repetition_executor.execute(host_dir, host, workload_name, repetition, plugin, entry, stop).await;

            match outcome {
                Ok(outcome) if outcome.is_success() => {
                    let mut writer = writer.lock();
                    let event = lb_core::RunEvent::done(run_id, host, workload_name, repetition, total_repetitions, clock.epoch_ms());
                    let _ = writer.append(&event);
                    reports.push(RepetitionReport { repetition, error: None });
                }
                Ok(outcome) => {
                    let error = outcome.error.expect("non-success outcome carries an error");
                    let mut writer = writer.lock();
                    let event = lb_core::RunEvent::failed(run_id, host, workload_name, repetition, total_repetitions, clock.epoch_ms(), error.clone());
                    let _ = writer.append(&event);
                    reports.push(RepetitionReport { repetition, error: Some(error) });
                }
                Err(EngineError::StopRequested) => {
                    stopped = true;
                    break;
                }
                Err(other) => {
                    tracing::error!(workload = workload_name, repetition, error = %other, "repetition failed with an unhandled engine error");
                    let error = other.into_task_error();
                    let mut writer = writer.lock();
                    let event = lb_core::RunEvent::failed(run_id, host, workload_name, repetition, total_repetitions, clock.epoch_ms(), error.clone());
                    let _ = writer.append(&event);
                    reports.push(RepetitionReport { repetition, error: Some(error) });
                }
            }
        }

        heartbeat_cancel.cancel();
        let _ = heartbeat_handle.await;

        Ok(HostRunOutcome { reports, stopped })
    }

    fn spawn_heartbeat(
        &self,
        run_id: String,
        host: String,
        workload_name: String,
        total_repetitions: u32,
        writer: Arc<Mutex<EventStreamWriter>>,
        clock: impl Clock + 'static,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {
                        let mut writer = writer.lock();
                        let event = lb_core::RunEvent::heartbeat(&run_id, &host, &workload_name, 0, total_repetitions, clock.epoch_ms());
                        let _ = writer.append(&event);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "local_runner_tests.rs"]
mod tests;
