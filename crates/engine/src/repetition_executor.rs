// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executes one `(workload, repetition)` attempt on a single host and
//! returns a structured outcome.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lb_core::{PluginDescriptor, Sample, StopToken, TaskError, WorkloadEntry, WorkloadResult};

use crate::error::EngineError;

/// What a repetition resolved to: either the collected result or a
/// recorded failure, never both.
pub struct RepetitionOutcome {
    pub result: Option<WorkloadResult>,
    pub error: Option<TaskError>,
}

impl RepetitionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct RepetitionExecutor {
    /// Bound on how long a workload's teardown hook may run after a stop
    /// request before it is abandoned.
    pub teardown_grace: Duration,
}

impl Default for RepetitionExecutor {
    fn default() -> Self {
        Self { teardown_grace: Duration::from_secs(30) }
    }
}

impl RepetitionExecutor {
    pub fn new(teardown_grace: Duration) -> Self {
        Self { teardown_grace }
    }

    /// Run one repetition end to end, persisting artifacts under
    /// `host_dir/<workload>/rep_<repetition>/`.
    pub async fn execute(
        &self,
        host_dir: &Path,
        host: &str,
        workload_name: &str,
        repetition: u32,
        plugin: &PluginDescriptor,
        entry: &WorkloadEntry,
        stop: &StopToken,
    ) -> Result<RepetitionOutcome, EngineError> {
        let rep_dir = host_dir.join(workload_name).join(format!("rep_{repetition}"));
        fs::create_dir_all(&rep_dir).map_err(|_| EngineError::ArtifactPersist { path: rep_dir.display().to_string() })?;

        if stop.should_stop() {
            return Err(EngineError::StopRequested);
        }

        let (started, mut collector_errors) = self.start_collectors(plugin, entry, host).await;

        let run = plugin.workload.run(entry, stop);
        let outcome = match stop.race(run).await {
            Ok(Ok(mut result)) => {
                let (samples, stop_errors) = self.stop_collectors(plugin, &started, entry, host).await;
                result.samples.extend(samples);
                collector_errors.extend(stop_errors);
                result.collector_errors = collector_errors;
                RepetitionOutcome { result: Some(result), error: None }
            }
            Ok(Err(task_error)) => {
                let (_samples, stop_errors) = self.stop_collectors(plugin, &started, entry, host).await;
                collector_errors.extend(stop_errors);
                RepetitionOutcome { result: None, error: Some(task_error) }
            }
            Err(_stop_requested) => {
                let teardown = plugin.workload.teardown(entry);
                match tokio::time::timeout(self.teardown_grace, teardown).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::warn!(workload = workload_name, repetition, %error, "workload teardown reported an error")
                    }
                    Err(_) => {
                        tracing::warn!(workload = workload_name, repetition, "workload teardown exceeded its grace period; abandoning")
                    }
                }
                return Err(EngineError::StopRequested);
            }
        };

        self.persist_artifacts(&rep_dir, &outcome)?;
        Ok(outcome)
    }

    /// Start every collector in parallel. A collector that fails to start is
    /// dropped for this repetition (never `stop`-ped) and its failure is
    /// surfaced as a `MetricCollectionError`, not just logged and discarded.
    async fn start_collectors(&self, plugin: &PluginDescriptor, entry: &WorkloadEntry, host: &str) -> (Vec<usize>, Vec<TaskError>) {
        let futures = plugin.collectors.iter().map(|collector| collector.start(entry));
        let results = futures_util::future::join_all(futures).await;

        let mut started = Vec::new();
        let mut errors = Vec::new();
        for (idx, (collector, result)) in plugin.collectors.iter().zip(results).enumerate() {
            match result {
                Ok(()) => started.push(idx),
                Err(task_error) => {
                    let engine_error = EngineError::MetricCollection { collector: collector.name().to_string(), host: host.to_string() };
                    tracing::warn!(%engine_error, %task_error, "collector failed to start; dropping it for this repetition");
                    errors.push(engine_error.into_task_error());
                }
            }
        }
        (started, errors)
    }

    /// Stop every collector that started successfully and aggregate their
    /// samples. A collector that fails to stop is surfaced the same way a
    /// start failure is, and simply contributes no samples.
    async fn stop_collectors(&self, plugin: &PluginDescriptor, started: &[usize], entry: &WorkloadEntry, host: &str) -> (Vec<Sample>, Vec<TaskError>) {
        let futures = started.iter().map(|&idx| plugin.collectors[idx].stop(entry));
        let results = futures_util::future::join_all(futures).await;

        let mut samples = Vec::new();
        let mut errors = Vec::new();
        for (&idx, result) in started.iter().zip(results) {
            match result {
                Ok(mut collected) => samples.append(&mut collected),
                Err(task_error) => {
                    let engine_error = EngineError::MetricCollection { collector: plugin.collectors[idx].name().to_string(), host: host.to_string() };
                    tracing::warn!(%engine_error, %task_error, "collector failed to stop; dropping its samples for this repetition");
                    errors.push(engine_error.into_task_error());
                }
            }
        }
        (samples, errors)
    }

    fn persist_artifacts(&self, rep_dir: &Path, outcome: &RepetitionOutcome) -> Result<(), EngineError> {
        let persist_error = |path: &Path| EngineError::ArtifactPersist { path: path.display().to_string() };

        let result_path = rep_dir.join("result.json");
        let body = serde_json::to_string_pretty(&outcome.result).unwrap_or_else(|_| "null".to_string());
        fs::write(&result_path, body).map_err(|_| persist_error(&result_path))?;

        if let Some(result) = &outcome.result {
            let metrics_dir = rep_dir.join("metrics");
            fs::create_dir_all(&metrics_dir).map_err(|_| persist_error(&metrics_dir))?;
            let csv_path = metrics_dir.join("samples.csv");
            let mut csv = String::from("name,value,unit\n");
            for sample in &result.samples {
                csv.push_str(&sample.name);
                csv.push(',');
                csv.push_str(&sample.value.to_string());
                csv.push(',');
                csv.push_str(sample.unit.as_deref().unwrap_or(""));
                csv.push('\n');
            }
            fs::write(&csv_path, csv).map_err(|_| persist_error(&csv_path))?;
        }

        Ok(())
    }
}

pub fn host_dir(output_dir: &Path, run_id: &str, host: &str) -> PathBuf {
    output_dir.join(run_id).join(host)
}

#[cfg(test)]
#[path = "repetition_executor_tests.rs"]
mod tests;
