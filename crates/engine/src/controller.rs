// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives the global phases and the per-workload inner loop, maintaining
//! the Journal as the single mutator.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lb_core::{BenchmarkConfig, Clock, PluginAssets, PluginRegistry, StopToken, TaskStatus, WorkloadEntry};
use lb_storage::Journal;

use crate::controller_state::{ControllerState, ControllerStateMachine};
use crate::error::EngineError;
use crate::host_driver::{HostDriver, HostRunRequest};
use crate::repetition_executor;
use crate::run_planner::RunPlanner;

/// One host's batch of pending repetitions, staged before the concurrent
/// `driver.run_host` fan-out in [`Controller::run_workload`].
struct HostWork {
    host_name: String,
    pending: Vec<u32>,
    host_dir: PathBuf,
}

/// Tunables the Controller needs beyond the benchmark config itself.
pub struct ControllerOptions {
    pub stop_wait_timeout: Duration,
    pub teardown_grace: Duration,
    pub heartbeat_interval: Duration,
    pub retry_failed_on_resume: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            stop_wait_timeout: Duration::from_secs(60),
            teardown_grace: Duration::from_secs(5 * 60),
            heartbeat_interval: Duration::from_secs(30),
            retry_failed_on_resume: true,
        }
    }
}

/// Drives one run of a [`BenchmarkConfig`] against a set of hosts through a
/// [`HostDriver`], persisting progress into a [`Journal`].
pub struct Controller<'a, D: HostDriver, C: Clock> {
    config: &'a BenchmarkConfig,
    registry: &'a PluginRegistry,
    driver: &'a D,
    journal: Journal,
    output_dir: PathBuf,
    run_id: String,
    options: ControllerOptions,
    clock: C,
    fsm: ControllerStateMachine,
}

impl<'a, D: HostDriver, C: Clock> Controller<'a, D, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a BenchmarkConfig,
        registry: &'a PluginRegistry,
        driver: &'a D,
        journal: Journal,
        output_dir: PathBuf,
        run_id: String,
        options: ControllerOptions,
        clock: C,
    ) -> Self {
        Self { config, registry, driver, journal, output_dir, run_id, options, clock, fsm: ControllerStateMachine::new() }
    }

    pub fn state(&self) -> ControllerState {
        self.fsm.state()
    }

    /// Drive the whole run to a terminal state, recording it in the journal
    /// so a later `lbctl list`/`show` can report it without replaying the run.
    pub async fn run(&mut self, stop: &StopToken) -> ControllerState {
        let final_state = self.run_to_terminal(stop).await;
        self.journal.set_final_state(final_state.to_string(), self.clock.epoch_ms() / 1000);
        let _ = self.journal.flush();
        final_state
    }

    async fn run_to_terminal(&mut self, stop: &StopToken) -> ControllerState {
        if let Err(error) = self.fsm.transition(ControllerState::RunningGlobalSetup) {
            tracing::error!(%error, "cannot start a run from a non-INIT state");
            return self.force_failed();
        }

        if stop.should_stop() {
            return self.handle_stop_during(ControllerState::RunningGlobalSetup, &[]).await;
        }

        let workload_names = self.config.enabled_workload_names();
        if let Err(error) = self.fsm.transition(ControllerState::RunningWorkloads) {
            tracing::error!(%error, "setup-to-workloads transition rejected");
            return self.force_failed();
        }

        for workload_name in &workload_names {
            if stop.should_stop() {
                return self.handle_stop_during(ControllerState::RunningWorkloads, &workload_names).await;
            }
            match self.run_workload_bounded(workload_name, stop).await {
                Ok(Ok(_ran)) => {}
                Ok(Err(EngineError::StopRequested)) => {
                    return self.handle_stop_during(ControllerState::RunningWorkloads, &workload_names).await;
                }
                Ok(Err(error)) => {
                    tracing::error!(workload = %workload_name, %error, "workload phase failed");
                    self.run_global_teardown().await;
                    return self.force_failed();
                }
                Err(StopWaitElapsed) => {
                    tracing::error!(workload = %workload_name, "stop_wait_timeout exceeded waiting for runners to observe stop");
                    return self.force_stop_failed(ControllerState::RunningWorkloads);
                }
            }
        }

        if let Err(error) = self.fsm.transition(ControllerState::RunningGlobalTeardown) {
            tracing::error!(%error, "workloads-to-teardown transition rejected");
            return self.force_failed();
        }
        self.run_global_teardown().await;

        match self.fsm.transition(ControllerState::Finished) {
            Ok(()) => ControllerState::Finished,
            Err(error) => {
                tracing::error!(%error, "teardown-to-finished transition rejected");
                self.force_failed()
            }
        }
    }

    async fn run_workload(&mut self, workload_name: &str, stop: &StopToken) -> Result<bool, EngineError> {
        let Some(entry) = self.config.workloads.get(workload_name) else {
            return Ok(false);
        };
        let Some(plugin) = self.registry.get(&entry.plugin) else {
            return Err(EngineError::Unknown { message: format!("plugin {:?} not found in registry", entry.plugin) });
        };
        let assets = self.config.plugin_assets.get(&entry.plugin).cloned().unwrap_or_default();
        let phase_extravars = merge_extravars(&assets, entry, &HashMap::new());

        if let Some(playbook) = &assets.setup_playbook {
            self.driver.run_phase("setup", playbook, &phase_extravars, stop).await?;
        }

        let workload_names = vec![workload_name.to_string()];
        let plan = RunPlanner::resume_plan(self.config, &workload_names, &self.journal, self.options.retry_failed_on_resume);
        let pending_by_host: HashMap<String, Vec<u32>> = plan.into_iter().filter(|key| key.workload == workload_name).fold(HashMap::new(), |mut acc, key| {
            acc.entry(key.host).or_default().push(key.repetition);
            acc
        });

        if let Some(collect_pre) = &assets.collect_pre {
            self.driver.run_phase("collect_pre", collect_pre, &phase_extravars, stop).await?;
        }

        let mut ran_anything = false;

        // Hosts run concurrently (one `driver.run_host` bootstrap per host);
        // the Journal itself stays single-writer, updated here once every
        // host's batch of reports is back.
        let mut host_work = Vec::new();
        for host in &self.config.hosts {
            let Some(pending) = pending_by_host.get(&host.name) else { continue };
            if pending.is_empty() {
                continue;
            }
            ran_anything = true;
            let host_dir = repetition_executor::host_dir(&self.output_dir, &self.run_id, &host.name);

            for &repetition in pending {
                let key = lb_core::TaskKey::new(host.name.clone(), workload_name.to_string(), repetition);
                if let Some(task) = self.journal.get(&key) {
                    if task.status == TaskStatus::Completed {
                        continue;
                    }
                }
                self.journal
                    .update(&key, TaskStatus::Running, self.clock.epoch_ms() / 1000, None)
                    .map_err(|error| EngineError::Unknown { message: error.to_string() })?;
            }
            host_work.push(HostWork { host_name: host.name.clone(), pending: pending.clone(), host_dir });
        }
        self.journal.flush().map_err(|error| EngineError::Unknown { message: error.to_string() })?;

        let run_id = &self.run_id;
        let repetitions = self.config.repetitions;
        let driver = self.driver;
        let extravars = &phase_extravars;
        let futures = host_work.iter().map(|work| {
            let request = HostRunRequest {
                run_id,
                workload_name,
                total_repetitions: repetitions,
                pending: &work.pending,
                plugin,
                entry,
                host_dir: &work.host_dir,
                extravars,
            };
            async move { driver.run_host(&work.host_name, &request, stop).await }
        });
        let results = futures_util::future::join_all(futures).await;

        let mut stop_requested = false;
        let mut other_error = None;
        for (work, result) in host_work.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    for report in outcome.reports {
                        let key = lb_core::TaskKey::new(work.host_name.clone(), workload_name.to_string(), report.repetition);
                        let (next, error) = match report.error {
                            None => (TaskStatus::Completed, None),
                            Some(error) => (TaskStatus::Failed, Some(error)),
                        };
                        self.journal
                            .update(&key, next, self.clock.epoch_ms() / 1000, error)
                            .map_err(|error| EngineError::Unknown { message: error.to_string() })?;
                    }
                    stop_requested |= outcome.stopped;
                }
                Err(EngineError::StopRequested) => stop_requested = true,
                Err(error) => {
                    other_error.get_or_insert(error);
                }
            }
        }
        self.journal.flush().map_err(|error| EngineError::Unknown { message: error.to_string() })?;

        if let Some(error) = other_error {
            return Err(error);
        }
        if stop_requested {
            return Err(EngineError::StopRequested);
        }

        if let Some(collect_post) = &assets.collect_post {
            self.driver.run_phase("collect_post", collect_post, &phase_extravars, stop).await?;
        }

        if let Some(playbook) = &assets.teardown_playbook {
            // Non-cancellable: run with a fresh, un-stoppable token bounded by grace.
            let teardown_stop = StopToken::new();
            let bounded = tokio::time::timeout(self.options.teardown_grace, self.driver.run_phase("teardown", playbook, &phase_extravars, &teardown_stop));
            match bounded.await {
                Ok(Err(error)) => tracing::warn!(workload = workload_name, %error, "teardown playbook failed"),
                Err(_) => tracing::warn!(workload = workload_name, "teardown playbook exceeded its grace period"),
                Ok(Ok(())) => {}
            }
        }

        Ok(ran_anything)
    }

    /// Run the stop path from any running phase: arm the FSM into its
    /// stopping sub-state, run the (non-cancellable) global teardown, and
    /// land in `ABORTED` (a clean stop is not a failure).
    async fn handle_stop_during(&mut self, phase: ControllerState, _workload_names: &[String]) -> ControllerState {
        let Some(stopping_state) = phase.stopping_counterpart() else {
            return self.force_failed();
        };
        if self.fsm.transition(stopping_state).is_err() {
            return self.force_failed();
        }
        if stopping_state != ControllerState::StoppingInterruptTeardown && self.fsm.transition(ControllerState::StoppingTeardown).is_err() {
            return self.force_failed();
        }
        self.run_global_teardown().await;

        match self.fsm.transition(ControllerState::Aborted) {
            Ok(()) => ControllerState::Aborted,
            Err(_) => self.force_failed(),
        }
    }

    /// Runs `run_workload`, but once `stop` fires mid-flight, bounds how
    /// much longer it may run by `options.stop_wait_timeout` before this
    /// returns `Err(StopWaitElapsed)` and the caller abandons the attempt.
    async fn run_workload_bounded(&mut self, workload_name: &str, stop: &StopToken) -> Result<Result<bool, EngineError>, StopWaitElapsed> {
        let future = self.run_workload(workload_name, stop);
        tokio::pin!(future);
        tokio::select! {
            biased;
            result = &mut future => Ok(result),
            _ = stop.wait() => match tokio::time::timeout(self.options.stop_wait_timeout, future).await {
                Ok(result) => Ok(result),
                Err(_elapsed) => Err(StopWaitElapsed),
            },
        }
    }

    async fn run_global_teardown(&mut self) {
        let _ = self.journal.flush();
    }

    fn force_failed(&mut self) -> ControllerState {
        // `FAILED` is reachable from any non-terminal state; if the FSM is
        // already terminal this is a no-op and the existing state wins.
        let _ = self.fsm.transition(ControllerState::Failed);
        self.fsm.state()
    }

    /// A runner failed to observe stop within its wait timeout: arm the
    /// phase's stopping sub-state, then land directly in `STOP_FAILED`
    /// without attempting teardown (the subprocess is presumed wedged).
    fn force_stop_failed(&mut self, phase: ControllerState) -> ControllerState {
        if let Some(stopping) = phase.stopping_counterpart() {
            let _ = self.fsm.transition(stopping);
        }
        let _ = self.fsm.transition(ControllerState::StopFailed);
        self.fsm.state()
    }
}

/// Marker for [`Controller::run_workload_bounded`]'s timeout path.
struct StopWaitElapsed;

/// Merge extravars: host vars > workload options > plugin setup_extravars >
/// (no separate global layer in this config shape).
fn merge_extravars(assets: &PluginAssets, entry: &WorkloadEntry, host_vars: &HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    let mut merged = HashMap::new();
    for (k, v) in &assets.setup_extravars {
        merged.insert(k.clone(), stringify(v));
    }
    for (k, v) in &entry.options {
        merged.insert(k.clone(), stringify(v));
    }
    for (k, v) in host_vars {
        merged.insert(k.clone(), stringify(v));
    }
    merged
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
