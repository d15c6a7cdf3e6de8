// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin registry: the explicit table of known workloads and collectors.
//!
//! A plugin is resolved by name from `BenchmarkConfig::workloads[_].plugin`;
//! there is no dynamic loading, so the registry is just a `HashMap` built up
//! front by whoever assembles the engine (the CLI, or a test harness).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::WorkloadEntry;
use crate::error::{TaskError, TaskErrorKind};
use crate::stop::StopToken;

/// A single measured value produced by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Sample {
    pub fn new(name: impl Into<String>, value: f64, unit: Option<&str>) -> Self {
        Self { name: name.into(), value, unit: unit.map(str::to_string) }
    }
}

/// What a single repetition of a workload produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadResult {
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub artifacts: Vec<std::path::PathBuf>,
    /// Non-fatal collector failures from this repetition (start or stop),
    /// surfaced here rather than dropped — the repetition can still succeed
    /// with partial metrics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collector_errors: Vec<TaskError>,
}

/// A runnable benchmark workload.
///
/// `run` must observe `stop` at any suspension point of nontrivial
/// duration; the reference implementation below does this via
/// [`StopToken::sleep`].
#[async_trait]
pub trait Workload: Send + Sync {
    async fn run(
        &self,
        entry: &WorkloadEntry,
        stop: &StopToken,
    ) -> Result<WorkloadResult, TaskError>;

    /// Best-effort cleanup invoked after a stop request interrupts `run`.
    /// Called with no active `StopToken` (non-cancellable) and bounded by
    /// the caller's own deadline; the default does nothing.
    async fn teardown(&self, _entry: &WorkloadEntry) -> Result<(), TaskError> {
        Ok(())
    }
}

/// A metric collector, started before a workload runs and stopped after it
/// finishes. Identified by [`Collector::name`] in `MetricCollectionError`
/// context when either call fails.
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;

    /// Begin collecting, before the workload starts. Default no-op for
    /// collectors that only take a single sample at `stop`.
    async fn start(&self, entry: &WorkloadEntry) -> Result<(), TaskError> {
        let _ = entry;
        Ok(())
    }

    /// Stop collecting and return the samples gathered since `start`.
    async fn stop(&self, entry: &WorkloadEntry) -> Result<Vec<Sample>, TaskError>;
}

/// One plugin's bundled workload and collectors, keyed by plugin name in the registry.
pub struct PluginDescriptor {
    pub name: String,
    pub workload: Arc<dyn Workload>,
    pub collectors: Vec<Arc<dyn Collector>>,
}

/// The explicit table of plugins the engine can dispatch to.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginDescriptor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: PluginDescriptor) {
        self.plugins.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// A registry pre-loaded with the reference `sleep_workload` plugin,
    /// useful for smoke-testing a config end to end without any real
    /// playbooks or remote hosts.
    pub fn with_reference_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(PluginDescriptor {
            name: "sleep_workload".to_string(),
            workload: Arc::new(SleepWorkload),
            collectors: vec![Arc::new(WallClockCollector)],
        });
        registry
    }
}

/// Reference workload: sleeps for `options.duration_ms` (default 1000),
/// cooperatively cancellable via the ambient stop token.
pub struct SleepWorkload;

#[async_trait]
impl Workload for SleepWorkload {
    async fn run(
        &self,
        entry: &WorkloadEntry,
        stop: &StopToken,
    ) -> Result<WorkloadResult, TaskError> {
        let duration_ms = entry
            .options
            .get("duration_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(1000);
        stop.sleep(std::time::Duration::from_millis(duration_ms))
            .await
            .map_err(|_| TaskError::new(TaskErrorKind::StopRequested, "sleep_workload interrupted"))?;
        Ok(WorkloadResult::default())
    }
}

/// Reference collector: records the wall-clock time collection stopped at.
pub struct WallClockCollector;

#[async_trait]
impl Collector for WallClockCollector {
    fn name(&self) -> &str {
        "wall_clock"
    }

    async fn stop(&self, _entry: &WorkloadEntry) -> Result<Vec<Sample>, TaskError> {
        let epoch_ms = SystemClock.epoch_ms();
        Ok(vec![Sample::new("wall_clock_ms", epoch_ms as f64, Some("ms"))])
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
