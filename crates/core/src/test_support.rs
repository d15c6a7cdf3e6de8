// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates. Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::{BenchmarkConfig, HostSpec, Intensity, PluginAssets, RemoteExecutionConfig, WorkloadEntry};
use crate::error::{TaskError, TaskErrorKind};
use crate::task::{Task, TaskStatus};

crate::builder! {
    pub struct HostSpecBuilder => HostSpec {
        into {
            name: String = "host-a",
            address: String = "10.0.0.1",
            user: String = "bench",
        }
        set {
            vars: HashMap<String, serde_json::Value> = HashMap::new(),
        }
    }
}

crate::builder! {
    pub struct WorkloadEntryBuilder => WorkloadEntry {
        into {
            plugin: String = "sleep_workload",
        }
        set {
            enabled: bool = true,
            intensity: Intensity = Intensity::Medium,
            options: HashMap<String, serde_json::Value> = HashMap::new(),
        }
    }
}

crate::builder! {
    pub struct BenchmarkConfigBuilder => BenchmarkConfig {
        set {
            repetitions: u32 = 1,
            workloads: indexmap::IndexMap<String, WorkloadEntry> = indexmap::IndexMap::new(),
            hosts: Vec<HostSpec> = vec![HostSpec::builder().build()],
            output_dir: PathBuf = PathBuf::from("/tmp/lb-bench-output"),
            remote_execution: RemoteExecutionConfig = RemoteExecutionConfig::default(),
            plugin_assets: HashMap<String, PluginAssets> = HashMap::new(),
        }
    }
}

impl BenchmarkConfigBuilder {
    /// Register one workload entry under `name`.
    pub fn with_workload(mut self, name: impl Into<String>, entry: WorkloadEntry) -> Self {
        self.workloads.insert(name.into(), entry);
        self
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        set {
            status: TaskStatus = TaskStatus::Pending,
            timestamp: u64 = 0,
            attempts: u32 = 0,
        }
        option {
            error: TaskError = None,
        }
    }
}

/// A `TaskError` with a throwaway message, for tests that only care about the kind.
pub fn sample_task_error(kind: TaskErrorKind) -> TaskError {
    TaskError::new(kind, "test error")
}
