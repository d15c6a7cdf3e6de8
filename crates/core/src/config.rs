// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Benchmark configuration: what to run, where, and how many times.
//!
//! `BenchmarkConfig` is immutable once loaded; see `lb-cli`'s config loader
//! for how a TOML file is parsed and validated into one of these.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// How aggressively a workload should stress the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
    UserDefined,
}

crate::simple_display! {
    Intensity {
        Low => "low",
        Medium => "medium",
        High => "high",
        UserDefined => "user_defined",
    }
}

/// One workload's configuration entry, keyed by a caller-chosen name in
/// `BenchmarkConfig::workloads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadEntry {
    pub plugin: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_intensity")]
    pub intensity: Intensity,
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

fn default_intensity() -> Intensity {
    Intensity::Medium
}

/// One target host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSpec {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub vars: HashMap<String, serde_json::Value>,
}

/// Per-plugin external assets: the playbooks and extravars a `PlaybookExecutor`
/// needs to run a plugin's setup/teardown/collection phases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginAssets {
    #[serde(default)]
    pub setup_playbook: Option<String>,
    #[serde(default)]
    pub teardown_playbook: Option<String>,
    #[serde(default)]
    pub collect_pre: Option<String>,
    #[serde(default)]
    pub collect_post: Option<String>,
    #[serde(default)]
    pub setup_extravars: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub teardown_extravars: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub required_uv_extras: Vec<String>,
}

/// Remote-execution toggle: `false` routes through the in-process
/// `LocalHostDriver`, `true` through a `PlaybookExecutor`-backed `HostDriver`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteExecutionConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// The whole benchmark configuration. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub repetitions: u32,
    #[serde(default)]
    pub workloads: indexmap::IndexMap<String, WorkloadEntry>,
    #[serde(default)]
    pub hosts: Vec<HostSpec>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub remote_execution: RemoteExecutionConfig,
    #[serde(default)]
    pub plugin_assets: HashMap<String, PluginAssets>,
}

impl BenchmarkConfig {
    /// Enabled workload names, in configuration (insertion) order.
    pub fn enabled_workload_names(&self) -> Vec<String> {
        self.workloads
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Validate the config's structural invariants.
    ///
    /// Does not check that referenced plugin names resolve in a registry;
    /// callers that have a `PluginRegistry` should additionally call
    /// [`Self::validate_against_registry`].
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        if self.repetitions == 0 {
            return Err(ConfigError::InvalidField {
                field: "repetitions".into(),
                reason: "must be > 0".into(),
            });
        }
        if self.hosts.is_empty() {
            return Err(ConfigError::NoHosts);
        }
        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            if host.name.is_empty() {
                return Err(ConfigError::InvalidField {
                    field: "hosts[].name".into(),
                    reason: "must be non-empty".into(),
                });
            }
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::DuplicateHost(host.name.clone()));
            }
        }
        Ok(())
    }

    /// Whether `other` is close enough to `self` to resume a run planned
    /// against `self`. Permitted drift is output subpaths, non-plan-affecting
    /// plugin options, and log levels; `hosts`, workload enablement, and
    /// `repetitions` must match exactly.
    pub fn is_compatible_for_resume(&self, other: &BenchmarkConfig) -> bool {
        if self.repetitions != other.repetitions {
            return false;
        }
        let self_hosts: Vec<&str> = self.hosts.iter().map(|h| h.name.as_str()).collect();
        let other_hosts: Vec<&str> = other.hosts.iter().map(|h| h.name.as_str()).collect();
        if self_hosts != other_hosts {
            return false;
        }
        self.enabled_workload_names() == other.enabled_workload_names()
    }

    /// Validate that every configured workload's `plugin` is known to `registry`.
    pub fn validate_against_registry(
        &self,
        registry: &crate::registry::PluginRegistry,
    ) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        for (name, entry) in &self.workloads {
            if !entry.enabled {
                continue;
            }
            if registry.get(&entry.plugin).is_none() {
                return Err(ConfigError::UnknownPlugin {
                    workload: name.clone(),
                    plugin: entry.plugin.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
