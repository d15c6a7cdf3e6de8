// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reads a benchmark config from a TOML file on disk and validates it.
//!
//! The on-disk shape nests engine-wide settings under `[general]` rather
//! than flattening them at the document root; this module is the only
//! place that bridges the two.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lb_core::{BenchmarkConfig, ConfigError, HostSpec, PluginAssets, RemoteExecutionConfig, WorkloadEntry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    general: General,
    #[serde(default)]
    workloads: IndexMap<String, WorkloadEntry>,
    #[serde(default)]
    hosts: Vec<HostSpec>,
    #[serde(default)]
    plugin_assets: HashMap<String, PluginAssets>,
}

#[derive(Debug, Deserialize)]
struct General {
    repetitions: u32,
    output_dir: PathBuf,
    #[serde(default)]
    remote_execution: RemoteExecutionConfig,
}

/// Read `path`, validate it, and resolve `output_dir` to an absolute path.
///
/// Validation runs before any run state is touched; a `ConfigError` here
/// always maps to exit code 4 at the binary boundary.
pub fn load_config(path: &Path) -> Result<BenchmarkConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
    let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;

    let output_dir = if file.general.output_dir.is_absolute() {
        file.general.output_dir
    } else {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        cwd.join(file.general.output_dir)
    };

    let config = BenchmarkConfig {
        repetitions: file.general.repetitions,
        workloads: file.workloads,
        hosts: file.hosts,
        output_dir,
        remote_execution: file.general.remote_execution,
        plugin_assets: file.plugin_assets,
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_loader_tests.rs"]
mod tests;
