// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `lbctl`: drives a benchmark config through the engine to a terminal
//! state and exits with the matching code.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config_loader;
mod exit_error;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lb_core::{BenchmarkConfig, PluginRegistry, StopToken, SystemClock};
use lb_engine::{Controller, ControllerOptions, ControllerState, EngineError, HostDriver, LocalHostDriver, LocalRunner, PlaybookHostDriver, ProcessGroupExecutor, RepetitionExecutor, RunPlanner};
use lb_storage::{Journal, RunCatalog};
use tracing_subscriber::EnvFilter;

use exit_error::ExitError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Parser)]
#[command(name = "lbctl", about = "Plans, runs, and monitors repeated benchmark workloads across hosts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a fresh run, or continue one already in progress at `--run-id`.
    Run {
        /// Path to the benchmark's TOML configuration.
        config: PathBuf,
        /// Run identifier. A new one is generated if omitted.
        #[arg(long)]
        run_id: Option<String>,
        /// File whose mere existence signals a stop request.
        #[arg(long)]
        stop_file: Option<PathBuf>,
    },
    /// Continue an existing run by id; fails if no journal is found for it.
    Resume {
        /// The run to continue.
        run_id: String,
        /// Path to the benchmark's TOML configuration.
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        stop_file: Option<PathBuf>,
    },
    /// List prior runs found under an output root.
    List {
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Show full detail (tasks and artifacts) for one run.
    Show {
        run_id: String,
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Run { config, run_id, stop_file } => cmd_run(&config, run_id, stop_file).await,
        Command::Resume { run_id, config, stop_file } => cmd_resume(&run_id, &config, stop_file).await,
        Command::List { root } => cmd_list(&root),
        Command::Show { run_id, root } => cmd_show(&run_id, &root),
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            let code = error.downcast_ref::<ExitError>().map(|e| e.code).unwrap_or(1);
            eprintln!("lbctl: {error}");
            std::process::exit(code);
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
}

async fn cmd_run(config_path: &Path, run_id: Option<String>, stop_file: Option<PathBuf>) -> Result<i32> {
    let config = load_config_or_exit(config_path)?;
    let registry = PluginRegistry::with_reference_plugins();
    validate_or_exit(&config, &registry)?;

    let run_id = run_id.unwrap_or_else(generate_run_id);
    let run_dir = config.output_dir.join(&run_id);

    let journal = if run_dir.join("journal.json").is_file() {
        Journal::load(&run_dir, &config).map_err(|error| ExitError::new(4, error.to_string()))?
    } else {
        let plan = RunPlanner::full_plan(&config, &config.enabled_workload_names());
        Journal::new(&run_dir, &run_id, &config, &plan, epoch_seconds()).map_err(|error| ExitError::new(4, error.to_string()))?
    };

    execute(&config, &registry, journal, &run_id, stop_file).await
}

async fn cmd_resume(run_id: &str, config_path: &Path, stop_file: Option<PathBuf>) -> Result<i32> {
    let config = load_config_or_exit(config_path)?;
    let registry = PluginRegistry::with_reference_plugins();
    validate_or_exit(&config, &registry)?;

    let run_dir = config.output_dir.join(run_id);
    let journal = Journal::load(&run_dir, &config).map_err(|error| ExitError::new(4, error.to_string()))?;

    execute(&config, &registry, journal, run_id, stop_file).await
}

fn load_config_or_exit(config_path: &Path) -> Result<BenchmarkConfig> {
    config_loader::load_config(config_path).map_err(|error| ExitError::new(4, error.to_string()).into())
}

fn validate_or_exit(config: &BenchmarkConfig, registry: &PluginRegistry) -> Result<()> {
    config.validate_against_registry(registry).map_err(|error| ExitError::new(4, error.to_string()).into())
}

async fn execute(config: &BenchmarkConfig, registry: &PluginRegistry, journal: Journal, run_id: &str, stop_file: Option<PathBuf>) -> Result<i32> {
    let stop = StopToken::with_stop_file(stop_file);
    install_signal_handler(stop.clone());
    let options = ControllerOptions::default();

    if config.remote_execution.enabled {
        let executor = Arc::new(ProcessGroupExecutor::new("ansible-playbook"));
        let driver = PlaybookHostDriver::new(executor, String::new(), Default::default());
        Ok(run_to_exit_code(config, registry, &driver, journal, run_id, &stop, options).await)
    } else {
        let runner = LocalRunner::new(RepetitionExecutor::new(options.teardown_grace), options.heartbeat_interval);
        let driver = LocalHostDriver::new(runner, no_op_phase_fn);
        Ok(run_to_exit_code(config, registry, &driver, journal, run_id, &stop, options).await)
    }
}

fn no_op_phase_fn<'a>(_phase: &'a str, _playbook_id: &'a str, _stop: &'a StopToken) -> BoxFuture<'a, Result<(), EngineError>> {
    Box::pin(async { Ok(()) })
}

async fn run_to_exit_code<D: HostDriver>(
    config: &BenchmarkConfig,
    registry: &PluginRegistry,
    driver: &D,
    journal: Journal,
    run_id: &str,
    stop: &StopToken,
    options: ControllerOptions,
) -> i32 {
    let mut controller = Controller::new(config, registry, driver, journal, config.output_dir.clone(), run_id.to_string(), options, SystemClock);
    let final_state = controller.run(stop).await;
    tracing::info!(run_id, state = %final_state, "run reached a terminal state");

    match final_state {
        ControllerState::Finished => 0,
        ControllerState::Failed => 1,
        ControllerState::Aborted => 2,
        ControllerState::StopFailed => 3,
        other => {
            tracing::error!(run_id, state = %other, "controller returned a non-terminal state");
            1
        }
    }
}

fn cmd_list(root: &Path) -> Result<i32> {
    let catalog = RunCatalog::new(root);
    let runs = catalog.list().map_err(|error| ExitError::new(1, error.to_string()))?;
    for run in &runs {
        println!(
            "{}  hosts={}  state={}  completed={}/{}",
            run.run_id,
            run.host_count,
            run.final_state.as_deref().unwrap_or("IN_PROGRESS"),
            run.task_counts.completed,
            run.task_counts.pending + run.task_counts.running + run.task_counts.completed + run.task_counts.failed + run.task_counts.skipped,
        );
    }
    Ok(0)
}

fn cmd_show(run_id: &str, root: &Path) -> Result<i32> {
    let catalog = RunCatalog::new(root);
    let detail = catalog.show(run_id).map_err(|error| ExitError::new(1, error.to_string()))?;
    let json = serde_json::to_string_pretty(&detail)?;
    println!("{json}");
    Ok(0)
}

fn generate_run_id() -> String {
    format!("run-{}", epoch_seconds())
}

fn epoch_seconds() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// First SIGINT warns and lets the run continue; second arms a stop; a
/// third bypasses the cooperative FSM entirely (the platform-default kill
/// behaviour for a run that's stopped responding).
fn install_signal_handler(stop: StopToken) {
    let count = Arc::new(AtomicU32::new(0));
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            match count.fetch_add(1, Ordering::SeqCst) + 1 {
                1 => tracing::warn!("stop requested; finishing in-flight work"),
                2 => {
                    tracing::warn!("second stop request; interrupting active runners");
                    stop.request_stop();
                }
                _ => {
                    tracing::error!("third stop request; forcing exit");
                    std::process::exit(130);
                }
            }
        }
    });
}
