// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expands a [`BenchmarkConfig`] into an ordered task list.

use lb_core::{BenchmarkConfig, TaskKey, TaskStatus};
use lb_storage::Journal;

/// Expands config + selected workloads into `(host, workload, repetition)`
/// tasks, filtering out work a journal already marked `COMPLETED`.
pub struct RunPlanner;

impl RunPlanner {
    /// Build the full plan: hosts in configuration order, `workload_names`
    /// in the caller-supplied order, repetitions `1..=config.repetitions`.
    pub fn full_plan(config: &BenchmarkConfig, workload_names: &[String]) -> Vec<TaskKey> {
        let mut plan = Vec::with_capacity(config.hosts.len() * workload_names.len() * config.repetitions as usize);
        for host in &config.hosts {
            for workload in workload_names {
                for repetition in 1..=config.repetitions {
                    plan.push(TaskKey::new(host.name.clone(), workload.clone(), repetition));
                }
            }
        }
        plan
    }

    /// Build the plan for a resumed run: `COMPLETED` tasks are dropped;
    /// `FAILED` tasks are retried unless `retry_failed` is `false` (retried
    /// by default).
    pub fn resume_plan(
        config: &BenchmarkConfig,
        workload_names: &[String],
        journal: &Journal,
        retry_failed: bool,
    ) -> Vec<TaskKey> {
        Self::full_plan(config, workload_names)
            .into_iter()
            .filter(|key| match journal.get(key).map(|t| t.status) {
                None => true,
                Some(TaskStatus::Completed) => false,
                Some(TaskStatus::Failed) => retry_failed,
                Some(_) => true,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "run_planner_tests.rs"]
mod tests;
