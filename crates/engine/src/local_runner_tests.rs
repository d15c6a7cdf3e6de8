use super::*;
use async_trait::async_trait;
use lb_core::test_support::WorkloadEntryBuilder;
use lb_core::{Collector, FakeClock, PluginDescriptor, Sample, TaskErrorKind, Workload, WorkloadResult};

struct SucceedingWorkload;

#[async_trait]
impl Workload for SucceedingWorkload {
    async fn run(&self, _entry: &WorkloadEntry, _stop: &StopToken) -> Result<WorkloadResult, TaskError> {
        Ok(WorkloadResult { samples: vec![Sample::new("ok", 1.0, None)], artifacts: vec![] })
    }
}

struct AlwaysFailingWorkload;

#[async_trait]
impl Workload for AlwaysFailingWorkload {
    async fn run(&self, _entry: &WorkloadEntry, _stop: &StopToken) -> Result<WorkloadResult, TaskError> {
        Err(TaskError::new(TaskErrorKind::WorkloadError, "boom"))
    }
}

fn plugin(workload: std::sync::Arc<dyn Workload>) -> PluginDescriptor {
    PluginDescriptor { name: "test_plugin".to_string(), workload, collectors: Vec::new() }
}

#[tokio::test]
async fn runs_all_pending_repetitions_and_writes_one_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let runner = LocalRunner::new(RepetitionExecutor::default(), Duration::from_secs(3600));
    let entry = WorkloadEntryBuilder::default().build();
    let descriptor = plugin(std::sync::Arc::new(SucceedingWorkload));
    let stop = StopToken::new();
    let clock = FakeClock::new();

    let outcome = runner
        .run("run-1", "h1", "cpu_stress", 3, &[1, 2, 3], &descriptor, &entry, dir.path(), &stop, &clock)
        .await
        .unwrap();

    assert!(!outcome.stopped);
    assert_eq!(outcome.reports.len(), 3);
    assert!(outcome.reports.iter().all(|r| r.error.is_none()));

    let stream = std::fs::read_to_string(dir.path().join("lb_events.stream.log")).unwrap();
    assert_eq!(stream.lines().filter(|l| l.contains("status=running")).count(), 3);
    assert_eq!(stream.lines().filter(|l| l.contains("status=done")).count(), 3);
}

#[tokio::test]
async fn failing_workload_is_recorded_and_the_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let runner = LocalRunner::new(RepetitionExecutor::default(), Duration::from_secs(3600));
    let entry = WorkloadEntryBuilder::default().build();
    let descriptor = plugin(std::sync::Arc::new(AlwaysFailingWorkload));
    let stop = StopToken::new();
    let clock = FakeClock::new();

    let outcome = runner
        .run("run-1", "h1", "cpu_stress", 2, &[1, 2], &descriptor, &entry, dir.path(), &stop, &clock)
        .await
        .unwrap();

    assert!(!outcome.stopped);
    assert_eq!(outcome.reports.len(), 2);
    assert!(outcome.reports.iter().all(|r| r.error.is_some()));

    let stream = std::fs::read_to_string(dir.path().join("lb_events.stream.log")).unwrap();
    assert_eq!(stream.lines().filter(|l| l.contains("status=failed")).count(), 2);
}

#[tokio::test]
async fn stop_requested_before_starting_breaks_the_loop_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let runner = LocalRunner::new(RepetitionExecutor::default(), Duration::from_secs(3600));
    let entry = WorkloadEntryBuilder::default().build();
    let descriptor = plugin(std::sync::Arc::new(SucceedingWorkload));
    let stop = StopToken::new();
    stop.request_stop();
    let clock = FakeClock::new();

    let outcome = runner.run("run-1", "h1", "cpu_stress", 3, &[1, 2, 3], &descriptor, &entry, dir.path(), &stop, &clock).await.unwrap();
    assert!(outcome.stopped);
    assert!(outcome.reports.is_empty());
}

#[tokio::test]
async fn stop_mid_batch_keeps_reports_already_collected() {
    // `should_stop` is only polled between repetitions, so stopping after
    // repetition 1 finishes (but before repetition 2 starts) simulates a
    // stop arriving mid-batch without needing real timing.
    let dir = tempfile::tempdir().unwrap();
    let runner = LocalRunner::new(RepetitionExecutor::default(), Duration::from_secs(3600));
    let entry = WorkloadEntryBuilder::default().build();
    let descriptor = plugin(std::sync::Arc::new(SucceedingWorkload));
    let stop = StopToken::new();
    let clock = FakeClock::new();

    let first = runner.run("run-1", "h1", "cpu_stress", 3, &[1], &descriptor, &entry, dir.path(), &stop, &clock).await.unwrap();
    assert!(!first.stopped);
    assert_eq!(first.reports.len(), 1);

    stop.request_stop();
    let rest = runner.run("run-1", "h1", "cpu_stress", 3, &[2, 3], &descriptor, &entry, dir.path(), &stop, &clock).await.unwrap();
    assert!(rest.stopped);
    assert!(rest.reports.is_empty());
}
