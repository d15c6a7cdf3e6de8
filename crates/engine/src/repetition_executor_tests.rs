use super::*;
use async_trait::async_trait;
use lb_core::test_support::WorkloadEntryBuilder;
use lb_core::{Collector, PluginDescriptor, TaskErrorKind, Workload};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct SucceedingWorkload;

#[async_trait]
impl Workload for SucceedingWorkload {
    async fn run(&self, _entry: &WorkloadEntry, _stop: &StopToken) -> Result<WorkloadResult, TaskError> {
        Ok(WorkloadResult { samples: vec![Sample::new("throughput", 42.0, Some("ops/s"))], artifacts: vec![] })
    }
}

struct FailingWorkload;

#[async_trait]
impl Workload for FailingWorkload {
    async fn run(&self, _entry: &WorkloadEntry, _stop: &StopToken) -> Result<WorkloadResult, TaskError> {
        Err(TaskError::new(TaskErrorKind::WorkloadError, "simulated failure").with_context("exit_code", "1"))
    }
}

struct StopAwareWorkload {
    teardown_called: Arc<AtomicBool>,
}

#[async_trait]
impl Workload for StopAwareWorkload {
    async fn run(&self, _entry: &WorkloadEntry, stop: &StopToken) -> Result<WorkloadResult, TaskError> {
        stop.wait().await;
        Ok(WorkloadResult::default())
    }

    async fn teardown(&self, _entry: &WorkloadEntry) -> Result<(), TaskError> {
        self.teardown_called.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FlakyCollector {
    should_fail: bool,
}

#[async_trait]
impl Collector for FlakyCollector {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn start(&self, _entry: &WorkloadEntry) -> Result<(), TaskError> {
        if self.should_fail {
            Err(TaskError::new(TaskErrorKind::MetricCollectionError, "collector unavailable"))
        } else {
            Ok(())
        }
    }

    async fn stop(&self, _entry: &WorkloadEntry) -> Result<Vec<Sample>, TaskError> {
        Ok(vec![Sample::new("cpu_pct", 10.0, Some("pct"))])
    }
}

fn plugin(workload: Arc<dyn Workload>, collectors: Vec<Arc<dyn Collector>>) -> PluginDescriptor {
    PluginDescriptor { name: "test_plugin".to_string(), workload, collectors }
}

#[tokio::test]
async fn successful_repetition_persists_result_json_and_metrics_csv() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RepetitionExecutor::default();
    let entry = WorkloadEntryBuilder::default().build();
    let descriptor = plugin(Arc::new(SucceedingWorkload), vec![Arc::new(FlakyCollector { should_fail: false })]);
    let stop = StopToken::new();

    let outcome = executor.execute(dir.path(), "host1", "cpu_stress", 1, &descriptor, &entry, &stop).await.unwrap();
    assert!(outcome.is_success());
    let result = outcome.result.unwrap();
    assert_eq!(result.samples.len(), 2);
    assert!(result.collector_errors.is_empty());

    let rep_dir = dir.path().join("cpu_stress").join("rep_1");
    assert!(rep_dir.join("result.json").exists());
    let csv = std::fs::read_to_string(rep_dir.join("metrics").join("samples.csv")).unwrap();
    assert!(csv.contains("throughput"));
    assert!(csv.contains("cpu_pct"));
}

#[tokio::test]
async fn failing_collector_is_dropped_without_aborting_the_repetition() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RepetitionExecutor::default();
    let entry = WorkloadEntryBuilder::default().build();
    let descriptor = plugin(Arc::new(SucceedingWorkload), vec![Arc::new(FlakyCollector { should_fail: true })]);
    let stop = StopToken::new();

    let outcome = executor.execute(dir.path(), "host1", "cpu_stress", 1, &descriptor, &entry, &stop).await.unwrap();
    assert!(outcome.is_success());
    let result = outcome.result.unwrap();
    assert_eq!(result.samples.len(), 1);
    assert_eq!(result.collector_errors.len(), 1);
    assert_eq!(result.collector_errors[0].kind, TaskErrorKind::MetricCollectionError);
    assert_eq!(result.collector_errors[0].context.get("collector").map(String::as_str), Some("flaky"));
    assert_eq!(result.collector_errors[0].context.get("host").map(String::as_str), Some("host1"));
}

#[tokio::test]
async fn workload_error_is_recorded_not_propagated() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RepetitionExecutor::default();
    let entry = WorkloadEntryBuilder::default().build();
    let descriptor = plugin(Arc::new(FailingWorkload), vec![]);
    let stop = StopToken::new();

    let outcome = executor.execute(dir.path(), "host1", "cpu_stress", 1, &descriptor, &entry, &stop).await.unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.error.unwrap().kind, TaskErrorKind::WorkloadError);
}

#[tokio::test]
async fn stop_request_runs_teardown_and_surfaces_stop_requested() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RepetitionExecutor::new(std::time::Duration::from_secs(5));
    let entry = WorkloadEntryBuilder::default().build();
    let teardown_called = Arc::new(AtomicBool::new(false));
    let descriptor = plugin(Arc::new(StopAwareWorkload { teardown_called: teardown_called.clone() }), vec![]);
    let stop = StopToken::new();

    let run = executor.execute(dir.path(), "host1", "cpu_stress", 1, &descriptor, &entry, &stop);
    let stop_clone = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        stop_clone.request_stop();
    });

    let result = run.await;
    assert!(matches!(result, Err(EngineError::StopRequested)));
    assert!(teardown_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn already_stopped_token_short_circuits_before_running_the_workload() {
    let dir = tempfile::tempdir().unwrap();
    let executor = RepetitionExecutor::default();
    let entry = WorkloadEntryBuilder::default().build();
    let calls = Arc::new(AtomicUsize::new(0));

    struct CountingWorkload(Arc<AtomicUsize>);
    #[async_trait]
    impl Workload for CountingWorkload {
        async fn run(&self, _entry: &WorkloadEntry, _stop: &StopToken) -> Result<WorkloadResult, TaskError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(WorkloadResult::default())
        }
    }

    let descriptor = plugin(Arc::new(CountingWorkload(calls.clone())), vec![]);
    let stop = StopToken::new();
    stop.request_stop();

    let result = executor.execute(dir.path(), "host1", "cpu_stress", 1, &descriptor, &entry, &stop).await;
    assert!(matches!(result, Err(EngineError::StopRequested)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
