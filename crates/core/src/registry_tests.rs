use super::*;
use crate::config::WorkloadEntry;
use crate::stop::StopToken;
use std::time::Duration;

fn sleep_entry(duration_ms: u64) -> WorkloadEntry {
    let mut options = std::collections::HashMap::new();
    options.insert("duration_ms".to_string(), serde_json::json!(duration_ms));
    WorkloadEntry {
        plugin: "sleep_workload".to_string(),
        enabled: true,
        intensity: crate::config::Intensity::Low,
        options,
    }
}

#[test]
fn with_reference_plugins_registers_sleep_workload() {
    let registry = PluginRegistry::with_reference_plugins();
    assert!(registry.get("sleep_workload").is_some());
    assert_eq!(registry.names(), vec!["sleep_workload"]);
}

#[test]
fn unknown_plugin_is_absent() {
    let registry = PluginRegistry::with_reference_plugins();
    assert!(registry.get("does_not_exist").is_none());
}

#[tokio::test]
async fn sleep_workload_completes_after_its_duration() {
    let entry = sleep_entry(5);
    let stop = StopToken::new();
    let result = SleepWorkload.run(&entry, &stop).await.unwrap();
    assert!(result.samples.is_empty());
}

#[tokio::test]
async fn sleep_workload_is_interrupted_by_stop_request() {
    let entry = sleep_entry(10_000);
    let stop = StopToken::new();
    let waiter = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.request_stop();
    });
    let error = SleepWorkload.run(&entry, &stop).await.unwrap_err();
    assert_eq!(error.kind, crate::error::TaskErrorKind::StopRequested);
}

#[tokio::test]
async fn wall_clock_collector_reports_a_millisecond_sample() {
    let entry = sleep_entry(0);
    assert!(WallClockCollector.start(&entry).await.is_ok());
    let samples = WallClockCollector.stop(&entry).await.unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name, "wall_clock_ms");
    assert_eq!(samples[0].unit.as_deref(), Some("ms"));
    assert!(samples[0].value > 0.0);
}
