use super::*;
use crate::error::TaskErrorKind;
use yare::parameterized;

#[test]
fn running_event_has_no_error_and_running_status() {
    let event = RunEvent::running("20260101-0001", "host-a", "sleep", 1, 3, 100);
    assert_eq!(event.event_type, EventType::Status);
    assert_eq!(event.status, Some(RunStatus::Running));
    assert!(event.error.is_none());
    assert!(!event.status.unwrap().is_terminal());
}

#[test]
fn failed_event_carries_the_error() {
    let error = TaskError::new(TaskErrorKind::WorkloadError, "exit code 1");
    let event = RunEvent::failed("20260101-0001", "host-a", "sleep", 1, 3, 100, error.clone());
    assert_eq!(event.status, Some(RunStatus::Failed));
    assert_eq!(event.error, Some(error));
    assert!(event.status.unwrap().is_terminal());
}

#[test]
fn heartbeat_is_a_log_event_at_info_level() {
    let event = RunEvent::heartbeat("20260101-0001", "host-a", "sleep", 1, 3, 100);
    assert_eq!(event.event_type, EventType::Log);
    assert_eq!(event.level, Some(LogLevel::Info));
    assert!(event.status.is_none());
}

#[test]
fn error_or_unknown_defaults_when_failed_with_no_error_payload() {
    let mut event = RunEvent::done("20260101-0001", "host-a", "sleep", 1, 3, 100);
    assert!(event.error_or_unknown().is_none(), "non-failed events have no error");

    event.status = Some(RunStatus::Failed);
    event.error = None;
    let classified = event.error_or_unknown().unwrap();
    assert_eq!(classified.kind, TaskErrorKind::Unknown);
}

#[test]
fn error_or_unknown_prefers_attached_error() {
    let error = TaskError::new(TaskErrorKind::RemoteExecutionError, "ssh closed");
    let event = RunEvent::failed("20260101-0001", "host-a", "sleep", 1, 3, 100, error.clone());
    assert_eq!(event.error_or_unknown(), Some(error));
}

#[test]
fn dedup_key_differs_on_message_but_matches_identical_messages() {
    let mut a = RunEvent::heartbeat("r", "h", "w", 1, 1, 100);
    let mut b = RunEvent::heartbeat("r", "h", "w", 1, 1, 200);
    assert_eq!(a.dedup_key(), b.dedup_key(), "ts is not part of the dedup key");

    a.message = Some("first".to_string());
    b.message = Some("second".to_string());
    assert_ne!(a.dedup_key(), b.dedup_key());
}

#[parameterized(
    status = { EventType::Status, "status" },
    log = { EventType::Log, "log" },
    progress = { EventType::Progress, "progress" },
)]
fn event_type_displays_as_snake_case(event_type: EventType, expected: &str) {
    assert_eq!(event_type.to_string(), expected);
}

#[test]
fn run_event_json_round_trips() {
    let event = RunEvent::running("20260101-0001", "host-a", "sleep", 2, 5, 42);
    let json = serde_json::to_string(&event).unwrap();
    let back: RunEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
