use super::*;
use std::time::Duration;

#[tokio::test]
async fn true_exits_cleanly_with_code_zero() {
    let executor = ProcessGroupExecutor::new("/usr/bin/true".to_string());
    let (mut rx, handle) = executor.run("playbook-a", "inventory-a", &HashMap::new(), &HashMap::new()).await.unwrap();
    while rx.recv().await.is_some() {}
    let outcome = handle.await.unwrap();
    assert_eq!(outcome.exit_code, Some(0));
    assert!(!executor.is_running());
}

#[tokio::test]
async fn extravars_are_passed_as_sorted_e_flags() {
    let mut extravars = HashMap::new();
    extravars.insert("b".to_string(), "2".to_string());
    extravars.insert("a".to_string(), "1".to_string());

    let executor = ProcessGroupExecutor::new("/bin/echo".to_string());
    let (mut rx, handle) = executor.run("playbook-a", "inventory-a", &extravars, &HashMap::new()).await.unwrap();
    let mut lines = Vec::new();
    while let Some(output) = rx.recv().await {
        lines.push(output.line);
    }
    handle.await.unwrap();
    assert_eq!(lines, vec!["playbook-a inventory-a -e a=1 -e b=2"]);
}

#[tokio::test]
async fn interrupt_before_run_is_a_harmless_no_op() {
    let executor = ProcessGroupExecutor::new("/usr/bin/true".to_string());
    executor.interrupt();
    assert!(!executor.is_running());
}

#[tokio::test]
async fn interrupting_a_sleeping_playbook_terminates_it_early() {
    let executor = ProcessGroupExecutor::new("/bin/sleep".to_string());
    let (_rx, handle) = executor.run("30", "0", &HashMap::new(), &HashMap::new()).await.unwrap();
    assert!(executor.is_running());

    tokio::time::sleep(Duration::from_millis(50)).await;
    executor.interrupt();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert_ne!(outcome.exit_code, Some(0));
    assert!(!executor.is_running());
}
