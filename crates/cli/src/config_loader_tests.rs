use super::*;
use std::io::Write;

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    (dir, path)
}

#[test]
fn loads_a_minimal_valid_config() {
    let (_dir, path) = write_config(
        r#"
        [general]
        repetitions = 3
        output_dir = "runs"

        [[hosts]]
        name = "h1"
        address = "10.0.0.1"

        [workloads.cpu]
        plugin = "sleep_workload"
        "#,
    );

    let config = load_config(&path).unwrap();
    assert_eq!(config.repetitions, 3);
    assert_eq!(config.hosts.len(), 1);
    assert!(config.output_dir.is_absolute());
    assert_eq!(config.workloads.get("cpu").unwrap().plugin, "sleep_workload");
}

#[test]
fn relative_output_dir_is_resolved_against_the_current_directory() {
    let (_dir, path) = write_config(
        r#"
        [general]
        repetitions = 1
        output_dir = "relative/runs"

        [[hosts]]
        name = "h1"
        address = "10.0.0.1"
        "#,
    );

    let config = load_config(&path).unwrap();
    assert!(config.output_dir.is_absolute());
    assert!(config.output_dir.ends_with("relative/runs"));
}

#[test]
fn zero_repetitions_is_rejected_before_any_run_state_is_touched() {
    let (_dir, path) = write_config(
        r#"
        [general]
        repetitions = 0
        output_dir = "runs"

        [[hosts]]
        name = "h1"
        address = "10.0.0.1"
        "#,
    );

    let error = load_config(&path).unwrap_err();
    assert!(matches!(error, ConfigError::InvalidField { .. }));
}

#[test]
fn missing_hosts_is_rejected() {
    let (_dir, path) = write_config(
        r#"
        [general]
        repetitions = 1
        output_dir = "runs"
        "#,
    );

    let error = load_config(&path).unwrap_err();
    assert!(matches!(error, ConfigError::NoHosts));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let (_dir, path) = write_config("not valid toml {{{");
    let error = load_config(&path).unwrap_err();
    assert!(matches!(error, ConfigError::Parse { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let error = load_config(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(error, ConfigError::Io { .. }));
}
