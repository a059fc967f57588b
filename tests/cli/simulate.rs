//! Scenario replay through the binary

use crate::common::{toml_file, EVENT_TOPIC, STATE_TOPIC};
use std::process::{Command, Output};

const SCENARIO: &str = r#"
[[step]]
action = "update"
queue = { service_type = "tb_rule_engine", queue_name = "Main" }
partitions = [0, 1, 2]

[[step]]
action = "commit"
partition = 1
offset = 42

[[step]]
action = "wait"

[[step]]
action = "delete"
partitions = [2]
"#;

fn queuestate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_queuestate"))
        .args(args)
        .output()
        .expect("binary should run")
}

fn config(state_topic: Option<&str>) -> String {
    let mut config = format!(
        "[logging]\nlevel = \"warn\"\n\n[coordinator]\nevent_topic = \"{}\"\nmirrored_topics = [\"tb_edqs.events\"]\n",
        EVENT_TOPIC
    );
    if let Some(state_topic) = state_topic {
        config.push_str(&format!("state_topic = \"{}\"\n", state_topic));
    }
    config.push_str("\n[simulation]\nrestore_delay_ms = 1\nrestore_workers = 2\n");
    config
}

#[test]
fn test_simulate_with_state_topic() {
    let config = toml_file(&config(Some(STATE_TOPIC)));
    let scenario = toml_file(SCENARIO);

    let output = queuestate(&[
        "--config-file",
        config.path().to_str().unwrap(),
        "--no-color",
        "simulate",
        scenario.path().to_str().unwrap(),
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Steps applied: 4"), "stdout: {}", stdout);
    assert!(stdout.contains("QK(Main,TB_RULE_ENGINE,system): 0, 1"), "stdout: {}", stdout);
    assert!(stdout.contains("tb_rule_engine.main.state: 0, 1"), "stdout: {}", stdout);
    assert!(stdout.contains("tb_edqs.events: 0, 1"), "stdout: {}", stdout);
    assert!(stdout.contains("State restored: 3 partition(s) in 1 round(s)"), "stdout: {}", stdout);
}

#[test]
fn test_simulate_no_state_overrides_config() {
    let config = toml_file(&config(Some(STATE_TOPIC)));
    let scenario = toml_file(SCENARIO);

    let output = queuestate(&[
        "--config-file",
        config.path().to_str().unwrap(),
        "simulate",
        scenario.path().to_str().unwrap(),
        "--no-state",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("tb_rule_engine.main: 0, 1"), "stdout: {}", stdout);
    assert!(!stdout.contains(STATE_TOPIC), "stdout: {}", stdout);
    assert!(!stdout.contains("State restored"));
}

#[test]
fn test_simulate_rejects_invalid_topics() {
    let config = toml_file(&config(None));
    let scenario = toml_file(SCENARIO);

    let output = queuestate(&[
        "--config-file",
        config.path().to_str().unwrap(),
        "simulate",
        scenario.path().to_str().unwrap(),
        "--state-topic",
        EVENT_TOPIC,
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("state_topic must differ"));
}

#[test]
fn test_simulate_reports_overlapping_ownership() {
    let config = toml_file(&config(None));
    let scenario = toml_file(
        r#"
[[step]]
action = "update"
queue = { service_type = "tb_rule_engine", queue_name = "Main" }
partitions = [0]

[[step]]
action = "update"
queue = { service_type = "tb_rule_engine", queue_name = "HighPriority" }
partitions = [0]
"#,
    );

    let output = queuestate(&[
        "--config-file",
        config.path().to_str().unwrap(),
        "simulate",
        scenario.path().to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("assigns a partition to two queues"));
}

#[test]
fn test_missing_config_file_is_reported() {
    let scenario = toml_file(SCENARIO);

    let output = queuestate(&[
        "--config-file",
        "/nonexistent/queuestate.toml",
        "simulate",
        scenario.path().to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}
