//! Shared helpers for integration tests

use queuestate::partition::api::{PartitionSet, TopicPartitionInfo};
use std::io::Write;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

pub const EVENT_TOPIC: &str = "tb_rule_engine.main";
pub const STATE_TOPIC: &str = "tb_rule_engine.main.state";

pub fn partitions(topic: &str, numbers: &[u32]) -> PartitionSet {
    numbers
        .iter()
        .map(|p| TopicPartitionInfo::new(topic, *p))
        .collect()
}

/// Temporary TOML file holding `contents`
pub fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
