//! Build information and argument errors

use std::process::Command;

#[test]
fn test_version_subcommand_prints_banner() {
    let output = Command::new(env!("CARGO_BIN_EXE_queuestate"))
        .args(["--log-level", "off", "version"])
        .output()
        .expect("binary should run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(
        stdout.starts_with(&format!("queuestate {}", env!("CARGO_PKG_VERSION"))),
        "stdout: {}",
        stdout
    );
}

#[test]
fn test_unknown_subcommand_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_queuestate"))
        .arg("rebalance")
        .output()
        .expect("binary should run");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("rebalance"));
}
