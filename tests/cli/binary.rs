//! Runs the built `queueset` binary end to end

use crate::common::config_file;
use std::process::Command;

fn queueset() -> Command {
    Command::new(env!("CARGO_BIN_EXE_queueset"))
}

#[test]
fn test_demo_run_prints_final_summary() {
    let output = queueset()
        .args([
            "--shards",
            "3",
            "--items",
            "300",
            "--batch",
            "40",
            "--group-size",
            "16",
            "--auto-close",
            "--log-level",
            "warn",
            "--color",
            "false",
        ])
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("processed=300 succeeded=300"),
        "stdout: {}",
        stdout
    );
}

#[test]
fn test_invalid_config_exits_with_error() {
    let file = config_file("group-size = 0\n");

    let output = queueset()
        .args(["--config-file", file.path().to_str().unwrap(), "--color", "false"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("group-size must be greater than zero"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_version_includes_build_metadata() {
    let output = queueset().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("queueset "), "stdout: {}", stdout);
}

#[test]
fn test_config_log_level_applies_after_startup() {
    let file = config_file("log-level = \"warn\"\nauto-close = true\n");

    let output = queueset()
        .args([
            "--config-file",
            file.path().to_str().unwrap(),
            "--items",
            "50",
            "--color",
            "false",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    // Logged at the default level before the config file is read
    assert!(stderr.contains("starting"), "stderr: {}", stderr);
    assert!(!stderr.contains("Listener idle"), "stderr: {}", stderr);
}
