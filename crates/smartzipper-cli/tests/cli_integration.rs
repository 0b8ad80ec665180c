//! CLI Integration Tests
//!
//! These tests run the `smartzipper` binary. Everything here uses the
//! simulated sensor (`--mock`) or no sensor at all; the hardware test is
//! marked with #[ignore].
//!
//! Run mock tests:
//! ```
//! cargo test --package smartzipper-cli --test cli_integration
//! ```
//!
//! Run hardware tests:
//! ```
//! SMARTZIPPER_DEVICE="E3:D4:1E:79:7C:16" cargo test --package smartzipper-cli --test cli_integration -- --ignored --nocapture
//! ```

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Run smartzipper against a config file inside `dir` and return output.
fn run_smartzipper(dir: &Path, args: &[&str]) -> Output {
    command(dir, args)
        .output()
        .expect("Failed to run smartzipper binary")
}

fn command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_smartzipper"));
    cmd.arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--no-color")
        .args(args)
        .env_remove("SMARTZIPPER_DEVICE")
        .env("RUST_LOG", "warn");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let output = run_smartzipper(dir.path(), &["--help"]);

    assert!(output.status.success(), "Help should succeed");
    let stdout = stdout(&output);
    for cmd in ["monitor", "read", "test-alert", "config", "completions"] {
        assert!(stdout.contains(cmd), "Help should list {cmd}");
    }
}

#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    let output = run_smartzipper(dir.path(), &["--version"]);

    assert!(output.status.success(), "Version should succeed");
    assert!(stdout(&output).contains("smartzipper"));
}

#[test]
fn test_completions() {
    let dir = TempDir::new().unwrap();
    let output = run_smartzipper(dir.path(), &["completions", "bash"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("smartzipper"));
}

// =============================================================================
// Config Commands
// =============================================================================

#[test]
fn test_config_path_honours_flag() {
    let dir = TempDir::new().unwrap();
    let output = run_smartzipper(dir.path(), &["config", "path"]);

    assert!(output.status.success());
    assert!(stdout(&output).trim().ends_with("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();

    let output = run_smartzipper(dir.path(), &["config", "init"]);
    assert!(output.status.success(), "Init should succeed");
    assert!(dir.path().join("config.toml").exists());

    let output = run_smartzipper(dir.path(), &["--threshold", "90", "config", "show"]);
    assert!(output.status.success(), "Show should succeed");
    let shown = stdout(&output);
    assert!(shown.contains("E3:D4:1E:79:7C:16"));
    assert!(shown.contains("alert_threshold_secs = 90"));

    let output = run_smartzipper(dir.path(), &["config", "init"]);
    assert!(!output.status.success(), "Second init needs --force");
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[monitor]\ncheck_interval_secs = 0\n",
    )
    .unwrap();

    let output = run_smartzipper(dir.path(), &["read", "--mock"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("check_interval_secs"), "stderr: {stderr}");
}

// =============================================================================
// Simulated Sensor
// =============================================================================

#[test]
fn test_read_mock() {
    let dir = TempDir::new().unwrap();
    let output = run_smartzipper(dir.path(), &["read", "--mock"]);

    assert!(output.status.success(), "Read should succeed");
    assert!(stdout(&output).contains("Zipper Closed"));
}

#[test]
fn test_read_mock_json() {
    let dir = TempDir::new().unwrap();
    let output = run_smartzipper(dir.path(), &["read", "--mock", "--json"]);

    assert!(output.status.success(), "Read should succeed");
    let json: serde_json::Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(json["type"], "reading");
    assert_eq!(json["raw"], "1");
    assert_eq!(json["value"], "closed");
}

#[test]
fn test_test_alert() {
    let dir = TempDir::new().unwrap();
    let output = run_smartzipper(dir.path(), &["test-alert"]);

    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.starts_with('\x07'), "Alert should ring the bell");
    assert!(stdout.contains("ZIPPER ALERT"));
}

#[test]
fn test_monitor_mock_json_script() {
    let dir = TempDir::new().unwrap();
    let mut child = command(dir.path(), &["monitor", "--mock", "--json"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn smartzipper");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"test\nstatus\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "Monitor should exit cleanly");
    for line in stdout(&output).lines() {
        let value: serde_json::Value = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("not JSON ({e}): {line}"));
        assert!(value.is_object());
    }
}

// =============================================================================
// Hardware Tests
// =============================================================================

#[test]
#[ignore = "requires BLE hardware"]
fn test_read_hardware() {
    let dir = TempDir::new().unwrap();
    let mut cmd = command(dir.path(), &["read"]);
    if let Ok(device) = std::env::var("SMARTZIPPER_DEVICE") {
        cmd.env("SMARTZIPPER_DEVICE", device);
    }
    let output = cmd.output().expect("Failed to run smartzipper binary");

    println!("{}", stdout(&output));
    assert!(output.status.success(), "Read should succeed");
}
