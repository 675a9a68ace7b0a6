//! Exit status of the `iob` binary

use std::process::Command;

fn iob() -> Command {
    Command::new(env!("CARGO_BIN_EXE_iob"))
}

#[test]
fn test_verify_mismatch_exits_with_corruption_status() {
    // /dev/zero accepts writes and reads back zeros, so verification must fail
    let output = iob()
        .args(["-V", "-b", "4k", "-S", "64k", "-n", "2", "/dev/zero"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("data corruption"), "stderr: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_clean_run_exits_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("clean.dat");
    std::fs::write(&path, b"").unwrap();

    let output = iob()
        .args(["-V", "-b", "4k", "-S", "64k", "-n", "2", "--output", "json"])
        .arg(&path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["targets"][0]["writes"], 16);
}

#[test]
fn test_configuration_error_exits_one() {
    let output = iob().args(["-E", "libaio", "/dev/null"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("libaio"));
}
