//! Integration tests for the `up` command's configuration handling

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn up_fails_without_configuration() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no configuration found"));
}

#[test]
fn up_fails_on_malformed_configuration() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("alca.toml"), "image = 5\n").unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed configuration"));
}
