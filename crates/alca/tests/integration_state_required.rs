//! Commands that read container state should fail clearly when a project
//! has never been brought up, rather than probing a runtime CLI.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn status_without_state_fails_with_actionable_message() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("alca up"));
}

#[test]
fn run_without_state_fails_with_actionable_message() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("run")
        .arg("echo")
        .arg("hi")
        .assert()
        .failure()
        .stderr(predicate::str::contains("alca up"));
}

#[test]
fn experimental_reload_without_state_fails_with_actionable_message() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("experimental")
        .arg("reload")
        .assert()
        .failure()
        .stderr(predicate::str::contains("alca up"));
}
