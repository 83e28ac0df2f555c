//! CLI-only smoke tests that don't require a container runtime.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn smoke_cli_help_lists_all_verbs() {
    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("down"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn smoke_cli_up_help_describes_force_and_quiet() {
    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.arg("up")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--quiet"));
}

#[test]
fn smoke_cli_rejects_unknown_runtime_override() {
    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.arg("--runtime").arg("colima").arg("status").assert().failure();
}
