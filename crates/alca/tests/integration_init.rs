//! Integration tests for the `init` command

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn init_writes_default_config() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.current_dir(&temp_dir).arg("init").assert().success();

    let contents = fs::read_to_string(temp_dir.path().join("alca.toml")).unwrap();
    assert!(contents.contains("image"));
    assert!(contents.contains("workdir"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("alca.toml"), "image = \"debian:12\"\n").unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    cmd.current_dir(&temp_dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let contents = fs::read_to_string(temp_dir.path().join("alca.toml")).unwrap();
    assert_eq!(contents, "image = \"debian:12\"\n");
}
