//! Integration tests for the `down` command

use assert_cmd::Command;
use tempfile::TempDir;

#[test]
fn down_without_state_is_a_harmless_no_op() {
    let temp_dir = TempDir::new().unwrap();

    let mut cmd = Command::cargo_bin("alca").unwrap();
    let assert = cmd.current_dir(&temp_dir).arg("down").assert().success();

    let output = assert.get_output();
    assert!(output.stdout.is_empty());
}
