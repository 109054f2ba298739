//! CLI surface tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_command_set() {
    Command::cargo_bin("liverun")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("exec"));
}

#[test]
fn exec_succeeds_for_a_passing_batch() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("liverun")
        .unwrap()
        .current_dir(dir.path())
        .args(["exec", "echo hi", "true"])
        .assert()
        .success();
}

#[test]
fn exec_fails_when_a_command_fails() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("liverun")
        .unwrap()
        .current_dir(dir.path())
        .args(["exec", "false", "echo never"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exited with code 1"));
}

#[test]
fn run_with_no_projects_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("liverun")
        .unwrap()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no projects configured"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("liverun.toml");
    std::fs::write(&config, "not valid = = toml").unwrap();
    Command::cargo_bin("liverun")
        .unwrap()
        .current_dir(dir.path())
        .args(["-c", config.to_str().unwrap(), "run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
