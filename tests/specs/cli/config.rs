// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Specs for `trickle config` and config loading shared by every command.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use yare::parameterized;

fn trickle() -> Command {
    cargo_bin_cmd!("trickle")
}

fn write_config(temp: &TempDir, content: &str) -> std::path::PathBuf {
    let path = temp.path().join("engine.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn prints_defaults() {
    trickle()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_retries = 3"))
        .stdout(predicate::str::contains("base_delay_ms = 1000"))
        .stdout(predicate::str::contains("[thresholds]"))
        .stdout(predicate::str::contains("journal_path").not());
}

#[test]
fn file_values_override_defaults() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "max_retries = 7\njournal_path = \"queue.jsonl\"\n");
    trickle()
        .args(["config", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("max_retries = 7"))
        .stdout(predicate::str::contains("journal_path = \"queue.jsonl\""))
        .stdout(predicate::str::contains("max_pending = 500"));
}

#[parameterized(
    zero_retries = { "max_retries = 0\n", "max_retries must be at least 1" },
    zero_pending = { "max_pending = 0\n", "max_pending must be at least 1" },
    unknown_field = { "retries = 3\n", "unknown field" },
    bad_type = { "max_retries = \"three\"\n", "invalid config" },
)]
fn invalid_config_fails(content: &str, message: &str) {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, content);
    trickle()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error: "))
        .stderr(predicate::str::contains(message));
}

#[test]
fn missing_config_file_fails() {
    let temp = TempDir::new().unwrap();
    trickle()
        .args(["strategy", "--config"])
        .arg(temp.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read config"));
}
