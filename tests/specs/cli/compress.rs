// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Specs for `trickle compress`.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use yare::parameterized;

fn trickle() -> Command {
    cargo_bin_cmd!("trickle")
}

fn field_notes(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("notes.txt");
    let text = "north field: corn, 3 acres, irrigated on tuesdays\n".repeat(100);
    std::fs::write(&path, text).unwrap();
    path
}

fn report(args: &[&str], file: &PathBuf) -> serde_json::Value {
    let output = trickle()
        .arg("compress")
        .arg(file)
        .args(args)
        .args(["-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[parameterized(
    good = { "good", "zstd" },
    fair = { "fair", "zstd" },
    very_poor = { "very-poor", "zstd" },
    excellent = { "excellent", "identity" },
)]
fn text_encoding_by_tier(tier: &str, encoding: &str) {
    let temp = TempDir::new().unwrap();
    let file = field_notes(&temp);
    let json = report(&["--tier", tier], &file);
    assert_eq!(json["kind"], "text");
    assert_eq!(json["encoding"], encoding);
}

#[test]
fn compressed_bytes_are_written() {
    let temp = TempDir::new().unwrap();
    let file = field_notes(&temp);
    let out = temp.path().join("notes.zst");
    trickle()
        .arg("compress")
        .arg(&file)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("compressed:").and(predicate::str::contains("(zstd)")));
    let original = std::fs::metadata(&file).unwrap().len();
    let written = std::fs::metadata(&out).unwrap().len();
    assert!(written < original);
}

#[test]
fn small_file_passes_through() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plot.json");
    std::fs::write(&file, r#"{"id": "p-1"}"#).unwrap();
    let json = report(&[], &file);
    assert_eq!(json["kind"], "json");
    assert_eq!(json["encoding"], "identity");
    assert_eq!(json["original_size"], json["compressed_size"]);
}

#[test]
fn invalid_json_fails() {
    let temp = TempDir::new().unwrap();
    let file = field_notes(&temp);
    trickle()
        .arg("compress")
        .arg(&file)
        .args(["--kind", "json"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error: data_processing.compression_failed"));
}

#[test]
fn missing_file_fails() {
    let temp = TempDir::new().unwrap();
    trickle()
        .arg("compress")
        .arg(temp.path().join("absent.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}
