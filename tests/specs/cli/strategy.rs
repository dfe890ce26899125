// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Specs for `trickle strategy`: network samples in, sync plans out.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use yare::parameterized;

fn trickle() -> Command {
    cargo_bin_cmd!("trickle")
}

fn plan_json(args: &[&str]) -> serde_json::Value {
    let output = trickle()
        .arg("strategy")
        .args(args)
        .args(["-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[parameterized(
    excellent = { "8000", "excellent", "aggressive" },
    good = { "3000", "good", "aggressive" },
    fair = { "800", "fair", "conservative" },
    poor = { "150", "poor", "critical_only" },
    very_poor = { "20", "very_poor", "minimal" },
)]
fn bandwidth_selects_tier_and_strategy(bandwidth: &str, tier: &str, strategy: &str) {
    let json = plan_json(&["--bandwidth", bandwidth]);
    assert_eq!(json["plan"]["tier"], tier);
    assert_eq!(json["plan"]["strategy"], strategy);
}

#[test]
fn metered_link_steps_down() {
    let json = plan_json(&["--bandwidth", "3000", "--metered"]);
    assert_eq!(json["plan"]["strategy"], "conservative");
    assert_eq!(json["plan"]["preload"], false);
    assert_eq!(json["plan"]["realtime"], false);
}

#[test]
fn unknown_bandwidth_is_minimal() {
    let json = plan_json(&["--transport", "unknown"]);
    assert_eq!(json["plan"]["tier"], "unknown");
    assert_eq!(json["plan"]["strategy"], "minimal");
    assert_eq!(json["plan"]["batch_size"], 1);
}

#[test]
fn offline_text_output() {
    trickle()
        .args(["strategy", "--offline"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("link:          offline"))
        .stdout(predicate::str::contains("strategy:      offline_only"));
}

#[test]
fn offline_rejects_bandwidth() {
    trickle()
        .args(["strategy", "--offline", "--bandwidth", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn config_thresholds_apply() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("engine.toml");
    std::fs::write(
        &path,
        "[thresholds]\nexcellent_kbps = 10000\ngood_kbps = 4000\nfair_kbps = 500\npoor_kbps = 100\n",
    )
    .unwrap();
    trickle()
        .args(["strategy", "--bandwidth", "3000", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("tier:          fair"));
}
