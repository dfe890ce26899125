// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Specs for `trickle classify`.

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

#[parameterized(
    server_error = { "503", "network.server_error", true },
    rate_limited = { "429", "network.rate_limited", true },
    timeout = { "504", "network.timeout", true },
    forbidden = { "403", "network.forbidden", false },
    bad_request = { "400", "network.bad_request", false },
    too_large = { "413", "media.file_too_large", false },
)]
fn status_codes(status: &str, code: &str, retryable: bool) {
    let output = trickle().args(["classify", "--status", status, "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code"], code);
    assert_eq!(json["retryable"], retryable);
}

#[test]
fn token_expired_body_is_auth() {
    trickle()
        .args(["classify", "-s", "401", "-b", r#"{"code":"token_expired"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind:      auth.token_expired"))
        .stdout(predicate::str::contains("retryable: yes"));
}

#[test]
fn unmapped_status_is_unknown() {
    trickle()
        .args(["classify", "-s", "302"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind:      unknown.unknown"))
        .stdout(predicate::str::contains("retryable: no"));
}

#[test]
fn status_is_required() {
    trickle().arg("classify").assert().failure();
}
