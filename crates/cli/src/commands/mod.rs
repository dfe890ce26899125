// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod classify;
pub mod compress;
pub mod config;
pub mod strategy;

use std::path::Path;

use serde::Serialize;
use tracing::debug;
use trickle_core::EngineConfig;

use crate::cli::OutputFormat;
use crate::error::Result;

/// Loads the engine configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading engine config");
            Ok(EngineConfig::load(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Renders a report as text or pretty JSON.
pub fn render<T: Serialize>(
    report: &T,
    output: OutputFormat,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    match output {
        OutputFormat::Text => Ok(text(report)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

pub(crate) fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
