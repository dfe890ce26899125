// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Configuration is read from a TOML file. Every key is optional; missing
//! keys take the defaults below:
//!
//! ```toml
//! max_retries = 3
//! base_delay_ms = 1000
//! max_delay_ms = 60000
//! max_pending = 500
//! compression_threshold_bytes = 1024
//! thumbnail_size = 160
//! ownership_fields = ["owner_id", "ownerId"]
//! journal_path = "/var/lib/app/sync.jsonl"
//!
//! [thresholds]
//! excellent_kbps = 5000
//! good_kbps = 2000
//! fair_kbps = 500
//! poor_kbps = 100
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::QualityThresholds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Retryable failures tolerated before an operation fails terminally.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Maximum number of non-terminal operations held in the queue.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    /// Payloads smaller than this are sent unmodified.
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,
    /// Bounding box edge of generated image thumbnails, in pixels.
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
    #[serde(default)]
    pub thresholds: QualityThresholds,
    /// Top-level payload fields whose change marks an ownership conflict.
    #[serde(default = "default_ownership_fields")]
    pub ownership_fields: Vec<String>,
    /// JSONL file backing the pending queue. In-memory only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_pending() -> usize {
    500
}

fn default_compression_threshold_bytes() -> usize {
    1024
}

fn default_thumbnail_size() -> u32 {
    160
}

fn default_ownership_fields() -> Vec<String> {
    vec!["owner_id".to_string(), "ownerId".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_pending: default_max_pending(),
            compression_threshold_bytes: default_compression_threshold_bytes(),
            thumbnail_size: default_thumbnail_size(),
            thresholds: QualityThresholds::default(),
            ownership_fields: default_ownership_fields(),
            journal_path: None,
        }
    }
}

impl EngineConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        EngineConfig::from_toml_str(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.max_pending == 0 {
            return Err(ConfigError::Invalid("max_pending must be at least 1".into()));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        if self.thumbnail_size == 0 {
            return Err(ConfigError::Invalid("thumbnail_size must be positive".into()));
        }
        self.thresholds.validate().map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
