// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use trickle_core::EngineConfig;

use crate::error::Result;

/// Execute the config command: print the effective configuration as TOML.
pub fn run(config: &EngineConfig) -> Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
