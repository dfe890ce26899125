// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! trickle-cli: command-line view of the sync engine's decisions.
//!
//! Every command is a thin adapter over `trickle-core`: it builds the same
//! inputs the engine would see and prints what the engine decides.

mod cli;
mod commands;

pub mod error;
pub mod logging;

pub use cli::{Cli, Command, KindArg, LinkArg, OutputFormat, TierArg};
pub use error::{Error, Result};

/// Runs one parsed command.
pub fn run(cli: Cli) -> Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Strategy { bandwidth, transport, metered, offline, output } => {
            commands::strategy::run(&config, bandwidth, transport, metered, offline, output)
        }
        Command::Compress { file, kind, tier, out, output } => {
            commands::compress::run(&config, &file, kind, tier, out.as_deref(), output)
        }
        Command::Classify { status, body, output } => {
            commands::classify::run(status, body.as_deref(), output)
        }
        Command::Config => commands::config::run(&config),
    }
}
