// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use trickle_core::{ContentType, QualityTier, TransportType};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Link type as accepted on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LinkArg {
    #[default]
    Wifi,
    Ethernet,
    #[value(name = "2g")]
    Cellular2g,
    #[value(name = "3g")]
    Cellular3g,
    #[value(name = "4g")]
    Cellular4g,
    #[value(name = "5g")]
    Cellular5g,
    Unknown,
}

impl From<LinkArg> for TransportType {
    fn from(arg: LinkArg) -> Self {
        match arg {
            LinkArg::Wifi => TransportType::Wifi,
            LinkArg::Ethernet => TransportType::Ethernet,
            LinkArg::Cellular2g => TransportType::Cellular2G,
            LinkArg::Cellular3g => TransportType::Cellular3G,
            LinkArg::Cellular4g => TransportType::Cellular4G,
            LinkArg::Cellular5g => TransportType::Cellular5G,
            LinkArg::Unknown => TransportType::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Text,
    Json,
    Image,
}

impl From<KindArg> for ContentType {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Text => ContentType::Text,
            KindArg::Json => ContentType::Json,
            KindArg::Image => ContentType::Image,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
    VeryPoor,
    Unknown,
}

impl From<TierArg> for QualityTier {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Excellent => QualityTier::Excellent,
            TierArg::Good => QualityTier::Good,
            TierArg::Fair => QualityTier::Fair,
            TierArg::Poor => QualityTier::Poor,
            TierArg::VeryPoor => QualityTier::VeryPoor,
            TierArg::Unknown => QualityTier::Unknown,
        }
    }
}

#[derive(Parser)]
#[command(name = "trickle", version)]
#[command(about = "Inspect the decisions of the trickle offline-first sync engine")]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the quality tier and sync plan for a network sample
    #[command(after_help = "Examples:\n  \
        trickle strategy --bandwidth 3000 --metered       Metered 3 Mbps link\n  \
        trickle strategy --bandwidth 800 --transport 3g   Slow cellular link\n  \
        trickle strategy --offline                       No connectivity")]
    Strategy {
        /// Estimated downstream bandwidth in kbps
        #[arg(long, short)]
        bandwidth: Option<u32>,

        /// Link type
        #[arg(long, short, value_enum, default_value_t)]
        transport: LinkArg,

        /// The link is metered
        #[arg(long)]
        metered: bool,

        /// No connectivity
        #[arg(long, conflicts_with_all = ["bandwidth", "metered"])]
        offline: bool,

        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Compress a file the way it would be sent at a given quality tier
    Compress {
        /// File to compress
        file: PathBuf,

        /// Payload kind (inferred from the file extension by default)
        #[arg(long, short, value_enum)]
        kind: Option<KindArg>,

        /// Quality tier to compress for
        #[arg(long, value_enum, default_value_t)]
        tier: TierArg,

        /// Write the compressed bytes to this file
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Classify an HTTP failure
    Classify {
        /// HTTP status code
        #[arg(long, short)]
        status: u16,

        /// Response body
        #[arg(long, short)]
        body: Option<String>,

        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Print the effective engine configuration
    Config,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
