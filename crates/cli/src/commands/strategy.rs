// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;
use serde::Serialize;
use trickle_core::{EngineConfig, NetworkSample, StrategySelector, SyncPlan};

use super::{render, yes_no};
use crate::cli::{LinkArg, OutputFormat};
use crate::error::Result;

#[derive(Debug, Serialize)]
pub struct StrategyReport {
    pub sample: NetworkSample,
    pub plan: SyncPlan,
}

/// Execute the strategy command.
pub fn run(
    config: &EngineConfig,
    bandwidth: Option<u32>,
    transport: LinkArg,
    metered: bool,
    offline: bool,
    output: OutputFormat,
) -> Result<()> {
    let sample = if offline {
        NetworkSample::disconnected(Utc::now())
    } else {
        NetworkSample::connected(transport.into(), bandwidth, metered)
    };
    let report = evaluate(config, sample);
    println!("{}", render(&report, output, format_text)?);
    Ok(())
}

pub fn evaluate(config: &EngineConfig, sample: NetworkSample) -> StrategyReport {
    let plan = StrategySelector::new(config.thresholds).select(&sample);
    StrategyReport { sample, plan }
}

pub fn format_text(report: &StrategyReport) -> String {
    let plan = &report.plan;
    let link = if report.sample.connected {
        let bandwidth = report
            .sample
            .bandwidth_kbps
            .map_or_else(|| "unknown bandwidth".to_string(), |kbps| format!("{kbps} kbps"));
        let metered = if report.sample.metered { ", metered" } else { "" };
        format!("{} ({bandwidth}{metered})", report.sample.transport)
    } else {
        "offline".to_string()
    };
    [
        format!("link:          {link}"),
        format!("tier:          {}", plan.tier),
        format!("strategy:      {}", plan.strategy),
        format!("batch size:    {}", plan.batch_size),
        format!("timeout:       {}ms", plan.request_timeout_ms),
        format!("compress text: {}", yes_no(plan.compression.compress_text)),
        format!("thumbnails:    {}", yes_no(plan.compression.create_thumbnails)),
        format!("preload:       {}", yes_no(plan.preload)),
        format!("realtime:      {}", yes_no(plan.realtime)),
    ]
    .join("\n")
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
