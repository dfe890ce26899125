// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Maps a network sample to a sync plan.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::network::{NetworkSample, QualityThresholds, QualityTier};
use crate::op::Priority;

/// How much traffic the coordinator is allowed to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    Aggressive,
    Conservative,
    CriticalOnly,
    Minimal,
    OfflineOnly,
}

impl SyncStrategy {
    /// One step more conservative. Never steps into `OfflineOnly`.
    pub fn more_conservative(self) -> Self {
        match self {
            SyncStrategy::Aggressive => SyncStrategy::Conservative,
            SyncStrategy::Conservative => SyncStrategy::CriticalOnly,
            SyncStrategy::CriticalOnly | SyncStrategy::Minimal => SyncStrategy::Minimal,
            SyncStrategy::OfflineOnly => SyncStrategy::OfflineOnly,
        }
    }

    /// Returns true if operations of `priority` may be dispatched.
    pub fn admits(self, priority: Priority) -> bool {
        match self {
            SyncStrategy::Aggressive | SyncStrategy::Conservative => true,
            SyncStrategy::CriticalOnly => priority >= Priority::High,
            SyncStrategy::Minimal => priority == Priority::Urgent,
            SyncStrategy::OfflineOnly => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStrategy::Aggressive => "aggressive",
            SyncStrategy::Conservative => "conservative",
            SyncStrategy::CriticalOnly => "critical_only",
            SyncStrategy::Minimal => "minimal",
            SyncStrategy::OfflineOnly => "offline_only",
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compression settings for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionProfile {
    pub tier: QualityTier,
    pub compress_text: bool,
    pub create_thumbnails: bool,
    pub aggressive: bool,
}

impl CompressionProfile {
    pub fn for_tier(tier: QualityTier) -> Self {
        let (compress_text, create_thumbnails, aggressive) = match tier {
            QualityTier::Excellent => (false, false, false),
            QualityTier::Good => (true, false, false),
            QualityTier::Fair => (true, true, false),
            QualityTier::Poor | QualityTier::VeryPoor | QualityTier::Unknown => (true, true, true),
        };
        CompressionProfile { tier, compress_text, create_thumbnails, aggressive }
    }
}

/// Everything the coordinator needs to run one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub strategy: SyncStrategy,
    pub tier: QualityTier,
    pub compression: CompressionProfile,
    pub batch_size: usize,
    pub request_timeout_ms: u64,
    pub preload: bool,
    pub realtime: bool,
}

impl SyncPlan {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Plan used while disconnected: nothing is dispatched.
    pub fn offline() -> Self {
        SyncPlan {
            strategy: SyncStrategy::OfflineOnly,
            batch_size: 0,
            ..SyncPlan::for_tier(QualityTier::Unknown)
        }
    }

    /// Base plan for an unmetered link of the given tier.
    pub fn for_tier(tier: QualityTier) -> Self {
        let (strategy, batch_size, request_timeout_ms, preload, realtime) = match tier {
            QualityTier::Excellent => (SyncStrategy::Aggressive, 50, 10_000, true, true),
            QualityTier::Good => (SyncStrategy::Aggressive, 25, 15_000, true, false),
            QualityTier::Fair => (SyncStrategy::Conservative, 10, 30_000, false, false),
            QualityTier::Poor => (SyncStrategy::CriticalOnly, 5, 45_000, false, false),
            QualityTier::VeryPoor => (SyncStrategy::Minimal, 2, 60_000, false, false),
            QualityTier::Unknown => (SyncStrategy::Minimal, 1, 60_000, false, false),
        };
        SyncPlan {
            strategy,
            tier,
            compression: CompressionProfile::for_tier(tier),
            batch_size,
            request_timeout_ms,
            preload,
            realtime,
        }
    }

    /// Tightens the plan for a metered link.
    fn metered(mut self) -> Self {
        self.strategy = self.strategy.more_conservative();
        self.preload = false;
        self.realtime = false;
        self.compression.compress_text = true;
        self.batch_size = (self.batch_size / 2).max(1);
        self
    }
}

/// Chooses a [`SyncPlan`] for each network sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategySelector {
    thresholds: QualityThresholds,
}

impl StrategySelector {
    pub fn new(thresholds: QualityThresholds) -> Self {
        StrategySelector { thresholds }
    }

    pub fn select(&self, sample: &NetworkSample) -> SyncPlan {
        if !sample.connected {
            return SyncPlan::offline();
        }
        let plan = SyncPlan::for_tier(sample.tier(&self.thresholds));
        if sample.metered {
            plan.metered()
        } else {
            plan
        }
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
