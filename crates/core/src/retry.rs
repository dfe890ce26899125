// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Retry budget and exponential backoff.

use std::time::Duration;

use crate::config::EngineConfig;

/// Outcome of recording one more retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the delay.
    Retry(Duration),
    /// The retry budget is spent.
    Exhausted,
}

/// Exponential backoff with a cap: `base * 2^retry_count`, never above `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        RetryPolicy { max_retries, base_delay, max_delay }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Backoff delay before the attempt following `retry_count` failures.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Decides what happens once `retry_count` (already incremented for the
    /// failure just observed) is known.
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retries {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry(self.delay_for(retry_count))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
