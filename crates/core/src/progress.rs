// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Progress reporting for queued operations.

use std::time::Duration;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::op::{OperationId, OperationState};

/// A step in an operation's life, as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Compressing,
    Sending,
    Resolving,
    Committing,
    Succeeded,
    RetryScheduled { attempt: u32, delay: Duration },
    Failed(ErrorKind),
    Cancelled,
}

impl Stage {
    /// Operation state corresponding to this stage.
    pub fn state(&self) -> OperationState {
        match self {
            Stage::Queued | Stage::RetryScheduled { .. } => OperationState::Queued,
            Stage::Compressing | Stage::Sending | Stage::Committing => OperationState::InFlight,
            Stage::Resolving => OperationState::ConflictPending,
            Stage::Succeeded => OperationState::Succeeded,
            Stage::Failed(kind) => OperationState::Failed(*kind),
            Stage::Cancelled => OperationState::Cancelled,
        }
    }
}

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub operation_id: OperationId,
    pub percent: u8,
    pub message: String,
    pub state: OperationState,
}

/// Maps stages to percentages and messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressCalculator;

impl ProgressCalculator {
    pub fn new() -> Self {
        ProgressCalculator
    }

    pub fn percent(&self, stage: &Stage) -> u8 {
        match stage {
            Stage::Queued | Stage::RetryScheduled { .. } => 0,
            Stage::Compressing => 10,
            Stage::Sending => 30,
            Stage::Resolving => 60,
            Stage::Committing => 90,
            Stage::Succeeded | Stage::Failed(_) | Stage::Cancelled => 100,
        }
    }

    pub fn message(&self, stage: &Stage) -> String {
        match stage {
            Stage::Queued => "waiting to sync".to_string(),
            Stage::Compressing => "preparing data".to_string(),
            Stage::Sending => "sending".to_string(),
            Stage::Resolving => "resolving conflict".to_string(),
            Stage::Committing => "saving".to_string(),
            Stage::Succeeded => "synced".to_string(),
            Stage::RetryScheduled { attempt, delay } => {
                format!("retry {attempt} in {}s", delay.as_secs_f32().ceil() as u64)
            }
            Stage::Failed(kind) => format!("failed: {kind}"),
            Stage::Cancelled => "cancelled".to_string(),
        }
    }

    pub fn event(&self, operation_id: OperationId, stage: Stage) -> ProgressEvent {
        ProgressEvent {
            operation_id,
            percent: self.percent(&stage),
            message: self.message(&stage),
            state: stage.state(),
        }
    }

    /// Overall completion of a batch, in percent.
    pub fn batch_percent(&self, completed: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        ((completed.min(total) * 100) / total) as u8
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
