// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory queue of non-terminal operations.
//!
//! Entries are keyed by [`OperationId`], which is also their enqueue order.
//! Each entity is served strictly in enqueue order: only the oldest pending
//! operation of an entity is ever eligible for dispatch, so at most one
//! operation per entity is in flight at a time.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::warn;

use crate::error::{Result, SyncError, SyncOperationError};
use crate::op::{NewOperation, OperationId, OperationState, Priority, SyncOperation};

#[derive(Debug)]
struct Entry {
    op: SyncOperation,
    /// Earliest dispatch time after a retryable failure.
    not_before: Option<Instant>,
    cancel_requested: bool,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The operation was queued and has been removed.
    Removed(SyncOperation),
    /// The operation is in flight; its result will be discarded.
    Marked,
    NotFound,
}

/// Number of operations in each non-terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub queued: usize,
    pub in_flight: usize,
    pub conflict_pending: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.queued + self.in_flight + self.conflict_pending
    }
}

#[derive(Debug)]
pub struct OperationQueue {
    entries: BTreeMap<OperationId, Entry>,
    /// Idempotency keys of every entry.
    keys: HashMap<String, OperationId>,
    capacity: usize,
    next_id: u64,
}

impl OperationQueue {
    pub fn new(capacity: usize) -> Self {
        OperationQueue { entries: BTreeMap::new(), keys: HashMap::new(), capacity, next_id: 1 }
    }

    /// Rebuilds a queue from journaled operations.
    ///
    /// Operations that were in flight or awaiting conflict resolution are
    /// queued again. Terminal operations and repeated idempotency keys are
    /// dropped.
    pub fn restore(capacity: usize, ops: Vec<SyncOperation>) -> Self {
        let mut queue = OperationQueue::new(capacity);
        for mut op in ops {
            if op.state.is_terminal() {
                continue;
            }
            if queue.keys.contains_key(&op.idempotency_key) {
                warn!(id = %op.id, key = %op.idempotency_key, "dropping duplicate journal entry");
                continue;
            }
            op.state = OperationState::Queued;
            queue.next_id = queue.next_id.max(op.id.0 + 1);
            queue.keys.insert(op.idempotency_key.clone(), op.id);
            queue.entries.insert(op.id, Entry { op, not_before: None, cancel_requested: false });
        }
        if queue.entries.len() > capacity {
            warn!(restored = queue.entries.len(), capacity, "restored queue exceeds capacity");
        }
        queue
    }

    /// Adds a new operation.
    ///
    /// Fails with `AlreadyInProgress` if a pending operation shares the
    /// idempotency key, or `QueueFull` at capacity.
    pub fn push(&mut self, new: NewOperation, now: DateTime<Utc>) -> Result<SyncOperation> {
        if let Some(existing) = self.keys.get(&new.idempotency_key) {
            return Err(SyncError::new(
                SyncOperationError::AlreadyInProgress,
                format!("idempotency key '{}' is held by {existing}", new.idempotency_key),
            ));
        }
        if self.entries.len() >= self.capacity {
            return Err(SyncError::new(
                SyncOperationError::QueueFull,
                format!("queue holds {} pending operations", self.entries.len()),
            ));
        }
        let id = OperationId(self.next_id);
        self.next_id += 1;
        let op = SyncOperation::from_new(id, new, now);
        self.keys.insert(op.idempotency_key.clone(), id);
        self.entries.insert(id, Entry { op: op.clone(), not_before: None, cancel_requested: false });
        Ok(op)
    }

    /// Marks up to `limit` eligible operations in flight and returns them,
    /// highest priority first and oldest first within a priority.
    ///
    /// Only the oldest pending operation of each entity is eligible. A newer
    /// operation on that entity waits behind it whatever its priority, so an
    /// `Urgent` edit queued after a `Normal` one is held for as long as the
    /// strategy withholds `Normal` (under `CriticalOnly` or `Minimal`).
    pub fn take_batch(
        &mut self,
        limit: usize,
        admits: impl Fn(Priority) -> bool,
        now: Instant,
    ) -> Vec<SyncOperation> {
        let mut eligible: Vec<(Reverse<Priority>, OperationId)> = self
            .entity_heads()
            .filter(|e| e.op.state == OperationState::Queued && !e.cancel_requested)
            .filter(|e| !matches!(e.not_before, Some(t) if t > now))
            .filter(|e| admits(e.op.priority))
            .map(|e| (Reverse(e.op.priority), e.op.id))
            .collect();
        eligible.sort();
        eligible.truncate(limit);

        let mut batch = Vec::with_capacity(eligible.len());
        for (_, id) in eligible {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.op.state = OperationState::InFlight;
                entry.not_before = None;
                batch.push(entry.op.clone());
            }
        }
        batch
    }

    /// Earliest future time at which a currently delayed operation that the
    /// strategy admits becomes eligible.
    pub fn next_due(&self, admits: impl Fn(Priority) -> bool, now: Instant) -> Option<Instant> {
        self.entity_heads()
            .filter(|e| e.op.state == OperationState::Queued && admits(e.op.priority))
            .filter_map(|e| e.not_before)
            .filter(|t| *t > now)
            .min()
    }

    /// Oldest entry of each entity.
    fn entity_heads(&self) -> impl Iterator<Item = &Entry> {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();
        self.entries
            .values()
            .filter(move |e| seen.insert((e.op.entity_type.as_str(), e.op.entity_id.as_str())))
    }

    pub fn get(&self, id: OperationId) -> Option<&SyncOperation> {
        self.entries.get(&id).map(|e| &e.op)
    }

    pub fn set_state(&mut self, id: OperationId, state: OperationState) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.op.state = state;
                true
            }
            None => false,
        }
    }

    pub fn is_cancel_requested(&self, id: OperationId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.cancel_requested)
    }

    /// Counts one more retryable failure. Returns the new retry count.
    pub fn bump_retry(&mut self, id: OperationId) -> Option<u32> {
        let entry = self.entries.get_mut(&id)?;
        entry.op.retry_count += 1;
        Some(entry.op.retry_count)
    }

    /// Queues an operation again, not to be dispatched before `not_before`.
    pub fn reschedule(&mut self, id: OperationId, not_before: Option<Instant>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.op.state = OperationState::Queued;
            entry.not_before = not_before;
        }
    }

    /// Moves newer operations on the same entity onto `version`, which the
    /// server has just committed for `committed`. Their diffs are then taken
    /// against the committed state instead of the base they were made on.
    /// Returns how many operations were rebased.
    pub fn rebase(&mut self, committed: &SyncOperation, version: u64) -> usize {
        let mut rebased = 0;
        for entry in self.entries.values_mut() {
            let op = &mut entry.op;
            if op.id > committed.id
                && op.entity_type == committed.entity_type
                && op.entity_id == committed.entity_id
                && op.base_version < version
            {
                op.base_version = version;
                rebased += 1;
            }
        }
        rebased
    }

    /// Removes an operation, freeing its idempotency key.
    pub fn remove(&mut self, id: OperationId) -> Option<SyncOperation> {
        let entry = self.entries.remove(&id)?;
        self.keys.remove(&entry.op.idempotency_key);
        Some(entry.op)
    }

    pub fn cancel(&mut self, id: OperationId) -> CancelOutcome {
        let Some(state) = self.entries.get(&id).map(|e| e.op.state) else {
            return CancelOutcome::NotFound;
        };
        if state == OperationState::Queued {
            return self.remove(id).map_or(CancelOutcome::NotFound, CancelOutcome::Removed);
        }
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.cancel_requested = true;
        }
        CancelOutcome::Marked
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for entry in self.entries.values() {
            match entry.op.state {
                OperationState::Queued => counts.queued += 1,
                OperationState::InFlight => counts.in_flight += 1,
                OperationState::ConflictPending => counts.conflict_pending += 1,
                _ => {}
            }
        }
        counts
    }

    /// All entries in enqueue order.
    pub fn snapshot(&self) -> Vec<SyncOperation> {
        self.entries.values().map(|e| e.op.clone()).collect()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
