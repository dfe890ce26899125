// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync coordinator: owns the operation queue and drives it to completion.
//!
//! One dispatch cycle runs at a time. A cycle:
//! 1. Reads the latest network sample and selects a plan
//! 2. Takes up to `batch_size` admitted operations from the queue
//! 3. Sends each one as its own task (compression on the blocking pool)
//! 4. Settles results in dispatch order: commit, retry, or fail
//!
//! The queue lock is never held across a network call or a journal write.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::classify::{ErrorClassifier, Failure};
use crate::compress::{CompressedData, Compressor};
use crate::config::EngineConfig;
use crate::conflict::{
    ConflictHandler, ConflictKind, ConflictResolver, DeferConflicts, RemoteState, Resolution,
    ResolutionDecision,
};
use crate::error::{
    AuthError, DataProcessingError, ErrorKind, Result, SyncError, SyncOperationError,
};
use crate::journal::Journal;
use crate::network::{NetworkSample, QualityTier};
use crate::op::{ContentType, NewOperation, OperationId, OperationKind, OperationState, SyncOperation};
use crate::progress::{ProgressCalculator, ProgressEvent, Stage};
use crate::queue::{CancelOutcome, OperationQueue, StateCounts};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::storage::{CredentialRefresher, Storage};
use crate::strategy::{StrategySelector, SyncPlan, SyncStrategy};
use crate::transport::{
    ConflictNotice, RemoteEntity, Transport, TransportError, TransportRequest, TransportResponse,
    WriteAck,
};

const PROGRESS_CAPACITY: usize = 256;
const FINISHED_HISTORY: usize = 1024;
/// Resubmissions after a conflict before an operation is given up as
/// unresolvable.
const MAX_CONFLICT_ROUNDS: u32 = 3;

/// Snapshot of the queue and the plan currently in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub counts: StateCounts,
    /// Non-terminal operations of every state.
    pub pending: usize,
    pub strategy: SyncStrategy,
    pub tier: QualityTier,
    pub connected: bool,
}

/// Summary of one dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub strategy: SyncStrategy,
    pub tier: QualityTier,
    pub dispatched: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub conflicts_surfaced: usize,
    pub auto_merged: usize,
}

impl CycleReport {
    fn new(plan: &SyncPlan) -> Self {
        CycleReport {
            strategy: plan.strategy,
            tier: plan.tier,
            dispatched: 0,
            succeeded: 0,
            retried: 0,
            failed: 0,
            cancelled: 0,
            conflicts_surfaced: 0,
            auto_merged: 0,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.strategy == SyncStrategy::OfflineOnly
    }
}

/// State to write locally once the server has accepted a change.
/// `payload: None` deletes the entity.
#[derive(Debug)]
struct Commit {
    version: u64,
    payload: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct ConflictTally {
    auto_merged: bool,
    surfaced: bool,
}

struct Dispatched {
    result: Result<Commit>,
    tally: ConflictTally,
}

enum AfterConflict {
    Resubmit {
        payload: Option<Vec<u8>>,
        content_type: ContentType,
        expected_version: u64,
        base: Option<Value>,
    },
    Commit(Commit),
}

struct Inner<T, S> {
    transport: T,
    storage: S,
    compressor: Compressor,
    classifier: ErrorClassifier,
    resolver: ConflictResolver,
    selector: StrategySelector,
    retry: RetryPolicy,
    progress: ProgressCalculator,
    conflicts: Arc<dyn ConflictHandler>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
    network: watch::Receiver<NetworkSample>,
    queue: Mutex<OperationQueue>,
    /// Lock order: journal before queue.
    journal: Option<Mutex<Journal>>,
    finished: Mutex<VecDeque<(OperationId, OperationState)>>,
    events: broadcast::Sender<ProgressEvent>,
    wake: Notify,
    cycle: tokio::sync::Mutex<()>,
}

/// Builds a [`SyncCoordinator`].
pub struct CoordinatorBuilder<T, S> {
    config: EngineConfig,
    transport: T,
    storage: S,
    network: watch::Receiver<NetworkSample>,
    conflicts: Arc<dyn ConflictHandler>,
    refresher: Option<Arc<dyn CredentialRefresher>>,
}

impl<T, S> CoordinatorBuilder<T, S>
where
    T: Transport + 'static,
    S: Storage + 'static,
{
    pub fn new(
        config: EngineConfig,
        transport: T,
        storage: S,
        network: watch::Receiver<NetworkSample>,
    ) -> Self {
        CoordinatorBuilder {
            config,
            transport,
            storage,
            network,
            conflicts: Arc::new(DeferConflicts),
            refresher: None,
        }
    }

    /// Sets the callback for conflicts that cannot be merged automatically.
    pub fn conflict_handler(mut self, handler: impl ConflictHandler + 'static) -> Self {
        self.conflicts = Arc::new(handler);
        self
    }

    pub fn credential_refresher(mut self, refresher: impl CredentialRefresher + 'static) -> Self {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    /// Validates the configuration and restores any journaled operations.
    pub fn build(self) -> Result<SyncCoordinator<T, S>> {
        let config = self.config;
        config.validate().map_err(|e| {
            SyncError::new(SyncOperationError::InvalidOperation, "invalid engine configuration")
                .with_cause(e)
        })?;

        let (journal, queue) = match &config.journal_path {
            Some(path) => {
                let journal = Journal::open(path)?;
                let queue = OperationQueue::restore(config.max_pending, journal.load()?);
                journal.rewrite(&queue.snapshot())?;
                if !queue.is_empty() {
                    info!(path = %path.display(), restored = queue.len(), "restored pending operations");
                }
                (Some(Mutex::new(journal)), queue)
            }
            None => (None, OperationQueue::new(config.max_pending)),
        };

        let (events, _) = broadcast::channel(PROGRESS_CAPACITY);
        let inner = Inner {
            transport: self.transport,
            storage: self.storage,
            compressor: Compressor::from_config(&config),
            classifier: ErrorClassifier::new(),
            resolver: ConflictResolver::from_config(&config),
            selector: StrategySelector::new(config.thresholds),
            retry: RetryPolicy::from_config(&config),
            progress: ProgressCalculator::new(),
            conflicts: self.conflicts,
            refresher: self.refresher,
            network: self.network,
            queue: Mutex::new(queue),
            journal,
            finished: Mutex::new(VecDeque::new()),
            events,
            wake: Notify::new(),
            cycle: tokio::sync::Mutex::new(()),
        };
        Ok(SyncCoordinator { inner: Arc::new(inner) })
    }
}

/// Offline-first sync engine.
///
/// Cheap to clone; clones share the same queue.
pub struct SyncCoordinator<T, S> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for SyncCoordinator<T, S> {
    fn clone(&self) -> Self {
        SyncCoordinator { inner: Arc::clone(&self.inner) }
    }
}

impl<T, S> SyncCoordinator<T, S>
where
    T: Transport + 'static,
    S: Storage + 'static,
{
    /// Adds an operation to the queue and journals it.
    ///
    /// Fails with `AlreadyInProgress` if a pending operation holds the same
    /// idempotency key, `QueueFull` at capacity, or a database error if the
    /// journal cannot be written.
    pub fn enqueue(&self, new: NewOperation) -> Result<OperationId> {
        validate(&new)?;
        let op = match &self.inner.journal {
            Some(journal) => {
                let journal = journal.lock().unwrap_or_else(|e| e.into_inner());
                let op = self.queue().push(new, Utc::now())?;
                if let Err(e) = journal.append(&op) {
                    // A cycle may already have taken it; its result is then discarded.
                    self.queue().cancel(op.id);
                    return Err(e.into());
                }
                op
            }
            None => self.queue().push(new, Utc::now())?,
        };
        debug!(id = %op.id, entity = %op.entity_id, priority = %op.priority, "enqueued operation");
        self.emit(op.id, Stage::Queued);
        self.inner.wake.notify_one();
        Ok(op.id)
    }

    /// Cancels an operation.
    ///
    /// A queued operation is removed. An operation in flight finishes its
    /// request, but the result is discarded. Returns false if the operation
    /// is not pending.
    pub fn cancel(&self, id: OperationId) -> bool {
        let outcome = self.queue().cancel(id);
        match outcome {
            CancelOutcome::Removed(op) => {
                self.persist();
                info!(id = %op.id, "cancelled queued operation");
                self.record_finished(op.id, OperationState::Cancelled);
                self.emit(op.id, Stage::Cancelled);
                true
            }
            CancelOutcome::Marked => {
                info!(id = %id, "cancellation requested for in-flight operation");
                true
            }
            CancelOutcome::NotFound => false,
        }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> QueueStatus {
        let sample = self.inner.network.borrow().clone();
        let plan = self.inner.selector.select(&sample);
        let counts = self.queue().counts();
        QueueStatus {
            counts,
            pending: counts.total(),
            strategy: plan.strategy,
            tier: plan.tier,
            connected: sample.connected,
        }
    }

    /// Current state of a pending or recently finished operation.
    pub fn state_of(&self, id: OperationId) -> Option<OperationState> {
        if let Some(op) = self.queue().get(id) {
            return Some(op.state);
        }
        let finished = self.inner.finished.lock().unwrap_or_else(|e| e.into_inner());
        finished.iter().rev().find(|(fid, _)| *fid == id).map(|(_, state)| *state)
    }

    /// All pending operations in enqueue order.
    pub fn pending(&self) -> Vec<SyncOperation> {
        self.queue().snapshot()
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Runs one dispatch cycle and settles every result.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.inner.cycle.lock().await;
        let plan = self.current_plan();
        let mut report = CycleReport::new(&plan);
        if plan.strategy == SyncStrategy::OfflineOnly {
            debug!("offline, nothing dispatched");
            return report;
        }

        let batch =
            self.queue().take_batch(plan.batch_size, |p| plan.strategy.admits(p), Instant::now());
        if batch.is_empty() {
            return report;
        }
        report.dispatched = batch.len();
        debug!(strategy = %plan.strategy, count = batch.len(), "dispatching batch");

        let mut handles = Vec::with_capacity(batch.len());
        for op in batch {
            let this = self.clone();
            let id = op.id;
            let handle = tokio::spawn(async move {
                let mut tally = ConflictTally::default();
                let result = this.sync_one(&op, &plan, &mut tally).await;
                (op, Dispatched { result, tally })
            });
            handles.push((id, handle));
        }

        let total = handles.len();
        for (settled, (id, handle)) in handles.into_iter().enumerate() {
            match handle.await {
                Ok((op, dispatched)) => self.settle(op, dispatched, &mut report).await,
                Err(e) => {
                    error!(id = %id, error = %e, "dispatch task failed");
                    self.queue().reschedule(id, None);
                }
            }
            let percent = self.inner.progress.batch_percent(settled + 1, total);
            debug!(percent, "batch progress");
        }

        info!(
            strategy = %report.strategy,
            dispatched = report.dispatched,
            succeeded = report.succeeded,
            retried = report.retried,
            failed = report.failed,
            cancelled = report.cancelled,
            "sync cycle finished"
        );
        report
    }

    /// Runs cycles until `shutdown` is cancelled.
    ///
    /// Sleeps between cycles until an operation is enqueued, the network
    /// changes, or a delayed retry falls due.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut network = self.inner.network.clone();
        let mut network_open = true;
        info!("sync coordinator started");

        loop {
            let report = self.run_cycle().await;
            if shutdown.is_cancelled() {
                break;
            }
            if report.dispatched > 0 {
                continue;
            }

            let next_due = if report.is_offline() { None } else { self.next_due() };
            let due = async {
                match next_due {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.inner.wake.notified() => {}
                changed = network.changed(), if network_open => {
                    if changed.is_err() {
                        warn!("network monitor closed, keeping last sample");
                        network_open = false;
                    }
                }
                _ = due => {}
            }
        }

        info!("sync coordinator stopped");
    }

    fn queue(&self) -> MutexGuard<'_, OperationQueue> {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_plan(&self) -> SyncPlan {
        let sample = self.inner.network.borrow().clone();
        self.inner.selector.select(&sample)
    }

    fn next_due(&self) -> Option<Instant> {
        let plan = self.current_plan();
        self.queue().next_due(|p| plan.strategy.admits(p), Instant::now())
    }

    fn emit(&self, id: OperationId, stage: Stage) {
        // No subscribers is fine.
        let _ = self.inner.events.send(self.inner.progress.event(id, stage));
    }

    /// Rewrites the journal from the current queue. The snapshot is taken
    /// under the journal lock, so a later write never loses to an earlier one.
    fn persist(&self) {
        let Some(journal) = &self.inner.journal else {
            return;
        };
        let journal = journal.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = self.queue().snapshot();
        if let Err(e) = journal.rewrite(&snapshot) {
            error!(path = %journal.path().display(), error = %e, "failed to rewrite journal");
        }
    }

    fn record_finished(&self, id: OperationId, state: OperationState) {
        let mut finished = self.inner.finished.lock().unwrap_or_else(|e| e.into_inner());
        finished.push_back((id, state));
        while finished.len() > FINISHED_HISTORY {
            finished.pop_front();
        }
    }

    /// Sends one operation, following conflicts until the server accepts a
    /// write or the conflict has to be surfaced.
    async fn sync_one(
        &self,
        op: &SyncOperation,
        plan: &SyncPlan,
        tally: &mut ConflictTally,
    ) -> Result<Commit> {
        let mut work = op.clone();
        let mut base: Option<Option<Value>> = None;
        let mut rounds = 0;

        loop {
            let payload = match work.kind {
                OperationKind::Delete => None,
                _ => Some(work.payload.clone()),
            };
            let response = self.send(&work, payload.clone(), plan).await?;
            if response.is_success() {
                let ack: WriteAck = serde_json::from_slice(&response.body).unwrap_or_default();
                let version = ack.version.unwrap_or(work.base_version.saturating_add(1));
                return Ok(Commit { version, payload });
            }
            if response.status != 409 {
                let failure = Failure::Http { status: response.status, body: response.body };
                return Err(self.inner.classifier.classify(failure));
            }
            if rounds == MAX_CONFLICT_ROUNDS {
                return Err(SyncError::new(
                    ConflictKind::UnresolvableConflict,
                    format!("{} still conflicts after {rounds} resubmissions", op.id),
                ));
            }
            rounds += 1;

            let current_base = match base.take() {
                Some(b) => b,
                None => self.stored_base(op)?,
            };
            let next = self
                .resolve_conflict(&work, current_base.as_ref(), &response.body, plan, tally)
                .await?;
            match next {
                AfterConflict::Commit(commit) => return Ok(commit),
                AfterConflict::Resubmit { payload, content_type, expected_version, base: remote } => {
                    work.base_version = expected_version;
                    match payload {
                        Some(bytes) => {
                            if work.kind == OperationKind::Delete {
                                work.kind = OperationKind::Update;
                            }
                            work.payload = bytes;
                            work.content_type = content_type;
                        }
                        None => {
                            work.kind = OperationKind::Delete;
                            work.payload.clear();
                        }
                    }
                    base = Some(remote);
                }
            }
        }
    }

    /// The local snapshot an operation was made against, if storage still
    /// holds that version.
    fn stored_base(&self, op: &SyncOperation) -> Result<Option<Value>> {
        let stored = self
            .inner
            .storage
            .get(&op.entity_id)
            .map_err(|e| self.inner.classifier.classify(e.into()))?;
        Ok(stored
            .filter(|s| s.version == op.base_version)
            .and_then(|s| serde_json::from_slice(&s.payload).ok()))
    }

    async fn resolve_conflict(
        &self,
        work: &SyncOperation,
        base: Option<&Value>,
        body: &[u8],
        plan: &SyncPlan,
        tally: &mut ConflictTally,
    ) -> Result<AfterConflict> {
        let notice: ConflictNotice = serde_json::from_slice(body).unwrap_or_default();
        let reported = notice.kind.as_deref().and_then(ConflictKind::from_wire);
        self.queue().set_state(work.id, OperationState::ConflictPending);
        self.emit(work.id, Stage::Resolving);

        let remote = self.fetch_remote(work, notice.current_version, plan).await?;
        let record = match self.inner.resolver.resolve(work, base, &remote, reported) {
            Resolution::Converged { version } => {
                debug!(id = %work.id, version, "remote already holds the change");
                return Ok(AfterConflict::Commit(remote_commit(&remote)?));
            }
            Resolution::Merged { record, payload, expected_version } => {
                tally.auto_merged = true;
                info!(
                    id = %work.id,
                    entity = %work.entity_id,
                    local = ?record.local_fields,
                    remote = ?record.remote_fields,
                    "merged disjoint changes"
                );
                return Ok(AfterConflict::Resubmit {
                    payload: payload.as_ref().map(json_bytes).transpose()?,
                    content_type: ContentType::Json,
                    expected_version,
                    base: remote.payload,
                });
            }
            Resolution::Surfaced(record) => record,
        };

        tally.surfaced = true;
        warn!(id = %work.id, entity = %work.entity_id, kind = %record.kind, "conflict surfaced");
        match self.inner.conflicts.on_conflict(&record) {
            ResolutionDecision::KeepLocal => Ok(AfterConflict::Resubmit {
                payload: (work.kind != OperationKind::Delete).then(|| work.payload.clone()),
                content_type: work.content_type,
                expected_version: remote.version,
                base: remote.payload,
            }),
            ResolutionDecision::UseMerged(value) => Ok(AfterConflict::Resubmit {
                payload: Some(json_bytes(&value)?),
                content_type: ContentType::Json,
                expected_version: remote.version,
                base: remote.payload,
            }),
            ResolutionDecision::KeepRemote => Ok(AfterConflict::Commit(remote_commit(&remote)?)),
            ResolutionDecision::Defer => Err(SyncError::new(
                record.kind,
                format!("{} conflicts with remote version {}", work.id, remote.version),
            )),
        }
    }

    async fn fetch_remote(
        &self,
        work: &SyncOperation,
        reported_version: Option<u64>,
        plan: &SyncPlan,
    ) -> Result<RemoteState> {
        let response = self.execute(TransportRequest::fetch(work), plan).await?;
        match response.status {
            404 | 410 => Ok(RemoteState::deleted(reported_version.unwrap_or(work.base_version))),
            _ if response.is_success() => {
                let entity: RemoteEntity = serde_json::from_slice(&response.body)
                    .map_err(|e| self.inner.classifier.classify(e.into()))?;
                let payload = if entity.deleted { None } else { entity.payload };
                Ok(RemoteState { version: entity.version, payload, deleted: entity.deleted })
            }
            status => {
                Err(self.inner.classifier.classify(Failure::Http { status, body: response.body }))
            }
        }
    }

    async fn send(
        &self,
        work: &SyncOperation,
        payload: Option<Vec<u8>>,
        plan: &SyncPlan,
    ) -> Result<TransportResponse> {
        let body = match payload {
            Some(bytes) => {
                self.emit(work.id, Stage::Compressing);
                Some(self.compress(bytes, work.content_type, plan).await?)
            }
            None => None,
        };
        self.emit(work.id, Stage::Sending);
        self.execute(TransportRequest::write(work, work.base_version, body), plan).await
    }

    async fn compress(
        &self,
        bytes: Vec<u8>,
        content_type: ContentType,
        plan: &SyncPlan,
    ) -> Result<CompressedData> {
        let compressor = self.inner.compressor;
        let profile = plan.compression;
        if bytes.len() < compressor.threshold() {
            return compressor.compress(&bytes, content_type, &profile);
        }
        tokio::task::spawn_blocking(move || compressor.compress(&bytes, content_type, &profile))
            .await
            .map_err(|e| {
                SyncError::new(DataProcessingError::CompressionFailed, "compression task failed")
                    .with_cause(e)
            })?
    }

    async fn execute(&self, request: TransportRequest, plan: &SyncPlan) -> Result<TransportResponse> {
        let limit = plan.request_timeout();
        let result =
            match tokio::time::timeout(limit, self.inner.transport.execute(request, limit)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(limit)),
            };
        result.map_err(|e| self.inner.classifier.classify(e.into()))
    }

    async fn settle(&self, op: SyncOperation, dispatched: Dispatched, report: &mut CycleReport) {
        report.auto_merged += usize::from(dispatched.tally.auto_merged);
        report.conflicts_surfaced += usize::from(dispatched.tally.surfaced);

        let cancelled = self.queue().is_cancel_requested(op.id);
        if cancelled {
            info!(id = %op.id, "discarding result of cancelled operation");
            self.finish(op.id, Stage::Cancelled);
            report.cancelled += 1;
            return;
        }

        let result = match dispatched.result {
            Ok(commit) => {
                self.emit(op.id, Stage::Committing);
                self.commit(&op, commit)
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(version) => {
                debug!(id = %op.id, entity = %op.entity_id, version, "operation synced");
                self.finish(op.id, Stage::Succeeded);
                report.succeeded += 1;
            }
            Err(err) if err.is_retryable() => self.retry_or_fail(&op, err, report).await,
            Err(err) => self.fail(&op, err, report),
        }
    }

    fn commit(&self, op: &SyncOperation, commit: Commit) -> Result<u64> {
        let storage = &self.inner.storage;
        let stored = match &commit.payload {
            Some(payload) => storage.put(&op.entity_id, payload, commit.version),
            None => storage.delete(&op.entity_id),
        };
        stored.map_err(|e| self.inner.classifier.classify(e.into()))?;

        let rebased = self.queue().rebase(op, commit.version);
        if rebased > 0 {
            debug!(
                id = %op.id,
                entity = %op.entity_id,
                version = commit.version,
                rebased,
                "rebased later operations on committed version"
            );
        }
        Ok(commit.version)
    }

    async fn retry_or_fail(&self, op: &SyncOperation, err: SyncError, report: &mut CycleReport) {
        if err.kind() == ErrorKind::Auth(AuthError::TokenExpired) {
            let Some(refresher) = self.inner.refresher.clone() else {
                return self.fail(op, err, report);
            };
            if let Err(refresh_err) = refresher.refresh().await {
                warn!(id = %op.id, error = %refresh_err, "credential refresh failed");
                return self.fail(op, refresh_err, report);
            }
            debug!(id = %op.id, "credentials refreshed");
        }

        let Some(count) = self.queue().bump_retry(op.id) else {
            return;
        };
        match self.inner.retry.decide(count) {
            RetryDecision::Exhausted => {
                let exhausted = SyncError::new(
                    SyncOperationError::MaxRetriesExceeded,
                    format!("{} failed after {count} attempts", op.id),
                )
                .with_cause(err);
                self.fail(op, exhausted, report);
            }
            RetryDecision::Retry(delay) => {
                warn!(
                    id = %op.id,
                    attempt = count,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying operation"
                );
                self.queue().reschedule(op.id, (!delay.is_zero()).then(|| Instant::now() + delay));
                self.persist();
                self.emit(op.id, Stage::RetryScheduled { attempt: count, delay });
                if delay.is_zero() {
                    self.inner.wake.notify_one();
                }
                report.retried += 1;
            }
        }
    }

    fn fail(&self, op: &SyncOperation, err: SyncError, report: &mut CycleReport) {
        error!(id = %op.id, entity = %op.entity_id, code = %err.kind(), error = %err.chain(), "operation failed");
        self.finish(op.id, Stage::Failed(err.kind()));
        report.failed += 1;
    }

    /// Removes a finished operation and reports its terminal stage.
    fn finish(&self, id: OperationId, stage: Stage) {
        self.queue().remove(id);
        self.persist();
        self.record_finished(id, stage.state());
        self.emit(id, stage);
    }
}

/// Rejects operations that could never be sent.
fn validate(new: &NewOperation) -> Result<()> {
    let required = [
        ("entity_type", &new.entity_type),
        ("entity_id", &new.entity_id),
        ("idempotency_key", &new.idempotency_key),
    ];
    if let Some((field, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(SyncError::new(
            SyncOperationError::InvalidOperation,
            format!("{field} must not be empty"),
        ));
    }
    if new.kind != OperationKind::Delete
        && new.content_type == ContentType::Json
        && serde_json::from_slice::<serde::de::IgnoredAny>(&new.payload).is_err()
    {
        return Err(SyncError::new(
            SyncOperationError::InvalidOperation,
            format!("payload of {} is not valid JSON", new.entity_id),
        ));
    }
    Ok(())
}

fn json_bytes(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        SyncError::new(DataProcessingError::SerializationFailed, "cannot serialize payload")
            .with_cause(e)
    })
}

fn remote_commit(remote: &RemoteState) -> Result<Commit> {
    let payload = match (&remote.payload, remote.deleted) {
        (Some(value), false) => Some(json_bytes(value)?),
        _ => None,
    };
    Ok(Commit { version: remote.version, payload })
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
