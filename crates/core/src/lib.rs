// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! trickle-core: offline-first synchronization engine
//!
//! Local changes are queued as operations and sent when the network allows.
//! Sending is shaped by the measured link quality, payloads are compressed
//! to fit it, and version conflicts are merged or handed back to the caller.

pub mod classify;
pub mod compress;
pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod journal;
pub mod messages;
pub mod network;
pub mod op;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod storage;
pub mod strategy;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use classify::{ErrorClassifier, Failure};
pub use compress::{CompressedData, Compressor, Encoding};
pub use config::{ConfigError, EngineConfig};
pub use conflict::{
    ConflictHandler, ConflictKind, ConflictRecord, ConflictResolver, RemoteState, Resolution,
    ResolutionDecision,
};
pub use coordinator::{CoordinatorBuilder, CycleReport, QueueStatus, SyncCoordinator};
pub use error::{ErrorKind, Result, SyncError};
pub use messages::{EnglishCatalog, MessageCatalog, TableCatalog};
pub use network::{
    Capabilities, ConnectivityEvent, NetworkQualityMonitor, NetworkSample, QualityThresholds,
    QualityTier, TransportType,
};
pub use op::{
    ContentType, NewOperation, OperationId, OperationKind, OperationState, Priority, SyncOperation,
};
pub use progress::{ProgressCalculator, ProgressEvent};
pub use retry::RetryPolicy;
pub use storage::{CredentialRefresher, MemoryStorage, Storage, StorageError, StoredEntity};
pub use strategy::{CompressionProfile, StrategySelector, SyncPlan, SyncStrategy};
pub use transport::{Transport, TransportError, TransportRequest, TransportResponse};
