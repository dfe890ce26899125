// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync operations: locally queued changes awaiting transmission.
//!
//! Callers describe a change with [`NewOperation`]; the coordinator turns it
//! into a [`SyncOperation`] with an id, creation time, retry counter and
//! lifecycle state. Operations are:
//!
//! - Serializable: journaled as JSONL while pending
//! - Idempotent: the caller-supplied idempotency key lets the server dedupe resends
//! - Ordered: ids increase monotonically, giving FIFO order within a priority

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DataProcessingError, ErrorKind, SyncError};

/// Unique identifier for a queued operation.
///
/// Ids are assigned in enqueue order, so comparing two ids compares their
/// enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Dispatch priority. Higher priorities always drain first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

/// What the operation does to the remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

/// How the payload bytes should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    Json,
    Image,
}

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum OperationState {
    Queued,
    InFlight,
    Succeeded,
    ConflictPending,
    /// Terminal failure. No further automatic retry occurs.
    Failed(ErrorKind),
    /// Removed at the caller's request.
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded | OperationState::Failed(_) | OperationState::Cancelled
        )
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Queued => write!(f, "queued"),
            OperationState::InFlight => write!(f, "in_flight"),
            OperationState::Succeeded => write!(f, "succeeded"),
            OperationState::ConflictPending => write!(f, "conflict_pending"),
            OperationState::Failed(kind) => write!(f, "failed({kind})"),
            OperationState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A change submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    pub entity_type: String,
    pub entity_id: String,
    pub kind: OperationKind,
    /// Version of the local entity this change was made against.
    pub base_version: u64,
    pub payload: Vec<u8>,
    pub content_type: ContentType,
    pub idempotency_key: String,
    pub priority: Priority,
}

impl NewOperation {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        kind: OperationKind,
        idempotency_key: impl Into<String>,
    ) -> Self {
        NewOperation {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            kind,
            base_version: 0,
            payload: Vec::new(),
            content_type: ContentType::Json,
            idempotency_key: idempotency_key.into(),
            priority: Priority::Normal,
        }
    }

    /// Creates an update carrying the full new JSON state of the entity.
    pub fn json_update(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        base_version: u64,
        state: &serde_json::Value,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let payload = serde_json::to_vec(state).map_err(|e| {
            SyncError::new(DataProcessingError::SerializationFailed, "cannot serialize entity")
                .with_cause(e)
        })?;
        Ok(NewOperation::new(entity_type, entity_id, OperationKind::Update, idempotency_key)
            .base_version(base_version)
            .payload(payload, ContentType::Json))
    }

    /// Creates a delete of the entity at the given version.
    pub fn delete(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        base_version: u64,
        idempotency_key: impl Into<String>,
    ) -> Self {
        NewOperation::new(entity_type, entity_id, OperationKind::Delete, idempotency_key)
            .base_version(base_version)
    }

    pub fn base_version(mut self, version: u64) -> Self {
        self.base_version = version;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>, content_type: ContentType) -> Self {
        self.payload = payload;
        self.content_type = content_type;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// A queued operation as tracked by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: OperationId,
    pub entity_type: String,
    pub entity_id: String,
    pub kind: OperationKind,
    pub base_version: u64,
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    pub content_type: ContentType,
    pub idempotency_key: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub state: OperationState,
}

impl SyncOperation {
    /// Creates a queued operation from a caller submission.
    pub fn from_new(id: OperationId, new: NewOperation, created_at: DateTime<Utc>) -> Self {
        SyncOperation {
            id,
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            kind: new.kind,
            base_version: new.base_version,
            payload: new.payload,
            content_type: new.content_type,
            idempotency_key: new.idempotency_key,
            priority: new.priority,
            created_at,
            retry_count: 0,
            state: OperationState::Queued,
        }
    }

    /// Parses the payload as JSON. Returns `None` for deletes.
    pub fn json_payload(&self) -> Result<Option<serde_json::Value>, SyncError> {
        if self.kind == OperationKind::Delete {
            return Ok(None);
        }
        serde_json::from_slice(&self.payload).map(Some).map_err(|e| {
            SyncError::new(
                DataProcessingError::SerializationFailed,
                format!("payload of {} is not JSON", self.id),
            )
            .with_cause(e)
        })
    }
}

/// Serializes payload bytes as base64 so journal lines stay compact.
mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
