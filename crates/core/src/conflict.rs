// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict detection and resolution.
//!
//! When the server rejects a write because the entity moved past the
//! operation's base version, the coordinator fetches the remote state and
//! asks the [`ConflictResolver`] what to do. Only plain version conflicts
//! whose local and remote changes touch different top-level fields are
//! merged automatically. Everything else is handed to the caller's
//! [`ConflictHandler`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::op::{OperationId, SyncOperation};

/// Pseudo-field naming the whole payload when it is not a JSON object.
pub const ROOT_FIELD: &str = "$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Optimistic-lock mismatch with no known semantic collision.
    VersionConflict,
    /// The server reports that both sides changed the same data.
    ConcurrentModification,
    /// One side deleted the entity while the other modified it.
    DeletionConflict,
    /// Ownership-sensitive fields diverged.
    OwnershipConflict,
    /// Automatic resolution was attempted and failed.
    UnresolvableConflict,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::VersionConflict => "version_conflict",
            ConflictKind::ConcurrentModification => "concurrent_modification",
            ConflictKind::DeletionConflict => "deletion_conflict",
            ConflictKind::OwnershipConflict => "ownership_conflict",
            ConflictKind::UnresolvableConflict => "unresolvable_conflict",
        }
    }

    /// Parses the `kind` field of a 409 body.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "version" | "version_conflict" => Some(ConflictKind::VersionConflict),
            "concurrent_modification" => Some(ConflictKind::ConcurrentModification),
            "deleted" | "deletion_conflict" => Some(ConflictKind::DeletionConflict),
            "ownership" | "ownership_conflict" => Some(ConflictKind::OwnershipConflict),
            _ => None,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current server-side state of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteState {
    pub version: u64,
    pub payload: Option<Value>,
    pub deleted: bool,
}

impl RemoteState {
    pub fn live(version: u64, payload: Value) -> Self {
        RemoteState { version, payload: Some(payload), deleted: false }
    }

    pub fn deleted(version: u64) -> Self {
        RemoteState { version, payload: None, deleted: true }
    }
}

/// Description of a conflict, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub operation_id: OperationId,
    pub entity_type: String,
    pub entity_id: String,
    pub local_version: u64,
    pub remote_version: u64,
    pub kind: ConflictKind,
    pub local_payload: Option<Value>,
    pub remote_payload: Option<Value>,
    /// Top-level fields the local operation changed relative to its base.
    pub local_fields: BTreeSet<String>,
    /// Top-level fields the remote changed relative to the same base.
    pub remote_fields: BTreeSet<String>,
    /// Merged payload, when one was produced.
    pub resolution: Option<Value>,
}

/// What the resolver concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Both sides merged. Resubmit `payload` (`None` deletes) against
    /// `expected_version`.
    Merged { record: ConflictRecord, payload: Option<Value>, expected_version: u64 },
    /// The remote already reflects the local change.
    Converged { version: u64 },
    /// The caller must decide.
    Surfaced(ConflictRecord),
}

/// The caller's answer to a surfaced conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionDecision {
    /// Resubmit the local payload against the remote version.
    KeepLocal,
    /// Adopt the remote state locally.
    KeepRemote,
    /// Submit a caller-built payload against the remote version.
    UseMerged(Value),
    /// Fail the operation with the conflict kind, leaving local data alone.
    Defer,
}

/// Receives every conflict the resolver cannot settle.
///
/// Called from the coordinator's dispatch tasks, possibly concurrently.
pub trait ConflictHandler: Send + Sync {
    fn on_conflict(&self, record: &ConflictRecord) -> ResolutionDecision;
}

impl<F> ConflictHandler for F
where
    F: Fn(&ConflictRecord) -> ResolutionDecision + Send + Sync,
{
    fn on_conflict(&self, record: &ConflictRecord) -> ResolutionDecision {
        self(record)
    }
}

/// Handler that defers every conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferConflicts;

impl ConflictHandler for DeferConflicts {
    fn on_conflict(&self, _record: &ConflictRecord) -> ResolutionDecision {
        ResolutionDecision::Defer
    }
}

/// Classifies and, where safe, merges conflicting changes.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    ownership_fields: Vec<String>,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        ConflictResolver::from_config(&EngineConfig::default())
    }
}

impl ConflictResolver {
    pub fn new(ownership_fields: Vec<String>) -> Self {
        ConflictResolver { ownership_fields }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        ConflictResolver::new(config.ownership_fields.clone())
    }

    /// Resolves a rejected write.
    ///
    /// `base` is the locally stored snapshot the operation was made against,
    /// if still available. `reported` is the conflict kind the server
    /// attached to its rejection.
    pub fn resolve(
        &self,
        op: &SyncOperation,
        base: Option<&Value>,
        remote: &RemoteState,
        reported: Option<ConflictKind>,
    ) -> Resolution {
        let remote_payload = if remote.deleted { None } else { remote.payload.clone() };
        let local = match op.json_payload() {
            Ok(local) => local,
            Err(_) => {
                let record = ConflictRecord {
                    operation_id: op.id,
                    entity_type: op.entity_type.clone(),
                    entity_id: op.entity_id.clone(),
                    local_version: op.base_version,
                    remote_version: remote.version,
                    kind: ConflictKind::UnresolvableConflict,
                    local_payload: None,
                    remote_payload,
                    local_fields: BTreeSet::new(),
                    remote_fields: BTreeSet::new(),
                    resolution: None,
                };
                return Resolution::Surfaced(record);
            }
        };

        let local_fields = changed_fields(base, local.as_ref());
        let remote_fields = changed_fields(base, remote_payload.as_ref());
        let mut record = ConflictRecord {
            operation_id: op.id,
            entity_type: op.entity_type.clone(),
            entity_id: op.entity_id.clone(),
            local_version: op.base_version,
            remote_version: remote.version,
            kind: ConflictKind::VersionConflict,
            local_payload: local.clone(),
            remote_payload: remote_payload.clone(),
            local_fields,
            remote_fields,
            resolution: None,
        };

        let kind = self.classify(&record, remote.deleted, reported);
        debug!(entity = %op.entity_id, kind = %kind, "classified conflict");
        match kind {
            ConflictKind::VersionConflict => {}
            _ => {
                record.kind = kind;
                return Resolution::Surfaced(record);
            }
        }

        if remote.deleted && local.is_none() {
            return Resolution::Converged { version: remote.version };
        }

        let merged = match local.as_ref() {
            None => None,
            Some(local) => {
                Some(apply_changes(remote_payload.as_ref(), local, &record.local_fields))
            }
        };
        if merged == remote_payload {
            return Resolution::Converged { version: remote.version };
        }
        record.resolution = merged.clone();
        Resolution::Merged { record, payload: merged, expected_version: remote.version }
    }

    fn classify(
        &self,
        record: &ConflictRecord,
        remote_deleted: bool,
        reported: Option<ConflictKind>,
    ) -> ConflictKind {
        let local_deleted = record.local_payload.is_none();
        if remote_deleted && local_deleted {
            return ConflictKind::VersionConflict;
        }
        if remote_deleted || (local_deleted && !record.remote_fields.is_empty()) {
            return ConflictKind::DeletionConflict;
        }

        let owns = |fields: &BTreeSet<String>| {
            fields.iter().any(|f| self.ownership_fields.iter().any(|o| o == f))
        };
        if (owns(&record.local_fields) && !record.remote_fields.is_empty())
            || (owns(&record.remote_fields) && !record.local_fields.is_empty())
        {
            return ConflictKind::OwnershipConflict;
        }

        if let Some(kind) = reported {
            if kind != ConflictKind::VersionConflict {
                return kind;
            }
        }

        if overlapping(record) {
            ConflictKind::UnresolvableConflict
        } else {
            ConflictKind::VersionConflict
        }
    }
}

/// Returns true if both sides changed a field to different values, or one
/// side replaced the payload wholesale while the other changed anything.
fn overlapping(record: &ConflictRecord) -> bool {
    let local = &record.local_fields;
    let remote = &record.remote_fields;
    if local.is_empty() || remote.is_empty() {
        return false;
    }
    if local.contains(ROOT_FIELD) || remote.contains(ROOT_FIELD) {
        return field_value(record.local_payload.as_ref(), ROOT_FIELD)
            != field_value(record.remote_payload.as_ref(), ROOT_FIELD);
    }
    local.intersection(remote).any(|f| {
        field_value(record.local_payload.as_ref(), f)
            != field_value(record.remote_payload.as_ref(), f)
    })
}

fn field_value<'a>(payload: Option<&'a Value>, field: &str) -> Option<&'a Value> {
    if field == ROOT_FIELD {
        payload
    } else {
        payload.and_then(|v| v.get(field))
    }
}

/// Top-level fields that differ between `base` and `new`. A removed field
/// counts as changed; non-object payloads are compared as a whole.
pub fn changed_fields(base: Option<&Value>, new: Option<&Value>) -> BTreeSet<String> {
    match (base, new) {
        (Some(Value::Object(b)), Some(Value::Object(n))) => b
            .keys()
            .chain(n.keys())
            .filter(|k| b.get(*k) != n.get(*k))
            .cloned()
            .collect(),
        (None, Some(Value::Object(n))) => n.keys().cloned().collect(),
        (Some(Value::Object(b)), None) => b.keys().cloned().collect(),
        (b, n) if b == n => BTreeSet::new(),
        _ => BTreeSet::from([ROOT_FIELD.to_string()]),
    }
}

/// Applies the local changes to the remote payload.
fn apply_changes(remote: Option<&Value>, local: &Value, fields: &BTreeSet<String>) -> Value {
    if fields.contains(ROOT_FIELD) {
        return local.clone();
    }
    let mut merged = match remote {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    for field in fields {
        match local.get(field) {
            Some(value) => {
                merged.insert(field.clone(), value.clone());
            }
            None => {
                merged.remove(field);
            }
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
