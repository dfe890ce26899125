// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local storage and credential collaborators.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::error::SyncError;

/// Failure reported by a [`Storage`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("storage is full")]
    Full,

    #[error("query failed: {0}")]
    Query(String),
}

/// An entity as held in local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntity {
    pub payload: Vec<u8>,
    pub version: u64,
}

/// The caller's local entity store.
///
/// The coordinator reads base snapshots from it during conflict resolution
/// and commits server-acknowledged state into it.
pub trait Storage: Send + Sync {
    fn get(&self, entity_id: &str) -> Result<Option<StoredEntity>, StorageError>;

    fn put(&self, entity_id: &str, payload: &[u8], version: u64) -> Result<(), StorageError>;

    fn delete(&self, entity_id: &str) -> Result<(), StorageError>;
}

/// Storage kept in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entities: Mutex<HashMap<String, StoredEntity>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entity, returning self for chaining.
    pub fn with_entity(self, entity_id: &str, payload: &[u8], version: u64) -> Self {
        self.lock().insert(entity_id.to_string(), StoredEntity { payload: payload.to_vec(), version });
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredEntity>> {
        self.entities.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, entity_id: &str) -> Result<Option<StoredEntity>, StorageError> {
        Ok(self.lock().get(entity_id).cloned())
    }

    fn put(&self, entity_id: &str, payload: &[u8], version: u64) -> Result<(), StorageError> {
        self.lock()
            .insert(entity_id.to_string(), StoredEntity { payload: payload.to_vec(), version });
        Ok(())
    }

    fn delete(&self, entity_id: &str) -> Result<(), StorageError> {
        self.lock().remove(entity_id);
        Ok(())
    }
}

/// Renews credentials after the server reports an expired token.
pub trait CredentialRefresher: Send + Sync {
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + '_>>;
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
