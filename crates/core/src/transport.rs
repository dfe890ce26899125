// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for entity requests.
//!
//! The engine never talks to a network stack directly. Callers supply a
//! [`Transport`] that executes one request and reports the raw status and
//! body; classification of failures happens in [`crate::classify`].
//!
//! Wire conventions (JSON bodies):
//! - write success: optional `{"version": n}`
//! - 409: optional `{"current_version": n, "kind": "..."}`
//! - fetch success: `{"version": n, "payload": ..., "deleted": bool}`

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compress::{CompressedData, Encoding};
use crate::op::{ContentType, SyncOperation};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No route to the server.
    #[error("no connection: {0}")]
    NoConnection(String),

    /// The request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection closed before a response arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Any other I/O-level failure.
    #[error("transport failed: {0}")]
    Failed(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Put,
    Delete,
}

/// One request against a remote entity.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub entity_type: String,
    pub entity_id: String,
    /// Version the client believes the server holds.
    pub expected_version: u64,
    pub idempotency_key: String,
    pub content_type: ContentType,
    pub encoding: Encoding,
    pub body: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
}

impl TransportRequest {
    /// Fetches the current remote state of the operation's entity.
    pub fn fetch(op: &SyncOperation) -> Self {
        TransportRequest {
            method: Method::Get,
            entity_type: op.entity_type.clone(),
            entity_id: op.entity_id.clone(),
            expected_version: op.base_version,
            idempotency_key: op.idempotency_key.clone(),
            content_type: ContentType::Json,
            encoding: Encoding::Identity,
            body: Vec::new(),
            thumbnail: None,
        }
    }

    /// Writes a (possibly compressed) body for the operation against
    /// `expected_version`. `None` sends a delete.
    pub fn write(op: &SyncOperation, expected_version: u64, body: Option<CompressedData>) -> Self {
        let (method, encoding, body, thumbnail) = match body {
            Some(data) => (Method::Put, data.encoding, data.bytes, data.thumbnail),
            None => (Method::Delete, Encoding::Identity, Vec::new(), None),
        };
        TransportRequest {
            method,
            entity_type: op.entity_type.clone(),
            entity_id: op.entity_id.clone(),
            expected_version,
            idempotency_key: op.idempotency_key.clone(),
            content_type: op.content_type,
            encoding,
            body,
            thumbnail,
        }
    }
}

/// Raw server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        TransportResponse { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes entity requests against the remote.
///
/// Implementations must be safe to call concurrently; the coordinator runs
/// up to one batch of requests at a time.
pub trait Transport: Send + Sync {
    /// Executes one request. The coordinator also enforces `timeout`, so
    /// implementations may ignore it.
    fn execute(
        &self,
        request: TransportRequest,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportResponse>> + Send + '_>>;
}

/// Body of a successful write.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WriteAck {
    pub version: Option<u64>,
}

/// Body of a 409 response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConflictNotice {
    pub current_version: Option<u64>,
    pub kind: Option<String>,
}

/// Body of a successful fetch.
#[derive(Debug, Deserialize)]
pub(crate) struct RemoteEntity {
    pub version: u64,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub deleted: bool,
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
