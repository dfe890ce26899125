// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reduction of raw failures to classified [`SyncError`]s.

use serde::Deserialize;
use tracing::error;

use crate::conflict::ConflictKind;
use crate::error::{
    AuthError, BoxError, DatabaseError, DataProcessingError, ErrorKind, MediaError, NetworkError,
    RegionalError, SyncError,
};
use crate::storage::StorageError;
use crate::transport::TransportError;

/// A failure as observed, before classification.
#[derive(Debug)]
pub enum Failure {
    /// The server answered with a non-success status.
    Http { status: u16, body: Vec<u8> },
    Transport(TransportError),
    Storage(StorageError),
    Serialization(serde_json::Error),
    Other(BoxError),
}

impl From<TransportError> for Failure {
    fn from(e: TransportError) -> Self {
        Failure::Transport(e)
    }
}

impl From<StorageError> for Failure {
    fn from(e: StorageError) -> Self {
        Failure::Storage(e)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Failure::Serialization(e)
    }
}

/// Error payload a server may attach to a 4xx response.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error")]
    code: Option<String>,
}

/// Maps failures to error kinds. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        ErrorClassifier
    }

    pub fn classify(&self, failure: Failure) -> SyncError {
        let err = match failure {
            Failure::Http { status, body } => {
                let kind = self.classify_status(status, &body);
                let detail = String::from_utf8_lossy(&body);
                SyncError::new(kind, format!("HTTP {status}: {}", detail.trim()))
            }
            Failure::Transport(e) => {
                let kind: ErrorKind = match &e {
                    TransportError::NoConnection(_) | TransportError::ConnectionClosed => {
                        NetworkError::NoConnection.into()
                    }
                    TransportError::Timeout(_) => NetworkError::Timeout.into(),
                    TransportError::Failed(_) => ErrorKind::Unknown,
                };
                SyncError::new(kind, "transport failed").with_cause(e)
            }
            Failure::Storage(e) => {
                let kind = match &e {
                    StorageError::Unavailable(_) => DatabaseError::ConnectionFailed,
                    StorageError::Constraint(_) => DatabaseError::ConstraintViolation,
                    StorageError::Corrupt(_) => DatabaseError::DataCorruption,
                    StorageError::Migration(_) => DatabaseError::MigrationFailed,
                    StorageError::Full => DatabaseError::StorageFull,
                    StorageError::Query(_) => DatabaseError::QueryFailed,
                };
                SyncError::new(kind, "local storage failed").with_cause(e)
            }
            Failure::Serialization(e) => {
                SyncError::new(DataProcessingError::SerializationFailed, "malformed data")
                    .with_cause(e)
            }
            Failure::Other(e) => SyncError::new(ErrorKind::Unknown, "unexpected failure").with_cause(e),
        };
        if err.kind() == ErrorKind::Unknown {
            error!(error = %err.chain(), "unclassified sync failure");
        }
        err
    }

    /// Maps an HTTP status (and error body, when present) to a kind.
    pub fn classify_status(&self, status: u16, body: &[u8]) -> ErrorKind {
        match status {
            400 | 422 => NetworkError::BadRequest.into(),
            401 => match body_code(body).as_deref() {
                Some("token_expired") => AuthError::TokenExpired.into(),
                Some("invalid_credentials") => AuthError::InvalidCredentials.into(),
                _ => NetworkError::Unauthorized.into(),
            },
            403 => match body_code(body).as_deref() {
                Some("insufficient_permissions") => AuthError::InsufficientPermissions.into(),
                Some("tier_restriction") => AuthError::TierRestriction.into(),
                Some("account_suspended") => AuthError::AccountSuspended.into(),
                _ => NetworkError::Forbidden.into(),
            },
            404 | 410 => NetworkError::NotFound.into(),
            408 | 504 => NetworkError::Timeout.into(),
            409 => ConflictKind::VersionConflict.into(),
            413 => MediaError::FileTooLarge.into(),
            429 => NetworkError::RateLimited.into(),
            451 => RegionalError::UnavailableInRegion.into(),
            500..=599 => NetworkError::ServerError.into(),
            _ => ErrorKind::Unknown,
        }
    }
}

/// Extracts a lowercase error code from a JSON or plain-text body.
fn body_code(body: &[u8]) -> Option<String> {
    if let Ok(ErrorBody { code: Some(code) }) = serde_json::from_slice::<ErrorBody>(body) {
        return Some(code.to_ascii_lowercase());
    }
    const KNOWN: [&str; 5] = [
        "token_expired",
        "invalid_credentials",
        "insufficient_permissions",
        "tier_restriction",
        "account_suspended",
    ];
    let text = String::from_utf8_lossy(body).to_ascii_lowercase();
    KNOWN.into_iter().find(|code| text.contains(code)).map(str::to_string)
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
