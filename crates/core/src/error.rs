// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for sync operations.
//!
//! Every failure the engine observes is reduced to a [`SyncError`] whose
//! [`ErrorKind`] fixes three things:
//! - whether the coordinator may retry it
//! - a stable telemetry category (`network`, `auth`, ...)
//! - a user-facing message, looked up through a [`MessageCatalog`]

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conflict::ConflictKind;
use crate::messages::MessageCatalog;

/// Boxed error used as the underlying cause of a [`SyncError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Transport-level and HTTP failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkError {
    NoConnection,
    Timeout,
    ServerError,
    RateLimited,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
}

/// Authentication and entitlement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthError {
    TokenExpired,
    InvalidCredentials,
    AccountSuspended,
    InsufficientPermissions,
    TierRestriction,
    NotAuthenticated,
}

/// Local storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseError {
    ConnectionFailed,
    ConstraintViolation,
    DataCorruption,
    MigrationFailed,
    StorageFull,
    QueryFailed,
}

/// Payload transformation failures. Always input-dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataProcessingError {
    CompressionFailed,
    DecompressionFailed,
    SerializationFailed,
    EncryptionFailed,
    DecryptionFailed,
}

/// Queue-level failures raised by the coordinator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperationError {
    AlreadyInProgress,
    DependencyNotMet,
    InvalidOperation,
    MaxRetriesExceeded,
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaError {
    UnsupportedFormat,
    FileTooLarge,
    ProcessingFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionalError {
    UnavailableInRegion,
    CurrencyNotSupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    InvalidInput,
    MissingField,
    InvalidFormat,
}

/// The classified kind of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    Network(NetworkError),
    Auth(AuthError),
    Database(DatabaseError),
    DataProcessing(DataProcessingError),
    Conflict(ConflictKind),
    Operation(SyncOperationError),
    Media(MediaError),
    Regional(RegionalError),
    Validation(ValidationError),
    Unknown,
}

impl ErrorKind {
    /// Returns true if the coordinator may retry an operation that failed
    /// with this kind.
    ///
    /// `TokenExpired` is retryable only after a credential refresh; the
    /// coordinator performs the refresh before requeueing.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Network(e) => matches!(
                e,
                NetworkError::NoConnection
                    | NetworkError::Timeout
                    | NetworkError::ServerError
                    | NetworkError::RateLimited
            ),
            ErrorKind::Auth(e) => *e == AuthError::TokenExpired,
            ErrorKind::Database(e) => *e == DatabaseError::ConnectionFailed,
            ErrorKind::DataProcessing(_)
            | ErrorKind::Conflict(_)
            | ErrorKind::Operation(_)
            | ErrorKind::Media(_)
            | ErrorKind::Regional(_)
            | ErrorKind::Validation(_)
            | ErrorKind::Unknown => false,
        }
    }

    /// Stable category string for telemetry aggregation.
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::Network(_) => "network",
            ErrorKind::Auth(_) => "auth",
            ErrorKind::Database(_) => "database",
            ErrorKind::DataProcessing(_) => "data_processing",
            ErrorKind::Conflict(_) => "conflict",
            ErrorKind::Operation(_) => "sync_operation",
            ErrorKind::Media(_) => "media",
            ErrorKind::Regional(_) => "regional",
            ErrorKind::Validation(_) => "validation",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Variant name within the category, in snake_case.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Network(e) => match e {
                NetworkError::NoConnection => "no_connection",
                NetworkError::Timeout => "timeout",
                NetworkError::ServerError => "server_error",
                NetworkError::RateLimited => "rate_limited",
                NetworkError::BadRequest => "bad_request",
                NetworkError::Unauthorized => "unauthorized",
                NetworkError::Forbidden => "forbidden",
                NetworkError::NotFound => "not_found",
            },
            ErrorKind::Auth(e) => match e {
                AuthError::TokenExpired => "token_expired",
                AuthError::InvalidCredentials => "invalid_credentials",
                AuthError::AccountSuspended => "account_suspended",
                AuthError::InsufficientPermissions => "insufficient_permissions",
                AuthError::TierRestriction => "tier_restriction",
                AuthError::NotAuthenticated => "not_authenticated",
            },
            ErrorKind::Database(e) => match e {
                DatabaseError::ConnectionFailed => "connection_failed",
                DatabaseError::ConstraintViolation => "constraint_violation",
                DatabaseError::DataCorruption => "data_corruption",
                DatabaseError::MigrationFailed => "migration_failed",
                DatabaseError::StorageFull => "storage_full",
                DatabaseError::QueryFailed => "query_failed",
            },
            ErrorKind::DataProcessing(e) => match e {
                DataProcessingError::CompressionFailed => "compression_failed",
                DataProcessingError::DecompressionFailed => "decompression_failed",
                DataProcessingError::SerializationFailed => "serialization_failed",
                DataProcessingError::EncryptionFailed => "encryption_failed",
                DataProcessingError::DecryptionFailed => "decryption_failed",
            },
            ErrorKind::Conflict(kind) => kind.as_str(),
            ErrorKind::Operation(e) => match e {
                SyncOperationError::AlreadyInProgress => "already_in_progress",
                SyncOperationError::DependencyNotMet => "dependency_not_met",
                SyncOperationError::InvalidOperation => "invalid_operation",
                SyncOperationError::MaxRetriesExceeded => "max_retries_exceeded",
                SyncOperationError::QueueFull => "queue_full",
            },
            ErrorKind::Media(e) => match e {
                MediaError::UnsupportedFormat => "unsupported_format",
                MediaError::FileTooLarge => "file_too_large",
                MediaError::ProcessingFailed => "processing_failed",
            },
            ErrorKind::Regional(e) => match e {
                RegionalError::UnavailableInRegion => "unavailable_in_region",
                RegionalError::CurrencyNotSupported => "currency_not_supported",
            },
            ErrorKind::Validation(e) => match e {
                ValidationError::InvalidInput => "invalid_input",
                ValidationError::MissingField => "missing_field",
                ValidationError::InvalidFormat => "invalid_format",
            },
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Telemetry code of the form `category.name`.
    pub fn code(&self) -> String {
        format!("{}.{}", self.category(), self.name())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category(), self.name())
    }
}

macro_rules! impl_from_kind {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ErrorKind {
                fn from(e: $ty) -> Self {
                    ErrorKind::$variant(e)
                }
            }
        )*
    };
}

impl_from_kind! {
    NetworkError => Network,
    AuthError => Auth,
    DatabaseError => Database,
    DataProcessingError => DataProcessing,
    ConflictKind => Conflict,
    SyncOperationError => Operation,
    MediaError => Media,
    RegionalError => Regional,
    ValidationError => Validation,
}

/// A classified sync failure.
///
/// The kind decides retryability; the message carries internal detail for
/// logs; the optional cause preserves the original error.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct SyncError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<BoxError>,
}

impl SyncError {
    pub fn new(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        SyncError { kind: kind.into(), message: message.into(), cause: None }
    }

    /// Attaches the underlying error.
    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn category(&self) -> &'static str {
        self.kind.category()
    }

    /// The underlying error, if one was attached.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Message suitable for display to the end user.
    pub fn user_message(&self, catalog: &dyn MessageCatalog) -> String {
        catalog.message(self.kind)
    }

    /// Renders the message followed by the full cause chain.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = StdError::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
