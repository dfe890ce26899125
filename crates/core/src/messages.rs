// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! User-facing error messages.
//!
//! The engine never shows internal error detail to end users. Instead each
//! [`ErrorKind`] is looked up in a [`MessageCatalog`], which the host
//! application supplies for its locale. [`EnglishCatalog`] is the default.

use std::collections::HashMap;

use crate::conflict::ConflictKind;
use crate::error::{
    AuthError, DataProcessingError, DatabaseError, ErrorKind, MediaError, NetworkError,
    RegionalError, SyncOperationError, ValidationError,
};

/// Source of localized user-facing messages.
pub trait MessageCatalog: Send + Sync {
    /// Returns the message shown to the user for the given kind.
    fn message(&self, kind: ErrorKind) -> String;
}

/// Built-in English messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishCatalog;

impl MessageCatalog for EnglishCatalog {
    fn message(&self, kind: ErrorKind) -> String {
        english(kind).to_string()
    }
}

fn english(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Network(e) => match e {
            NetworkError::NoConnection => "You're offline. Changes will sync when you reconnect.",
            NetworkError::Timeout => "The connection is slow. We'll keep trying.",
            NetworkError::ServerError => "The server is having trouble. We'll try again shortly.",
            NetworkError::RateLimited => "Too many requests. We'll try again in a moment.",
            NetworkError::BadRequest => "This change could not be accepted by the server.",
            NetworkError::Unauthorized => "Please sign in again to continue syncing.",
            NetworkError::Forbidden => "You don't have access to this item.",
            NetworkError::NotFound => "This item no longer exists on the server.",
        },
        ErrorKind::Auth(e) => match e {
            AuthError::TokenExpired => "Your session expired. Reconnecting...",
            AuthError::InvalidCredentials => "Your sign-in details are incorrect.",
            AuthError::AccountSuspended => "Your account has been suspended.",
            AuthError::InsufficientPermissions => "You don't have permission to do this.",
            AuthError::TierRestriction => "This feature is not available on your plan.",
            AuthError::NotAuthenticated => "Please sign in to sync your changes.",
        },
        ErrorKind::Database(e) => match e {
            DatabaseError::ConnectionFailed => "Local storage is busy. We'll try again.",
            DatabaseError::ConstraintViolation => "This change conflicts with saved data.",
            DatabaseError::DataCorruption => "Some saved data is damaged and could not be synced.",
            DatabaseError::MigrationFailed => "The app could not update its local data.",
            DatabaseError::StorageFull => "Your device is out of storage space.",
            DatabaseError::QueryFailed => "Saved data could not be read.",
        },
        ErrorKind::DataProcessing(e) => match e {
            DataProcessingError::CompressionFailed
            | DataProcessingError::DecompressionFailed => "This data could not be processed.",
            DataProcessingError::SerializationFailed => "This data is in an unexpected format.",
            DataProcessingError::EncryptionFailed
            | DataProcessingError::DecryptionFailed => "This data could not be secured.",
        },
        ErrorKind::Conflict(kind) => match kind {
            ConflictKind::VersionConflict => "This item changed elsewhere. Merging changes...",
            ConflictKind::ConcurrentModification => {
                "This item was edited on another device. Please choose which version to keep."
            }
            ConflictKind::DeletionConflict => "This item was deleted on another device.",
            ConflictKind::OwnershipConflict => "The owner of this item changed on another device.",
            ConflictKind::UnresolvableConflict => {
                "Your changes overlap with changes made elsewhere. Please review them."
            }
        },
        ErrorKind::Operation(e) => match e {
            SyncOperationError::AlreadyInProgress => "This change is already being synced.",
            SyncOperationError::DependencyNotMet => "This change is waiting on another change.",
            SyncOperationError::InvalidOperation => "This change could not be synced.",
            SyncOperationError::MaxRetriesExceeded => {
                "We couldn't sync this change. Please try again later."
            }
            SyncOperationError::QueueFull => "Too many changes are waiting to sync.",
        },
        ErrorKind::Media(e) => match e {
            MediaError::UnsupportedFormat => "This file type is not supported.",
            MediaError::FileTooLarge => "This file is too large to upload.",
            MediaError::ProcessingFailed => "This file could not be processed.",
        },
        ErrorKind::Regional(e) => match e {
            RegionalError::UnavailableInRegion => "This is not available in your region.",
            RegionalError::CurrencyNotSupported => "This currency is not supported.",
        },
        ErrorKind::Validation(e) => match e {
            ValidationError::InvalidInput => "Some of the information entered is invalid.",
            ValidationError::MissingField => "Some required information is missing.",
            ValidationError::InvalidFormat => "Some information is in the wrong format.",
        },
        ErrorKind::Unknown => "Something went wrong. Please try again.",
    }
}

/// Catalog backed by a table of overrides, falling back to another catalog.
///
/// Keys are telemetry codes (`network.timeout`) or bare categories
/// (`network`); exact codes take precedence.
pub struct TableCatalog<F: MessageCatalog = EnglishCatalog> {
    entries: HashMap<String, String>,
    fallback: F,
}

impl TableCatalog<EnglishCatalog> {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self::with_fallback(entries, EnglishCatalog)
    }
}

impl<F: MessageCatalog> TableCatalog<F> {
    pub fn with_fallback(entries: HashMap<String, String>, fallback: F) -> Self {
        TableCatalog { entries, fallback }
    }
}

impl<F: MessageCatalog> MessageCatalog for TableCatalog<F> {
    fn message(&self, kind: ErrorKind) -> String {
        self.entries
            .get(&kind.code())
            .or_else(|| self.entries.get(kind.category()))
            .cloned()
            .unwrap_or_else(|| self.fallback.message(kind))
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
