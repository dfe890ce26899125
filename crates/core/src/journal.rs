// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable journal of pending operations.
//!
//! Uses JSONL format for durability - each operation is written as a single
//! line and fsynced immediately. Removals and state changes rewrite the file
//! through a temporary sibling that is renamed into place, so a crash leaves
//! either the old or the new contents.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{DataProcessingError, DatabaseError, ErrorKind, SyncError};
use crate::op::SyncOperation;

/// Error type for journal operations.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt journal entry at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<JournalError> for SyncError {
    fn from(e: JournalError) -> Self {
        let kind: ErrorKind = match &e {
            JournalError::Io { .. } => DatabaseError::QueryFailed.into(),
            JournalError::Corrupt { .. } => DatabaseError::DataCorruption.into(),
            JournalError::Serialization(_) => DataProcessingError::SerializationFailed.into(),
        };
        SyncError::new(kind, "operation journal unavailable").with_cause(e)
    }
}

/// Result type for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Append-only JSONL file of pending operations.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Create or open a journal at the given path.
    pub fn open(path: &Path) -> JournalResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        OpenOptions::new().create(true).append(true).open(path).map_err(|e| io_err(path, e))?;
        Ok(Journal { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one operation and fsyncs.
    pub fn append(&self, op: &SyncOperation) -> JournalResult<()> {
        let json = serde_json::to_string(op)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        writeln!(file, "{json}").map_err(|e| io_err(&self.path, e))?;
        file.sync_all().map_err(|e| io_err(&self.path, e))
    }

    /// Reads every journaled operation in file order.
    ///
    /// A final line that fails to parse is treated as a torn write and
    /// skipped; a bad line anywhere else is an error.
    pub fn load(&self) -> JournalResult<Vec<SyncOperation>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.path, e)),
        };

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()
            .map_err(|e| io_err(&self.path, e))?;
        let last = lines.iter().rposition(|l| !l.trim().is_empty());

        let mut ops = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SyncOperation>(line) {
                Ok(op) => ops.push(op),
                Err(e) if Some(idx) == last => {
                    warn!(path = %self.path.display(), error = %e, "dropping torn journal entry");
                }
                Err(source) => {
                    return Err(JournalError::Corrupt { path: self.path.clone(), line: idx + 1, source })
                }
            }
        }
        Ok(ops)
    }

    /// Replaces the journal contents with `ops`.
    pub fn rewrite(&self, ops: &[SyncOperation]) -> JournalResult<()> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
            for op in ops {
                let json = serde_json::to_string(op)?;
                writeln!(file, "{json}").map_err(|e| io_err(&tmp, e))?;
            }
            file.sync_all().map_err(|e| io_err(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> JournalError {
    JournalError::Io { path: path.to_path_buf(), source }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
