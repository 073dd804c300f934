//! Error types for the custody chain
//!
//! - [`IngestError`]: intake of a source file failed (fatal for a run)
//! - [`LedgerError`]: reading or appending the intake ledger failed

use crate::hash::Sha256Digest;
use std::path::PathBuf;

/// Errors during ingestion of a source file
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Source file missing, unreadable or not a regular file
    #[error("source unreadable {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store directory or stored copy could not be written
    #[error("destination not writable {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The written copy does not hash to the source digest
    #[error("stored copy hash mismatch: expected {expected}, got {actual}")]
    CopyMismatch {
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    /// Case id cannot be used as a store directory name
    #[error("invalid case id: '{0}'")]
    InvalidCaseId(String),

    /// The intake record could not be appended
    #[error("ledger append failed: {0}")]
    Ledger(#[from] LedgerError),
}

impl IngestError {
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            source,
        }
    }

    pub fn unwritable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DestinationUnwritable {
            path: path.into(),
            source,
        }
    }
}

/// Errors reading, appending or verifying the ledger
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("io error on ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ledger line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A ledger entry does not link to its predecessor or its own hash is wrong
    #[error("ledger chain broken at line {line}")]
    BrokenChain { line: usize },
}

impl LedgerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
