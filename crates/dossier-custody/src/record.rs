//! Custody records

use crate::hash::Sha256Digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use ulid::Ulid;

/// Unique custody identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustodyId(pub Ulid);

impl CustodyId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for CustodyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CustodyId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Immutable record of one ingested source file
///
/// Created once at ingestion and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyRecord {
    pub custody_id: CustodyId,
    pub case_id: String,
    pub original_path: PathBuf,
    pub stored_copy_path: PathBuf,
    pub sha256: Sha256Digest,
    pub size_bytes: u64,
    pub ingestion_timestamp: DateTime<Utc>,
}

impl CustodyRecord {
    /// File name of the original source, as cited in evidence
    #[must_use]
    pub fn file_name(&self) -> String {
        self.original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.original_path.to_string_lossy().into_owned())
    }
}
