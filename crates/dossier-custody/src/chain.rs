//! Custody chain
//!
//! Ingests source files into a store directory as read-only, hash-verified
//! copies and records each intake in the [`CustodyLedger`].
//!
//! Store layout:
//!
//! ```text
//! <store>/custody-ledger.jsonl
//! <store>/<case_id>/<custody_id>-<file name>
//! ```

use crate::error::{IngestError, LedgerError};
use crate::hash::Sha256Digest;
use crate::ledger::CustodyLedger;
use crate::record::{CustodyId, CustodyRecord};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ledger file name inside the store
pub const LEDGER_FILE: &str = "custody-ledger.jsonl";

/// Immutable storage for source documents
#[derive(Debug)]
pub struct CustodyChain {
    store_root: PathBuf,
    ledger: CustodyLedger,
}

impl CustodyChain {
    /// Open the store at `store_root`, creating it if needed
    ///
    /// # Errors
    /// Fails if the directory cannot be created or the ledger cannot be read
    pub fn open(store_root: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let store_root = store_root.into();
        fs::create_dir_all(&store_root).map_err(|e| LedgerError::io(&store_root, e))?;
        let ledger = CustodyLedger::open(store_root.join(LEDGER_FILE))?;
        Ok(Self { store_root, ledger })
    }

    #[must_use]
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    #[must_use]
    pub fn ledger(&self) -> &CustodyLedger {
        &self.ledger
    }

    /// Ingest `source` for `case_id`
    ///
    /// Copy, hash, then record. Any failing step removes the partial copy,
    /// so a source is either fully ingested or not at all.
    ///
    /// # Errors
    /// [`IngestError`] if the source is unreadable, the store is not
    /// writable, the copy does not verify or the ledger append fails.
    pub fn ingest(&self, source: &Path, case_id: &str) -> Result<CustodyRecord, IngestError> {
        validate_case_id(case_id)?;

        let meta = fs::metadata(source).map_err(|e| IngestError::unreadable(source, e))?;
        if !meta.is_file() {
            return Err(IngestError::unreadable(
                source,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        let bytes = fs::read(source).map_err(|e| IngestError::unreadable(source, e))?;
        let sha256 = Sha256Digest::compute(&bytes);

        let case_dir = self.store_root.join(case_id);
        fs::create_dir_all(&case_dir).map_err(|e| IngestError::unwritable(&case_dir, e))?;

        let custody_id = CustodyId::new();
        let partial = case_dir.join(format!(".{custody_id}.partial"));
        let stored = case_dir.join(format!("{custody_id}-{}", stored_name(source)));

        let mut guard = PartialCopy::new(partial.clone());
        write_copy(&partial, &bytes).map_err(|e| IngestError::unwritable(&partial, e))?;

        let actual = Sha256Digest::compute_file(&partial).map_err(|e| IngestError::unwritable(&partial, e))?;
        if actual != sha256 {
            return Err(IngestError::CopyMismatch {
                expected: sha256,
                actual,
            });
        }

        fs::rename(&partial, &stored).map_err(|e| IngestError::unwritable(&stored, e))?;
        guard.retarget(stored.clone());
        set_read_only(&stored).map_err(|e| IngestError::unwritable(&stored, e))?;

        let record = CustodyRecord {
            custody_id,
            case_id: case_id.to_string(),
            original_path: source.to_path_buf(),
            stored_copy_path: stored,
            sha256,
            size_bytes: bytes.len() as u64,
            ingestion_timestamp: Utc::now(),
        };
        self.ledger.append(&record)?;
        guard.disarm();

        tracing::info!(
            custody_id = %record.custody_id,
            case_id,
            sha256 = %record.sha256.short(),
            "ingested {}",
            source.display()
        );
        Ok(record)
    }

    /// Recompute the stored copy's hash and compare with the ledger
    ///
    /// Never fails: an unknown id, a missing copy or a mismatch all
    /// return `false`.
    #[must_use]
    pub fn verify(&self, custody_id: &CustodyId) -> bool {
        match self.ledger.find(custody_id) {
            Some(record) => verify_record(&record),
            None => {
                tracing::warn!(%custody_id, "custody id not in ledger");
                false
            }
        }
    }
}

/// Recompute `record.stored_copy_path`'s hash and compare with `record.sha256`
#[must_use]
pub fn verify_record(record: &CustodyRecord) -> bool {
    match Sha256Digest::compute_file(&record.stored_copy_path) {
        Ok(actual) if actual == record.sha256 => true,
        Ok(actual) => {
            tracing::warn!(
                custody_id = %record.custody_id,
                expected = %record.sha256.short(),
                actual = %actual.short(),
                "stored copy hash mismatch"
            );
            false
        }
        Err(e) => {
            tracing::warn!(custody_id = %record.custody_id, "stored copy unreadable: {e}");
            false
        }
    }
}

fn validate_case_id(case_id: &str) -> Result<(), IngestError> {
    let ok = !case_id.is_empty()
        && case_id != "."
        && case_id != ".."
        && case_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(IngestError::InvalidCaseId(case_id.to_string()))
    }
}

fn stored_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| {
            n.to_string_lossy()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
                .collect()
        })
        .unwrap_or_else(|| "source".to_string())
}

fn write_copy(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn set_read_only(path: &Path) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}

/// Removes a copy on drop unless disarmed
struct PartialCopy {
    path: Option<PathBuf>,
}

impl PartialCopy {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn retarget(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for PartialCopy {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        if let Ok(meta) = fs::metadata(&path) {
            let mut perms = meta.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = fs::set_permissions(&path, perms);
        }
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("failed to roll back partial copy {}: {e}", path.display());
            }
        }
    }
}
