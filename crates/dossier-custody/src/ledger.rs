//! Append-only intake ledger
//!
//! One JSON object per line. Every entry links to the previous entry's
//! hash, so editing or dropping a line breaks [`CustodyLedger::verify_chain`].

use crate::error::LedgerError;
use crate::hash::{ChainHasher, Sha256Digest};
use crate::record::{CustodyId, CustodyRecord};
use fs4::fs_std::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Event kind written on every intake line
pub const INGEST_EVENT: &str = "custody.ingest";

/// One ledger line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub event: String,
    #[serde(flatten)]
    pub record: CustodyRecord,
    pub prev_hash: Sha256Digest,
    pub hash: Sha256Digest,
}

#[derive(Debug, Default)]
struct LedgerState {
    index: HashMap<CustodyId, CustodyRecord>,
}

impl LedgerState {
    fn absorb(&mut self, entries: Vec<LedgerEntry>) {
        for entry in entries {
            self.index.insert(entry.record.custody_id, entry.record);
        }
    }
}

/// Append-only ledger file
///
/// Appends take an exclusive `flock` on the file and chain from the last
/// line on disk, so several ledgers (in this process or others) can share
/// one store.
#[derive(Debug)]
pub struct CustodyLedger {
    path: PathBuf,
    inner: Mutex<LedgerState>,
}

impl CustodyLedger {
    /// Open (or create) the ledger at `path`, indexing existing entries
    ///
    /// # Errors
    /// Fails if the file cannot be read or a line is malformed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut state = LedgerState::default();
        state.absorb(read_entries(&path)?);
        Ok(Self {
            path,
            inner: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; the whole line is written with a single call
    ///
    /// A line that cannot be written and synced is truncated away, so the
    /// file never ends in an entry the caller was told failed.
    ///
    /// # Errors
    /// Fails if the file cannot be locked, read, written or synced
    pub fn append(&self, record: &CustodyRecord) -> Result<LedgerEntry, LedgerError> {
        let mut guard = self.inner.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::io(&self.path, e))?;
        // released when `file` is closed
        FileExt::lock_exclusive(&file).map_err(|e| LedgerError::io(&self.path, e))?;

        let entries = read_entries(&self.path)?;
        let prev_hash = entries.last().map_or_else(Sha256Digest::zero, |e| e.hash);
        guard.absorb(entries);

        let mut entry = LedgerEntry {
            event: INGEST_EVENT.to_string(),
            record: record.clone(),
            prev_hash,
            hash: Sha256Digest::zero(),
        };
        entry.hash = compute_hash(&entry);

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let len_before = file.metadata().map_err(|e| LedgerError::io(&self.path, e))?.len();
        if let Err(e) = file.write_all(&line).and_then(|()| file.sync_data()) {
            if let Err(undo) = file.set_len(len_before) {
                tracing::error!("cannot truncate ledger {} after failed append: {undo}", self.path.display());
            }
            return Err(LedgerError::io(&self.path, e));
        }

        guard.index.insert(record.custody_id, record.clone());
        Ok(entry)
    }

    /// Look up a record by id, rereading the file for ids appended by
    /// other ledgers on the same store
    #[must_use]
    pub fn find(&self, custody_id: &CustodyId) -> Option<CustodyRecord> {
        let mut guard = self.inner.lock();
        if let Some(record) = guard.index.get(custody_id) {
            return Some(record.clone());
        }
        match read_entries(&self.path) {
            Ok(entries) => {
                guard.absorb(entries);
                guard.index.get(custody_id).cloned()
            }
            Err(e) => {
                tracing::warn!(%custody_id, "cannot reread ledger: {e}");
                None
            }
        }
    }

    /// Every record in the ledger, in ingestion order
    ///
    /// # Errors
    /// Fails if the ledger cannot be read
    pub fn records(&self) -> Result<Vec<CustodyRecord>, LedgerError> {
        let _guard = self.inner.lock();
        Ok(read_entries(&self.path)?.into_iter().map(|e| e.record).collect())
    }

    /// All records of a case, in ingestion order
    ///
    /// # Errors
    /// Fails if the ledger cannot be read
    pub fn records_for_case(&self, case_id: &str) -> Result<Vec<CustodyRecord>, LedgerError> {
        Ok(self.records()?.into_iter().filter(|r| r.case_id == case_id).collect())
    }

    /// Check every link of the chain, returning the number of entries
    ///
    /// # Errors
    /// [`LedgerError::BrokenChain`] with the 1-based line of the first bad entry
    pub fn verify_chain(&self) -> Result<usize, LedgerError> {
        let _guard = self.inner.lock();
        verify_file(&self.path)
    }
}

/// Verify a ledger file without opening it for writing
///
/// # Errors
/// See [`CustodyLedger::verify_chain`]
pub fn verify_file(path: &Path) -> Result<usize, LedgerError> {
    let entries = read_entries(path)?;
    let mut prev = Sha256Digest::zero();
    for (i, e) in entries.iter().enumerate() {
        if e.prev_hash != prev || e.hash != compute_hash(e) {
            return Err(LedgerError::BrokenChain { line: i + 1 });
        }
        prev = e.hash;
    }
    Ok(entries.len())
}

fn read_entries(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LedgerError::io(path, e)),
    };
    let mut entries = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| LedgerError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line)
            .map_err(|source| LedgerError::Malformed { line: i + 1, source })?;
        entries.push(entry);
    }
    Ok(entries)
}

fn compute_hash(entry: &LedgerEntry) -> Sha256Digest {
    let r = &entry.record;
    ChainHasher::new()
        .str(&entry.event)
        .str(&r.custody_id.to_string())
        .str(&r.case_id)
        .str(&r.original_path.to_string_lossy())
        .str(&r.stored_copy_path.to_string_lossy())
        .digest(&r.sha256)
        .u64(r.size_bytes)
        .str(&r.ingestion_timestamp.to_rfc3339())
        .digest(&entry.prev_hash)
        .finish()
}
