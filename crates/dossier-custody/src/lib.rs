//! Dossier Custody Chain
//!
//! Immutable, hash-verified storage for the source documents of a case.
//!
//! - [`CustodyChain::ingest`]: copy, hash and record a source file
//! - [`CustodyChain::verify`]: recompute a stored copy's hash
//! - [`CustodyLedger`]: append-only, hash-chained NDJSON intake ledger
//!
//! # Example
//!
//! ```rust,ignore
//! use dossier_custody::CustodyChain;
//!
//! let chain = CustodyChain::open("/var/lib/dossier/store")?;
//! let record = chain.ingest(Path::new("case/contract.pdf"), "CASE-001")?;
//! assert!(chain.verify(&record.custody_id));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod chain;
mod error;
mod hash;
mod ledger;
mod record;

pub use chain::{verify_record, CustodyChain, LEDGER_FILE};
pub use error::{IngestError, LedgerError};
pub use hash::{ChainHasher, HashError, Sha256Digest};
pub use ledger::{verify_file as verify_ledger_file, CustodyLedger, LedgerEntry, INGEST_EVENT};
pub use record::{CustodyId, CustodyRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
