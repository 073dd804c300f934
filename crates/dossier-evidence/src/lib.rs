//! Dossier Evidence Model
//!
//! The shared vocabulary of the review pipeline.
//!
//! # Core Concepts
//!
//! - [`EvidenceRecord`]: file + page + literal snippet citation
//! - [`Finding`]: severity, description and supporting evidence
//! - [`ExtractedField`]: a value read from a source document
//! - [`validate_and_degrade`]: demotes unsupported CRITICAL/MAJOR findings
//!
//! # Example
//!
//! ```rust
//! use dossier_evidence::{validate_and_degrade, Finding, Severity};
//!
//! let finding = Finding::new(Severity::Critical, "coherence", "COH-001", "amounts differ");
//! let finding = validate_and_degrade(finding);
//! assert_eq!(finding.severity, Severity::Uncertain);
//! assert!(finding.requires_human_review);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod evidence;
mod field;
mod finding;

pub use evidence::{
    truncate_snippet, EvidenceBuilder, EvidenceRecord, ExtractionMethod, MAX_SNIPPET_CHARS,
};
pub use field::{ExtractedField, ExtractionStatus, FieldType};
pub use finding::{
    classify_severity_bucket, validate_all, validate_and_degrade, Finding, Severity,
    SeverityBuckets, SeverityCounts, DEGRADATION_MARKER,
};

/// Error parsing one of the model's closed enumerations from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
