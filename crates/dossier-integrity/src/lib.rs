//! Dossier Integrity
//!
//! Decides whether extracted data is trustworthy enough to drive a decision.
//!
//! - [`CalibrationProfile`]: every threshold, as named presets or JSON documents
//! - [`AbstentionPolicy`]: per-field LEGIBLE / INCOMPLETE / ILLEGIBLE
//! - [`IntegrityCheckpoint`]: case-level OK / WARNING / CRITICAL with a halt signal
//!
//! # Example
//!
//! ```rust
//! use dossier_evidence::{ExtractedField, FieldType};
//! use dossier_integrity::{AbstentionPolicy, CalibrationProfile};
//!
//! let profile = CalibrationProfile::default();
//! let field = ExtractedField::new("tax_id", FieldType::Identifier, "900123456", "rut.txt", 1)
//!     .with_confidence(0.2)
//!     .with_snippet("NIT 900123456");
//! let outcome = AbstentionPolicy::new(&profile).evaluate(field);
//! assert!(outcome.field.value.is_none());
//! assert!(outcome.finding.is_some());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod abstention;
mod amount;
mod checkpoint;
mod profile;
mod rules;

pub use abstention::{AbstentionOutcome, AbstentionPolicy, BatchAssessment, ABSTENTION_RULE, ABSTENTION_STAGE};
pub use amount::{amounts_agree, parse_amount};
pub use checkpoint::{
    CheckpointReport, CheckpointStatus, CheckpointSummary, HaltSignal, IntegrityCheckpoint, CHECKPOINT_RULE,
    HALT_RULE,
};
pub use profile::{
    CalibrationProfile, CheckpointThresholds, FieldThreshold, ProfileDocument, ProfileError, ProfileName,
};
pub use rules::{
    check_arithmetic, check_structure, check_uniqueness, CaseExpectations, CaseInventory, GroupExpectation, SumRule,
    UniqueKey, CHECKPOINT_STAGE, UNIQUENESS_RULE,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
