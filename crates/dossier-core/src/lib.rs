//! Dossier Core - case file review
//!
//! Reviews a folder of administrative documents and produces an auditable
//! PROCEED / PROCEED_WITH_FINDINGS / DO_NOT_PROCEED decision:
//! - Takes every document into custody before reading it
//! - Runs the eight analysis stages in a fixed order
//! - Gates the run on the integrity checkpoint after legibility
//! - Folds the findings into a decision and records the run in the trace log
//!
//! # Example
//!
//! ```rust,ignore
//! use dossier_core::{Collaborators, Orchestrator, ReviewConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReviewConfig::new().with_work_dir("/var/lib/dossier");
//! let orchestrator = Orchestrator::new(config, Collaborators::builtin())?;
//!
//! let report = orchestrator.review(std::path::Path::new("cases/LP-2024-017")).await?;
//! println!("{}", report.render_text());
//! std::process::exit(report.exit_code());
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod builtin;
pub mod case;
pub mod collaborators;
pub mod decision;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod stages;
pub mod types;

// Re-exports for convenience
pub use builtin::{KeywordClassifier, LabeledFieldExtractor, PlainTextExtractor, StaticRequirementCatalog};
pub use case::{CaseFile, Classification, DocumentCategory, DocumentNature, PageText, Regime, SourceDocument};
pub use collaborators::{
    normalize_identifier, CheckpointRules, Collaborators, DocumentClassifier, ExtractedText, FieldExtractor,
    RegistryAnswer, RegistryLookup, RegistryRouter, RegistryStatus, RequiredField, RequirementCatalog,
    RequirementSpec, TextExtractor,
};
pub use decision::{allowed_transitions, decide, validate_transition, Decision, ReviewState};
pub use error::{ExtractionFailure, Inconclusive, ReviewError, StageFailure, TransitionError};
pub use orchestrator::{AbortHandle, Orchestrator, STAGE_FAILURE_RULE, TRACE_FAILURE_RULE};
pub use report::{ReportedFinding, ReviewReport, INSUFFICIENT_EVIDENCE};
pub use stages::{standard_stages, Stage, StageContext, StageId};
pub use types::ReviewConfig;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running reviews
    pub use crate::{
        AbortHandle, Collaborators, Decision, Orchestrator, ReviewConfig, ReviewError, ReviewReport, Stage,
        StageContext, StageId,
    };
    pub use dossier_evidence::{EvidenceRecord, Finding, Severity};
    pub use dossier_integrity::{CalibrationProfile, ProfileName};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
