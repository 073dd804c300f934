//! Error types for the review pipeline
//!
//! Only [`ReviewError`] ever leaves [`crate::Orchestrator::review`]. Every
//! other type here is converted into a finding or an abstained field so a
//! run always ends with a decision.

use crate::decision::ReviewState;
use crate::stages::StageId;
use dossier_custody::IngestError;
use dossier_evidence::Finding;
use dossier_trace::{RunId, TraceError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main review error type
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Custody intake failed before any stage ran
    #[error("intake failed: {0}")]
    Intake(#[from] IngestError),

    #[error("cannot read case folder {path}: {source}")]
    CaseFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("case folder {0} contains no documents")]
    EmptyCase(PathBuf),

    #[error("trace log error: {0}")]
    Trace(#[from] TraceError),

    #[error("custody store error: {0}")]
    Store(#[from] dossier_custody::LedgerError),

    /// Run aborted between stages; carries the findings gathered so far
    #[error("run {run_id} aborted before stage {next_stage}")]
    Aborted {
        run_id: RunId,
        next_stage: String,
        findings: Vec<Finding>,
    },

    #[error("illegal state transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("cannot persist report to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReviewError {
    /// Errors that stop a review before any analysis stage has run
    #[inline]
    #[must_use]
    pub fn is_fatal_before_stages(&self) -> bool {
        matches!(
            self,
            Self::Intake(_) | Self::CaseFolder { .. } | Self::EmptyCase(_) | Self::Store(_)
        )
    }

    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Transition not allowed by the review state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{from} -> {to}")]
pub struct TransitionError {
    pub from: ReviewState,
    pub to: ReviewState,
}

/// Upstream text extraction produced nothing usable
///
/// Never raised to the caller: the document's required fields become
/// abstained placeholders instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionFailure {
    #[error("{file}: unreadable ({reason})")]
    Unreadable { file: String, reason: String },

    #[error("{file}: no text extracted")]
    Empty { file: String },

    #[error("{file}: unsupported format")]
    Unsupported { file: String },
}

impl ExtractionFailure {
    #[must_use]
    pub fn unreadable(file: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreadable {
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}

/// A stage could not complete; recorded as a CRITICAL finding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stage {stage} failed: {cause}")]
pub struct StageFailure {
    pub stage: StageId,
    pub cause: String,
}

impl StageFailure {
    #[must_use]
    pub fn new(stage: StageId, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

/// External registry gave no usable answer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Inconclusive {
    #[error("{registry}: lookup of {identifier} timed out after {after_ms} ms")]
    Timeout {
        registry: String,
        identifier: String,
        after_ms: u64,
    },

    #[error("{registry}: unavailable ({reason})")]
    Unavailable { registry: String, reason: String },

    #[error("{registry}: {identifier} not found")]
    NotFound { registry: String, identifier: String },
}

impl Inconclusive {
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Registry that produced this result
    #[must_use]
    pub fn registry(&self) -> &str {
        match self {
            Self::Timeout { registry, .. }
            | Self::Unavailable { registry, .. }
            | Self::NotFound { registry, .. } => registry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_message_names_stage() {
        let f = StageFailure::new(StageId::Coherence, "index out of range");
        assert_eq!(f.to_string(), "stage coherence failed: index out of range");
    }

    #[test]
    fn only_intake_errors_are_fatal_before_stages() {
        let intake = ReviewError::EmptyCase(PathBuf::from("case"));
        assert!(intake.is_fatal_before_stages());
        let aborted = ReviewError::Aborted {
            run_id: RunId::new(),
            next_stage: "coherence".into(),
            findings: Vec::new(),
        };
        assert!(!aborted.is_fatal_before_stages());
        assert!(aborted.is_aborted());
    }

    #[test]
    fn timeout_is_distinguished() {
        let t = Inconclusive::Timeout {
            registry: "rues".into(),
            identifier: "900".into(),
            after_ms: 10,
        };
        assert!(t.is_timeout());
        assert_eq!(t.registry(), "rues");
        let u = Inconclusive::Unavailable {
            registry: "rues".into(),
            reason: "503".into(),
        };
        assert!(!u.is_timeout());
    }
}
