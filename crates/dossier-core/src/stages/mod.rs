//! Analysis stages
//!
//! Stages run strictly in [`StageId::ORDER`]. Each one receives the
//! accumulated case file and returns only its own findings; the
//! orchestrator appends them after everything earlier stages reported.

use crate::case::CaseFile;
use crate::collaborators::{Collaborators, RegistryRouter};
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_custody::CustodyChain;
use dossier_evidence::Finding;
use dossier_integrity::CalibrationProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

mod classification;
mod coherence;
mod completeness;
mod penalty;
mod quality;
mod registry;
mod regulatory;
mod signature;

pub use classification::ClassificationStage;
pub use coherence::{CoherenceStage, CASE_WIDE_FIELDS};
pub use completeness::CompletenessStage;
pub use penalty::PenaltyStage;
pub use quality::QualityStage;
pub use registry::{RegistryStage, REGISTRY_FIELDS};
pub use regulatory::RegulatoryStage;
pub use signature::SignatureStage;

/// Identifier of an analysis stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Classification,
    Quality,
    Coherence,
    Regulatory,
    Signature,
    Completeness,
    Penalty,
    Registry,
}

impl StageId {
    /// Fixed execution order
    pub const ORDER: [StageId; 8] = [
        Self::Classification,
        Self::Quality,
        Self::Coherence,
        Self::Regulatory,
        Self::Signature,
        Self::Completeness,
        Self::Penalty,
        Self::Registry,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Quality => "quality",
            Self::Coherence => "coherence",
            Self::Regulatory => "regulatory",
            Self::Signature => "signature",
            Self::Completeness => "completeness",
            Self::Penalty => "penalty",
            Self::Registry => "registry",
        }
    }

    /// Stage following this one, `None` for the last
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let i = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(i + 1).copied()
    }

    #[must_use]
    pub fn is_last(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, read-only dependencies of every stage
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub collaborators: &'a Collaborators,
    pub profile: &'a CalibrationProfile,
    pub custody: &'a CustodyChain,
    pub router: &'a RegistryRouter,
}

/// One analysis step of a review
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    /// Analyse `case` and return this stage's findings
    ///
    /// Stages may enrich the case (classification, fields) but never touch
    /// findings already recorded.
    ///
    /// # Errors
    /// [`StageFailure`] when the stage cannot complete; the orchestrator
    /// records it as a CRITICAL finding and moves on.
    async fn run(&self, ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure>;
}

/// The eight standard stages in execution order
#[must_use]
pub fn standard_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(ClassificationStage),
        Box::new(QualityStage),
        Box::new(CoherenceStage),
        Box::new(RegulatoryStage),
        Box::new(SignatureStage),
        Box::new(CompletenessStage),
        Box::new(PenaltyStage),
        Box::new(RegistryStage),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_declared_order() {
        let mut current = Some(StageId::Classification);
        let mut walked = Vec::new();
        while let Some(stage) = current {
            walked.push(stage);
            current = stage.next();
        }
        assert_eq!(walked, StageId::ORDER.to_vec());
        assert!(StageId::Registry.is_last());
    }

    #[test]
    fn standard_stages_match_order() {
        let ids: Vec<StageId> = standard_stages().iter().map(|s| s.id()).collect();
        assert_eq!(ids, StageId::ORDER.to_vec());
    }
}
