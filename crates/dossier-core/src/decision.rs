//! Review state machine and the decision fold
//!
//! A review walks `NotStarted -> Stage(..) -> Aggregating -> Decided`.
//! Stages are visited in [`StageId::ORDER`]; the only shortcut is the
//! checkpoint halt, which jumps from the quality stage straight to
//! aggregation. `Aborted` is reachable from every non-terminal state that
//! sits between stages.

use crate::error::TransitionError;
use crate::stages::StageId;
use dossier_evidence::{Finding, SeverityCounts};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a review currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    NotStarted,
    Stage(StageId),
    Aggregating,
    Decided,
    Aborted,
}

impl ReviewState {
    /// Every state, for exhaustive checks
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut states = vec![Self::NotStarted];
        states.extend(StageId::ORDER.iter().copied().map(Self::Stage));
        states.extend([Self::Aggregating, Self::Decided, Self::Aborted]);
        states
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Decided | Self::Aborted)
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("NOT_STARTED"),
            Self::Stage(stage) => write!(f, "STAGE({stage})"),
            Self::Aggregating => f.write_str("AGGREGATING"),
            Self::Decided => f.write_str("DECIDED"),
            Self::Aborted => f.write_str("ABORTED"),
        }
    }
}

/// Validates a state transition.
///
/// # Errors
/// [`TransitionError`] when `to` is not reachable from `from` in one step
pub fn validate_transition(from: ReviewState, to: ReviewState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: ReviewState) -> Vec<ReviewState> {
    use ReviewState::{Aborted, Aggregating, Decided, NotStarted, Stage};
    match from {
        NotStarted => vec![Stage(StageId::Classification), Aborted],
        Stage(stage) => match stage.next() {
            None => vec![Aggregating],
            // checkpoint halt
            Some(next) if stage == StageId::Quality => vec![Stage(next), Aggregating, Aborted],
            Some(next) => vec![Stage(next), Aborted],
        },
        Aggregating => vec![Decided],
        Decided | Aborted => vec![],
    }
}

/// Terminal outcome of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Proceed,
    ProceedWithFindings,
    DoNotProceed,
}

impl Decision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proceed => "PROCEED",
            Self::ProceedWithFindings => "PROCEED_WITH_FINDINGS",
            Self::DoNotProceed => "DO_NOT_PROCEED",
        }
    }

    /// Process exit code reported by the command line
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Proceed => 0,
            Self::ProceedWithFindings => 1,
            Self::DoNotProceed => 2,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fold a finding set into a decision
///
/// Any CRITICAL blocks, otherwise any MAJOR proceeds with findings. Only
/// severities count, so order and duplicates never change the result.
#[must_use]
pub fn decide(findings: &[Finding]) -> Decision {
    let counts = SeverityCounts::of(findings);
    if counts.critical > 0 {
        Decision::DoNotProceed
    } else if counts.major > 0 {
        Decision::ProceedWithFindings
    } else {
        Decision::Proceed
    }
}
