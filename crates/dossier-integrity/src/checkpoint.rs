//! Integrity checkpoint
//!
//! Aggregates per-field trust into one OK / WARNING / CRITICAL verdict for
//! a case file. Steps run in a fixed order:
//!
//! 1. every field goes through the [`AbstentionPolicy`]
//! 2. existing findings are re-validated (degradation rule)
//! 3. structural completeness per expected document group
//! 4. natural-key uniqueness
//! 5. arithmetic consistency
//!
//! A CRITICAL verdict carries a [`HaltSignal`]. The checkpoint never stops
//! anything itself; the caller decides whether to act on the signal.

use crate::abstention::AbstentionPolicy;
use crate::profile::CalibrationProfile;
use crate::rules::{check_arithmetic, check_structure, check_uniqueness, CaseExpectations, CHECKPOINT_STAGE};
use dossier_evidence::{
    validate_all, EvidenceRecord, ExtractedField, ExtractionStatus, Finding, Severity,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Rule id of the finding raised when a run halts on the checkpoint
pub const HALT_RULE: &str = "CHK-HALT-001";
/// Rule id cited when the checkpoint halts without a better source
pub const CHECKPOINT_RULE: &str = "CHK-000";

/// Aggregate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointStatus {
    Ok,
    Warning,
    Critical,
}

impl CheckpointStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommendation to stop the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltSignal {
    pub reason: String,
    /// Complete evidence of the findings that triggered the halt
    pub evidence: Vec<EvidenceRecord>,
}

impl HaltSignal {
    /// CRITICAL finding recording that the run stopped on this signal
    #[must_use]
    pub fn to_finding(&self) -> Finding {
        Finding::new(
            Severity::Critical,
            CHECKPOINT_STAGE,
            HALT_RULE,
            format!("Review halted by integrity checkpoint: {}", self.reason),
        )
        .with_all_evidence(self.evidence.iter().cloned())
        .with_action("Resolve the cited integrity problems and resubmit the case file")
        .with_area("case intake")
        .needs_review()
    }
}

/// Counters behind a verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub total_fields: usize,
    pub abstained_fields: usize,
    pub incomplete_fields: usize,
    pub abstention_rate: f64,
    pub structural_failures: usize,
    pub duplicate_keys: usize,
    pub arithmetic_failures: usize,
    /// Existing findings demoted by this pass
    pub degraded_findings: usize,
}

/// Output of one checkpoint evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointReport {
    pub status: CheckpointStatus,
    pub halt: Option<HaltSignal>,
    pub summary: CheckpointSummary,
    /// Fields after abstention, index-aligned with the input
    pub fields: Vec<ExtractedField>,
    pub statuses: Vec<ExtractionStatus>,
    /// Findings raised by this evaluation
    pub findings: Vec<Finding>,
}

impl CheckpointReport {
    #[must_use]
    pub fn should_halt(&self) -> bool {
        self.halt.is_some()
    }
}

/// Aggregate integrity gate
#[derive(Debug, Clone)]
pub struct IntegrityCheckpoint<'a> {
    profile: &'a CalibrationProfile,
}

impl<'a> IntegrityCheckpoint<'a> {
    #[must_use]
    pub fn new(profile: &'a CalibrationProfile) -> Self {
        Self { profile }
    }

    /// Evaluate a case's fields and findings
    ///
    /// `existing` is re-validated in place; new findings are returned in
    /// the report and never mixed into `existing`.
    #[must_use]
    pub fn evaluate(
        &self,
        fields: Vec<ExtractedField>,
        existing: &mut [Finding],
        expectations: &CaseExpectations,
    ) -> CheckpointReport {
        let thresholds = self.profile.checkpoint;
        let batch = AbstentionPolicy::new(self.profile).evaluate_batch(fields);
        let degraded_findings = validate_all(existing);

        let structural = check_structure(&batch.fields, expectations);
        let duplicates = check_uniqueness(&batch.fields, expectations);
        let arithmetic = check_arithmetic(&batch.fields, expectations, thresholds.amount_tolerance);

        let total_fields = batch.fields.len();
        let abstained_fields = batch.abstained_count();
        #[allow(clippy::cast_precision_loss)]
        let abstention_rate = if total_fields == 0 {
            0.0
        } else {
            abstained_fields as f64 / total_fields as f64
        };
        let summary = CheckpointSummary {
            total_fields,
            abstained_fields,
            incomplete_fields: batch.incomplete_count(),
            abstention_rate,
            structural_failures: structural.len(),
            duplicate_keys: duplicates.len(),
            arithmetic_failures: arithmetic.len(),
            degraded_findings,
        };

        let mut reasons = Vec::new();
        let mut trigger_evidence: Vec<EvidenceRecord> = Vec::new();
        let mut status = CheckpointStatus::Ok;

        if abstention_rate >= thresholds.critical_abstention_rate && abstained_fields > 0 {
            status = CheckpointStatus::Critical;
            reasons.push(format!(
                "abstention rate {abstention_rate:.2} reaches critical threshold {:.2}",
                thresholds.critical_abstention_rate
            ));
            trigger_evidence.extend(complete_evidence(&batch.findings));
        }
        if !structural.is_empty() {
            status = CheckpointStatus::Critical;
            reasons.push(format!("{} document group(s) below their minimum", structural.len()));
            trigger_evidence.extend(complete_evidence(&structural));
        }
        if arithmetic.len() > thresholds.critical_arithmetic_failures {
            status = CheckpointStatus::Critical;
            reasons.push(format!(
                "{} arithmetic failure(s) exceed critical count {}",
                arithmetic.len(),
                thresholds.critical_arithmetic_failures
            ));
            trigger_evidence.extend(complete_evidence(&arithmetic));
        }
        if status == CheckpointStatus::Ok
            && ((abstention_rate >= thresholds.warning_abstention_rate && abstained_fields > 0)
                || arithmetic.len() > thresholds.warning_arithmetic_failures)
        {
            status = CheckpointStatus::Warning;
        }

        let halt = (status == CheckpointStatus::Critical).then(|| {
            if trigger_evidence.is_empty() {
                trigger_evidence.push(
                    expectations
                        .inventory
                        .evidence(CHECKPOINT_RULE, "legible source documents"),
                );
            }
            HaltSignal {
                reason: reasons.join("; "),
                evidence: trigger_evidence,
            }
        });

        let mut findings = batch.findings;
        findings.extend(structural);
        findings.extend(duplicates);
        findings.extend(arithmetic);
        validate_all(&mut findings);

        match status {
            CheckpointStatus::Ok => debug!(
                total_fields,
                abstained_fields, "integrity checkpoint OK"
            ),
            CheckpointStatus::Warning => info!(
                total_fields,
                abstained_fields,
                arithmetic_failures = summary.arithmetic_failures,
                "integrity checkpoint WARNING"
            ),
            CheckpointStatus::Critical => warn!(
                total_fields,
                abstained_fields,
                structural_failures = summary.structural_failures,
                reason = halt.as_ref().map_or("", |h| h.reason.as_str()),
                "integrity checkpoint CRITICAL"
            ),
        }

        CheckpointReport {
            status,
            halt,
            summary,
            fields: batch.fields,
            statuses: batch.statuses,
            findings,
        }
    }
}

fn complete_evidence(findings: &[Finding]) -> impl Iterator<Item = EvidenceRecord> + '_ {
    findings.iter().flat_map(|f| f.complete_evidence().cloned())
}
