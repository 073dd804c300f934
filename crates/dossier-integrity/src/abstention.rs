//! Abstention policy
//!
//! Decides per extracted field whether to trust it (LEGIBLE), keep it with
//! reduced trust (INCOMPLETE) or formally abstain (ILLEGIBLE). Abstaining
//! replaces the field with its null counterpart and emits exactly one
//! INFORMATIONAL finding citing where the value was read. This is the only
//! path by which a null value enters downstream logic.
//!
//! The policy holds no state: identical fields and thresholds always yield
//! identical outcomes.

use crate::profile::CalibrationProfile;
use dossier_evidence::{EvidenceRecord, ExtractedField, ExtractionStatus, Finding, Severity};

/// Stage name recorded on abstention findings
pub const ABSTENTION_STAGE: &str = "abstention_policy";
/// Rule id of abstention findings
pub const ABSTENTION_RULE: &str = "ABST-001";

/// Result of evaluating one field
#[derive(Debug, Clone, PartialEq)]
pub struct AbstentionOutcome {
    /// The original field, or its abstained replacement
    pub field: ExtractedField,
    pub status: ExtractionStatus,
    /// Present only when this evaluation abstained
    pub finding: Option<Finding>,
}

/// Result of evaluating a batch, index-aligned with the input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchAssessment {
    pub fields: Vec<ExtractedField>,
    pub statuses: Vec<ExtractionStatus>,
    pub findings: Vec<Finding>,
}

impl BatchAssessment {
    /// Fields that ended up abstained, whether in this pass or earlier
    #[must_use]
    pub fn abstained_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s == ExtractionStatus::Illegible)
            .count()
    }

    #[must_use]
    pub fn incomplete_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s == ExtractionStatus::Incomplete)
            .count()
    }

    /// Split into the `(fields', findings)` pair
    #[must_use]
    pub fn into_parts(self) -> (Vec<ExtractedField>, Vec<Finding>) {
        (self.fields, self.findings)
    }
}

/// Type-specific threshold policy
#[derive(Debug, Clone)]
pub struct AbstentionPolicy<'a> {
    profile: &'a CalibrationProfile,
}

impl<'a> AbstentionPolicy<'a> {
    #[must_use]
    pub fn new(profile: &'a CalibrationProfile) -> Self {
        Self { profile }
    }

    /// Legibility verdict without side products
    ///
    /// Empty values and fields abstained earlier are ILLEGIBLE regardless
    /// of their confidence. A confident value backed by a snippet shorter
    /// than the type's minimum is only INCOMPLETE.
    #[must_use]
    pub fn classify(&self, field: &ExtractedField) -> ExtractionStatus {
        let t = self.profile.threshold_for(field.field_type);
        if field.is_abstained() || !field.is_populated() || field.confidence < t.abstain {
            ExtractionStatus::Illegible
        } else if field.confidence >= t.accept && field.snippet.chars().count() >= t.min_snippet_chars {
            ExtractionStatus::Legible
        } else {
            ExtractionStatus::Incomplete
        }
    }

    /// Evaluate one field
    #[must_use]
    pub fn evaluate(&self, field: ExtractedField) -> AbstentionOutcome {
        let status = self.classify(&field);
        if status != ExtractionStatus::Illegible || field.is_abstained() {
            return AbstentionOutcome {
                field,
                status,
                finding: None,
            };
        }
        let finding = self.abstention_finding(&field);
        AbstentionOutcome {
            field: field.abstained(),
            status,
            finding: Some(finding),
        }
    }

    /// Evaluate every field, preserving order
    #[must_use]
    pub fn evaluate_batch(&self, fields: Vec<ExtractedField>) -> BatchAssessment {
        let mut out = BatchAssessment {
            fields: Vec::with_capacity(fields.len()),
            statuses: Vec::with_capacity(fields.len()),
            findings: Vec::new(),
        };
        for field in fields {
            let outcome = self.evaluate(field);
            out.fields.push(outcome.field);
            out.statuses.push(outcome.status);
            out.findings.extend(outcome.finding);
        }
        out
    }

    fn abstention_finding(&self, field: &ExtractedField) -> Finding {
        let t = self.profile.threshold_for(field.field_type);
        let reason = if field.is_populated() {
            format!(
                "confidence {:.2} below abstain threshold {:.2} for {} fields",
                field.confidence, t.abstain, field.field_type
            )
        } else {
            "no usable value was extracted".to_string()
        };
        let evidence = EvidenceRecord::builder(field.source_file.clone())
            .page(field.page)
            .snippet(&field.snippet)
            .expected(field.field_type.as_str())
            .method(field.extraction_method)
            .confidence(field.confidence)
            .rule(ABSTENTION_RULE)
            .build();
        Finding::new(
            Severity::Informational,
            ABSTENTION_STAGE,
            ABSTENTION_RULE,
            format!("Abstained on field '{}': {reason}", field.field_name),
        )
        .with_evidence(evidence)
        .with_action("Read the value manually from the cited source page")
        .with_area(if field.group.is_empty() { "document review" } else { field.group.as_str() })
        .needs_review()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::FieldThreshold;
    use dossier_evidence::{ExtractionMethod, FieldType};

    fn profile() -> CalibrationProfile {
        CalibrationProfile::default().with_field_threshold(FieldType::Identifier, FieldThreshold::new(0.8, 0.6, 4))
    }

    fn id_field(confidence: f64) -> ExtractedField {
        ExtractedField::new("contract_number", FieldType::Identifier, "CT-2024-118", "contract.txt", 1)
            .with_confidence(confidence)
            .with_snippet("Contract No. CT-2024-118")
            .in_group("contract")
    }

    #[test]
    fn high_confidence_is_legible() {
        let p = profile();
        let out = AbstentionPolicy::new(&p).evaluate(id_field(0.9));
        assert_eq!(out.status, ExtractionStatus::Legible);
        assert_eq!(out.field.value.as_deref(), Some("CT-2024-118"));
        assert!(out.finding.is_none());
    }

    #[test]
    fn between_thresholds_is_incomplete_and_kept() {
        let p = profile();
        let out = AbstentionPolicy::new(&p).evaluate(id_field(0.7));
        assert_eq!(out.status, ExtractionStatus::Incomplete);
        assert!(out.field.value.is_some());
        assert!(out.finding.is_none());
    }

    #[test]
    fn accept_boundary_is_inclusive() {
        let p = profile();
        assert_eq!(AbstentionPolicy::new(&p).classify(&id_field(0.8)), ExtractionStatus::Legible);
        assert_eq!(AbstentionPolicy::new(&p).classify(&id_field(0.6)), ExtractionStatus::Incomplete);
    }

    #[test]
    fn below_abstain_is_replaced_with_one_informational_finding() {
        let p = profile();
        let out = AbstentionPolicy::new(&p).evaluate(id_field(0.55));
        assert_eq!(out.status, ExtractionStatus::Illegible);
        assert_eq!(out.field.value, None);
        assert!(out.field.confidence.abs() < f64::EPSILON);
        assert_eq!(out.field.extraction_method, ExtractionMethod::Abstention);

        let finding = out.finding.unwrap();
        assert_eq!(finding.severity, Severity::Informational);
        assert_eq!(finding.evidence.len(), 1);
        let ev = &finding.evidence[0];
        assert_eq!(ev.source_file(), "contract.txt");
        assert_eq!(ev.page(), 1);
        assert_eq!(ev.snippet(), "Contract No. CT-2024-118");
        assert!(ev.detected_value().is_empty());
    }

    #[test]
    fn short_snippet_caps_at_incomplete() {
        let p = profile();
        let f = id_field(0.95).with_snippet("CT");
        assert_eq!(AbstentionPolicy::new(&p).classify(&f), ExtractionStatus::Incomplete);
    }

    #[test]
    fn empty_value_is_abstained_even_when_confident() {
        let p = profile();
        let mut f = id_field(0.99);
        f.value = Some(String::new());
        assert_eq!(AbstentionPolicy::new(&p).evaluate(f).status, ExtractionStatus::Illegible);
    }

    #[test]
    fn reevaluating_abstained_field_adds_no_finding() {
        let p = profile();
        let policy = AbstentionPolicy::new(&p);
        let first = policy.evaluate(id_field(0.1));
        let second = policy.evaluate(first.field.clone());
        assert_eq!(second.status, ExtractionStatus::Illegible);
        assert!(second.finding.is_none());
        assert_eq!(second.field, first.field);
    }

    #[test]
    fn batch_is_index_aligned() {
        let p = profile();
        let batch = AbstentionPolicy::new(&p).evaluate_batch(vec![id_field(0.9), id_field(0.2), id_field(0.7)]);
        assert_eq!(
            batch.statuses,
            vec![ExtractionStatus::Legible, ExtractionStatus::Illegible, ExtractionStatus::Incomplete]
        );
        assert_eq!(batch.findings.len(), 1);
        assert_eq!(batch.abstained_count(), 1);
        assert_eq!(batch.incomplete_count(), 1);
        assert!(batch.fields[1].is_abstained());
    }
}
