//! Findings and the degradation rule
//!
//! A [`Finding`] is a reported issue or observation. Consequential
//! findings (CRITICAL or MAJOR) must carry at least one complete
//! [`EvidenceRecord`]; [`validate_and_degrade`] demotes the ones that do
//! not to UNCERTAIN and flags them for human review.

use crate::evidence::EvidenceRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix added to the description of a degraded finding
pub const DEGRADATION_MARKER: &str = "[INSUFFICIENT EVIDENCE]";

/// Severity of a finding, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Uncertain,
    Informational,
}

impl Severity {
    /// Whether the severity requires full-tuple evidence
    #[inline]
    #[must_use]
    pub const fn requires_evidence(self) -> bool {
        matches!(self, Self::Critical | Self::Major)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Major => "MAJOR",
            Self::Minor => "MINOR",
            Self::Uncertain => "UNCERTAIN",
            Self::Informational => "INFORMATIONAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Self::Critical),
            "MAJOR" => Ok(Self::Major),
            "MINOR" => Ok(Self::Minor),
            "UNCERTAIN" => Ok(Self::Uncertain),
            "INFORMATIONAL" => Ok(Self::Informational),
            _ => Err(crate::ParseEnumError::new("severity", s)),
        }
    }
}

/// A reported issue or observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Stage that produced the finding
    pub source_stage: String,
    pub description: String,
    pub evidence: Vec<EvidenceRecord>,
    pub required_action: String,
    pub responsible_area: String,
    pub rule_id: String,
    pub requires_human_review: bool,
    /// Set once the degradation rule has demoted this finding
    #[serde(default)]
    pub degraded: bool,
}

impl Finding {
    /// Create a finding without evidence
    #[must_use]
    pub fn new(
        severity: Severity,
        source_stage: impl Into<String>,
        rule_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source_stage: source_stage.into(),
            description: description.into(),
            evidence: Vec::new(),
            required_action: String::new(),
            responsible_area: String::new(),
            rule_id: rule_id.into(),
            requires_human_review: false,
            degraded: false,
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: EvidenceRecord) -> Self {
        self.evidence.push(evidence);
        self
    }

    #[must_use]
    pub fn with_all_evidence(mut self, evidence: impl IntoIterator<Item = EvidenceRecord>) -> Self {
        self.evidence.extend(evidence);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.required_action = action.into();
        self
    }

    #[must_use]
    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.responsible_area = area.into();
        self
    }

    #[must_use]
    pub fn needs_review(mut self) -> Self {
        self.requires_human_review = true;
        self
    }

    /// Whether at least one attached record carries the full citation tuple
    #[must_use]
    pub fn has_sufficient_evidence(&self) -> bool {
        self.evidence.iter().any(EvidenceRecord::is_complete)
    }

    /// Complete evidence records only
    pub fn complete_evidence(&self) -> impl Iterator<Item = &EvidenceRecord> {
        self.evidence.iter().filter(|e| e.is_complete())
    }

    /// Apply the degradation rule in place
    ///
    /// Returns `true` if this call demoted the finding. Calling it again on
    /// the same finding is a no-op.
    pub fn degrade_if_unsupported(&mut self) -> bool {
        if !self.severity.requires_evidence() || self.has_sufficient_evidence() {
            return false;
        }
        self.severity = Severity::Uncertain;
        self.requires_human_review = true;
        self.degraded = true;
        if !self.description.starts_with(DEGRADATION_MARKER) {
            self.description = format!("{DEGRADATION_MARKER} {}", self.description);
        }
        true
    }
}

/// Validate a finding, degrading it if it lacks sufficient evidence
///
/// Pure apart from the documented in-place mutation; never fails and is
/// idempotent.
#[must_use]
pub fn validate_and_degrade(mut finding: Finding) -> Finding {
    finding.degrade_if_unsupported();
    finding
}

/// Apply [`validate_and_degrade`] to every finding of a slice in place
///
/// Returns the number of findings demoted by this pass.
pub fn validate_all(findings: &mut [Finding]) -> usize {
    findings
        .iter_mut()
        .map(Finding::degrade_if_unsupported)
        .filter(|demoted| *demoted)
        .count()
}

/// Findings partitioned by severity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityBuckets {
    pub critical: Vec<Finding>,
    pub major: Vec<Finding>,
    pub minor: Vec<Finding>,
    pub uncertain: Vec<Finding>,
    pub informational: Vec<Finding>,
}

impl SeverityBuckets {
    #[must_use]
    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts {
            critical: self.critical.len(),
            major: self.major.len(),
            minor: self.minor.len(),
            uncertain: self.uncertain.len(),
            informational: self.informational.len(),
        }
    }
}

/// Number of findings per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
    pub uncertain: usize,
    pub informational: usize,
}

impl SeverityCounts {
    /// Count severities without cloning findings
    #[must_use]
    pub fn of(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for f in findings {
            match f.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Major => counts.major += 1,
                Severity::Minor => counts.minor += 1,
                Severity::Uncertain => counts.uncertain += 1,
                Severity::Informational => counts.informational += 1,
            }
        }
        counts
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.critical + self.major + self.minor + self.uncertain + self.informational
    }
}

/// Partition findings by severity, preserving their relative order
#[must_use]
pub fn classify_severity_bucket(findings: &[Finding]) -> SeverityBuckets {
    let mut buckets = SeverityBuckets::default();
    for f in findings {
        let bucket = match f.severity {
            Severity::Critical => &mut buckets.critical,
            Severity::Major => &mut buckets.major,
            Severity::Minor => &mut buckets.minor,
            Severity::Uncertain => &mut buckets.uncertain,
            Severity::Informational => &mut buckets.informational,
        };
        bucket.push(f.clone());
    }
    buckets
}
