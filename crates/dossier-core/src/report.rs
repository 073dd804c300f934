//! Final review report
//!
//! The report is the only user-facing artifact of a run. Every finding in
//! it either lists its citations or carries [`INSUFFICIENT_EVIDENCE`];
//! there is no third presentation.

use crate::case::CaseFile;
use crate::decision::Decision;
use crate::error::ReviewError;
use chrono::{DateTime, Utc};
use dossier_custody::CustodyRecord;
use dossier_evidence::{Finding, SeverityCounts};
use dossier_integrity::{CheckpointStatus, CheckpointSummary};
use dossier_trace::RunId;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Flag shown instead of citations when a finding has none
pub const INSUFFICIENT_EVIDENCE: &str = "INSUFFICIENT EVIDENCE";

/// A finding as presented to the reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedFinding {
    #[serde(flatten)]
    pub finding: Finding,
    /// `file p.N: "snippet"` for every complete evidence record
    pub citations: Vec<String>,
    /// [`INSUFFICIENT_EVIDENCE`] when `citations` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_flag: Option<String>,
}

impl ReportedFinding {
    #[must_use]
    pub fn new(finding: Finding) -> Self {
        let citations: Vec<String> = finding.complete_evidence().map(|e| e.citation()).collect();
        let evidence_flag = citations.is_empty().then(|| INSUFFICIENT_EVIDENCE.to_string());
        Self {
            finding,
            citations,
            evidence_flag,
        }
    }

    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.evidence_flag.is_some()
    }
}

/// Everything a reviewer needs to audit one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub case_id: String,
    pub run_id: RunId,
    pub profile: String,
    pub decision: Decision,
    /// Whether the integrity checkpoint cut the stages short
    pub halted: bool,
    pub checkpoint_status: Option<CheckpointStatus>,
    pub checkpoint: Option<CheckpointSummary>,
    pub counts: SeverityCounts,
    pub findings: Vec<ReportedFinding>,
    pub custody: Vec<CustodyRecord>,
    /// Trace file holding this run's events
    pub trace_file: PathBuf,
    pub generated_at: DateTime<Utc>,
}

impl ReviewReport {
    /// Assemble the report of a decided case
    #[must_use]
    pub fn new(
        case: &CaseFile,
        run_id: RunId,
        profile: impl Into<String>,
        decision: Decision,
        halted: bool,
        trace_file: PathBuf,
    ) -> Self {
        let (checkpoint_status, checkpoint) = match case.checkpoint {
            Some((status, summary)) => (Some(status), Some(summary)),
            None => (None, None),
        };
        Self {
            case_id: case.case_id.clone(),
            run_id,
            profile: profile.into(),
            decision,
            halted,
            checkpoint_status,
            checkpoint,
            counts: SeverityCounts::of(case.findings()),
            findings: case.findings().iter().cloned().map(ReportedFinding::new).collect(),
            custody: case.documents.iter().map(|d| d.custody.clone()).collect(),
            trace_file,
            generated_at: Utc::now(),
        }
    }

    /// Process exit code for this report's decision
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.decision.exit_code()
    }

    /// Plain-text rendering for terminals
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Case {} (run {})", self.case_id, self.run_id);
        let _ = writeln!(out, "Decision: {}", self.decision);
        match (&self.checkpoint_status, &self.checkpoint) {
            (Some(status), Some(summary)) => {
                let _ = writeln!(
                    out,
                    "Integrity checkpoint: {status} ({} of {} fields abstained, rate {:.2}){}",
                    summary.abstained_fields,
                    summary.total_fields,
                    summary.abstention_rate,
                    if self.halted { ", halted" } else { "" }
                );
            }
            _ => {
                let _ = writeln!(out, "Integrity checkpoint: not reached");
            }
        }
        let _ = writeln!(out, "Profile: {}", self.profile);
        let c = self.counts;
        let _ = writeln!(
            out,
            "Findings: {} critical, {} major, {} minor, {} uncertain, {} informational",
            c.critical, c.major, c.minor, c.uncertain, c.informational
        );

        for (i, reported) in self.findings.iter().enumerate() {
            let f = &reported.finding;
            let _ = writeln!(
                out,
                "\n{:>3}. [{}] {} ({}): {}",
                i + 1,
                f.severity,
                f.rule_id,
                f.source_stage,
                f.description
            );
            for citation in &reported.citations {
                let _ = writeln!(out, "     - {citation}");
            }
            if let Some(flag) = &reported.evidence_flag {
                let _ = writeln!(out, "     ! {flag}");
            }
            if !f.required_action.is_empty() {
                let _ = writeln!(out, "     action: {}", f.required_action);
            }
            if f.requires_human_review {
                let _ = writeln!(out, "     requires human review");
            }
        }

        let _ = writeln!(out, "\nCustody:");
        for record in &self.custody {
            let _ = writeln!(
                out,
                "  {} {} sha256={} ({} bytes)",
                record.custody_id,
                record.file_name(),
                record.sha256,
                record.size_bytes
            );
        }
        let _ = writeln!(out, "Trace: {}", self.trace_file.display());
        out
    }

    /// Write the report as pretty JSON
    ///
    /// Writes a temporary sibling first and renames it into place, so a
    /// reader never sees a half-written report.
    ///
    /// # Errors
    /// [`ReviewError::Persistence`] on any I/O failure,
    /// [`ReviewError::Serialization`] if the report cannot be encoded
    pub fn persist(&self, path: &Path) -> Result<(), ReviewError> {
        let json = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ReviewError::persistence(parent, e))?;
        }
        let partial = path.with_extension("json.partial");
        let written = fs::File::create(&partial).and_then(|mut file| {
            file.write_all(&json)?;
            file.write_all(b"\n")?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&partial, path)) {
            let _ = fs::remove_file(&partial);
            return Err(ReviewError::persistence(path, e));
        }
        tracing::info!(case_id = %self.case_id, run_id = %self.run_id, "report written to {}", path.display());
        Ok(())
    }

    /// Read a persisted report back
    ///
    /// # Errors
    /// I/O or decoding failure
    pub fn load(path: &Path) -> Result<Self, ReviewError> {
        let bytes = fs::read(path).map_err(|e| ReviewError::persistence(path, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_evidence::{EvidenceRecord, Severity};

    fn cited(severity: Severity) -> Finding {
        Finding::new(severity, "coherence", "COH-001", "values differ").with_evidence(
            EvidenceRecord::builder("contract.txt")
                .page(2)
                .snippet("Contract No: 45-2024")
                .detected("45-2024")
                .rule("COH-001")
                .build(),
        )
    }

    #[test]
    fn cited_findings_list_their_citations() {
        let reported = ReportedFinding::new(cited(Severity::Major));
        assert_eq!(reported.citations, vec!["contract.txt p.2: \"Contract No: 45-2024\"".to_string()]);
        assert!(!reported.is_flagged());
    }

    #[test]
    fn uncited_findings_are_flagged() {
        let reported = ReportedFinding::new(Finding::new(Severity::Uncertain, "quality", "QLT-002", "no text"));
        assert!(reported.citations.is_empty());
        assert_eq!(reported.evidence_flag.as_deref(), Some(INSUFFICIENT_EVIDENCE));
    }

    #[test]
    fn flag_is_omitted_from_json_when_cited() {
        let json = serde_json::to_value(ReportedFinding::new(cited(Severity::Critical))).unwrap();
        assert!(json.get("evidence_flag").is_none());
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["rule_id"], "COH-001");
    }
}
