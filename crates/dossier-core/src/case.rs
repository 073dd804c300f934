//! Case file model
//!
//! A [`CaseFile`] owns the documents of one review, the fields read from
//! them and the findings the stages contributed. Findings can only be
//! appended; the decision can only be set once.

use crate::decision::Decision;
use crate::error::ExtractionFailure;
use dossier_custody::CustodyRecord;
use dossier_evidence::{EvidenceRecord, ExtractedField, ExtractionMethod, Finding};
use dossier_integrity::{CaseExpectations, CaseInventory, CheckpointStatus, CheckpointSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Placeholder snippet for pages without any text
pub const NO_TEXT: &str = "[no text extracted]";

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| format!("unknown {}: '{s}'", stringify!($name)))
            }
        }
    };
}

text_enum! {
    /// Kind of source document; doubles as the document group name
    DocumentCategory {
        Contract => "contract",
        Invoice => "invoice",
        InsurancePolicy => "insurance_policy",
        PowerOfAttorney => "power_of_attorney",
        Certificate => "certificate",
        ProgressReport => "progress_report",
        Unknown => "unknown",
    }
}

text_enum! {
    /// Nature of the transaction under review
    DocumentNature {
        ServiceContract => "service_contract",
        SupplyContract => "supply_contract",
        PublicWorks => "public_works",
        Consulting => "consulting",
        Unknown => "unknown",
    }
}

text_enum! {
    /// Applicable legal regime
    Regime {
        Public => "public",
        Private => "private",
        Special => "special",
        Unknown => "unknown",
    }
}

/// Case-level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub nature: DocumentNature,
    pub regime: Regime,
}

/// Text of one page as returned by the extraction collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based
    pub number: u32,
    pub text: String,
    pub confidence: f64,
}

impl PageText {
    #[must_use]
    pub fn new(number: u32, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            number,
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Page text as a snippet, or [`NO_TEXT`] when blank
    #[must_use]
    pub fn snippet(&self) -> &str {
        if self.is_blank() {
            NO_TEXT
        } else {
            self.text.trim()
        }
    }
}

/// One ingested source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub custody: CustodyRecord,
    pub category: DocumentCategory,
    pub pages: Vec<PageText>,
    /// Set when the extraction collaborator returned nothing usable
    pub extraction_error: Option<ExtractionFailure>,
}

impl SourceDocument {
    #[must_use]
    pub fn new(custody: CustodyRecord) -> Self {
        Self {
            custody,
            category: DocumentCategory::Unknown,
            pages: Vec::new(),
            extraction_error: None,
        }
    }

    /// File name as cited in evidence
    #[must_use]
    pub fn file_name(&self) -> String {
        self.custody.file_name()
    }

    /// Path of the immutable stored copy
    #[must_use]
    pub fn stored_path(&self) -> &Path {
        &self.custody.stored_copy_path
    }

    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.extraction_error.is_none() && !self.pages.is_empty()
    }

    /// All page text joined by newlines
    #[must_use]
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Evidence citing `page` (1-based) of this document
    #[must_use]
    pub fn page_evidence(&self, page: u32, rule_id: &str, method: ExtractionMethod) -> EvidenceRecord {
        let found = self.pages.iter().find(|p| p.number == page);
        EvidenceRecord::builder(self.file_name())
            .page(page.max(1))
            .snippet(found.map_or(NO_TEXT, PageText::snippet))
            .method(method)
            .confidence(found.map_or(0.0, |p| p.confidence))
            .rule(rule_id)
            .build()
    }

    /// Evidence citing the last page, where signatures usually are
    #[must_use]
    pub fn last_page_evidence(&self, rule_id: &str) -> EvidenceRecord {
        let last = self.pages.last().map_or(1, |p| p.number);
        self.page_evidence(last, rule_id, ExtractionMethod::Heuristic)
    }
}

/// The unit of work of one review
#[derive(Debug, Clone, Serialize)]
pub struct CaseFile {
    pub case_id: String,
    pub folder: PathBuf,
    pub documents: Vec<SourceDocument>,
    pub classification: Option<Classification>,
    /// Fields read from all documents; abstained in place by the checkpoint
    pub fields: Vec<ExtractedField>,
    /// Requirements and rules resolved by classification
    pub expectations: CaseExpectations,
    pub requirements: Vec<crate::collaborators::RequirementSpec>,
    pub checkpoint: Option<(CheckpointStatus, CheckpointSummary)>,
    findings: Vec<Finding>,
    decision: Option<Decision>,
}

impl CaseFile {
    #[must_use]
    pub fn new(case_id: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        Self {
            case_id: case_id.into(),
            expectations: CaseExpectations::new(CaseInventory::new(folder.to_string_lossy(), Vec::new())),
            folder,
            documents: Vec::new(),
            classification: None,
            fields: Vec::new(),
            requirements: Vec::new(),
            checkpoint: None,
            findings: Vec::new(),
            decision: None,
        }
    }

    /// Add an ingested document and list it in the inventory
    pub fn add_document(&mut self, document: SourceDocument) {
        self.expectations.inventory.files.push(document.file_name());
        self.documents.push(document);
    }

    #[must_use]
    pub fn inventory(&self) -> &CaseInventory {
        &self.expectations.inventory
    }

    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Append a stage's findings after every earlier one
    pub fn append_findings(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    /// Existing findings, for in-place re-validation only
    pub(crate) fn findings_mut(&mut self) -> &mut [Finding] {
        &mut self.findings
    }

    pub(crate) fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    #[must_use]
    pub fn decision(&self) -> Option<Decision> {
        self.decision
    }

    /// Record the terminal decision; a second call keeps the first value
    pub(crate) fn set_decision(&mut self, decision: Decision) -> Decision {
        *self.decision.get_or_insert(decision)
    }

    /// Documents of `category`, in intake order
    pub fn documents_in(&self, category: DocumentCategory) -> impl Iterator<Item = &SourceDocument> {
        self.documents.iter().filter(move |d| d.category == category)
    }

    #[must_use]
    pub fn document(&self, file_name: &str) -> Option<&SourceDocument> {
        self.documents.iter().find(|d| d.file_name() == file_name)
    }

    /// Populated fields named `name`, across all documents
    pub fn populated(&self, name: &'static str) -> impl Iterator<Item = &ExtractedField> {
        self.fields
            .iter()
            .filter(move |f| f.field_name == name && f.is_populated())
    }
}
