//! Testing utilities for the dossier workspace
//!
//! Shared builders, case-folder fixtures and fake collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use dossier_core::builtin::{CONFIDENCE_HEADER, PAGE_BREAK};
use dossier_core::{
    AbortHandle, CaseFile, Collaborators, ExtractedText, ExtractionFailure, Inconclusive, PlainTextExtractor,
    RegistryLookup, RegistryStatus, ReviewConfig, Stage, StageContext, StageFailure, StageId, TextExtractor,
};
use dossier_evidence::{EvidenceRecord, ExtractedField, ExtractionMethod, FieldType, Finding, Severity};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Evidence and findings
// ---------------------------------------------------------------------------

pub fn evidence(file: &str, page: u32, snippet: &str, rule: &str) -> EvidenceRecord {
    EvidenceRecord::builder(file)
        .page(page)
        .snippet(snippet)
        .detected(snippet)
        .method(ExtractionMethod::PatternMatch)
        .rule(rule)
        .build()
}

pub fn cited_finding(severity: Severity, rule: &str) -> Finding {
    Finding::new(severity, "test", rule, format!("{severity} finding {rule}"))
        .with_evidence(evidence("contract.txt", 1, "Contract No: CT-2024-017", rule))
}

pub fn bare_finding(severity: Severity, rule: &str) -> Finding {
    Finding::new(severity, "test", rule, format!("{severity} finding {rule} without evidence"))
}

/// Field read from a `Label: value` line with the given confidence
pub fn field(name: &str, field_type: FieldType, value: &str, file: &str, confidence: f64) -> ExtractedField {
    ExtractedField::new(name, field_type, value, file, 1)
        .with_confidence(confidence)
        .with_snippet(format!("{name}: {value}"))
}

// ---------------------------------------------------------------------------
// Case folders
// ---------------------------------------------------------------------------

pub const CONTRACT: &str = "\
SERVICE CONTRACT
Contract No: CT-2024-017
Object: Provision of cleaning services for the head office
Contractor: Obras Andinas SAS
Tax ID: 900123456
Legal representative: Ana Ruiz
Contract value: 12,000.00
Declared pages: 1
Governed by private law between private parties.
Signed by: Ana Ruiz
";

pub fn invoice(subtotal: &str, tax: &str, total: &str) -> String {
    format!(
        "INVOICE\nInvoice No: FV-001\nContract No: CT-2024-017\nSubtotal: {subtotal}\nTax: {tax}\nTotal: {total}\nDate: 2024-03-01\n"
    )
}

/// Temporary case folder; removed on drop
#[derive(Debug)]
pub struct CaseFolder {
    root: TempDir,
    path: PathBuf,
}

impl CaseFolder {
    pub fn new(case_id: &str) -> Self {
        let root = TempDir::new().unwrap();
        let path = root.path().join(case_id);
        std::fs::create_dir_all(&path).unwrap();
        Self { root, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory next to the case folder, for stores and traces
    pub fn work_dir(&self) -> PathBuf {
        self.root.path().join("work")
    }

    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.path.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    /// Multi-page document, each page with its reported confidence
    pub fn write_pages(&self, name: &str, pages: &[(f64, &str)]) -> PathBuf {
        let text = pages
            .iter()
            .map(|(confidence, body)| format!("{CONFIDENCE_HEADER}{confidence}\n{body}"))
            .collect::<Vec<_>>()
            .join(&PAGE_BREAK.to_string());
        self.write(name, &text)
    }

    pub fn with(self, name: &str, text: &str) -> Self {
        self.write(name, text);
        self
    }
}

/// Contract plus an invoice that adds up
pub fn clean_case() -> CaseFolder {
    CaseFolder::new("CT-2024-017")
        .with("contract.txt", CONTRACT)
        .with("invoice.txt", &invoice("1,000.00", "190.00", "1,190.00"))
}

/// Configuration writing store and trace under the folder's work dir
pub fn test_config(folder: &CaseFolder) -> ReviewConfig {
    ReviewConfig::new().with_work_dir(folder.work_dir())
}

pub fn case_file(case_id: &str) -> CaseFile {
    CaseFile::new(case_id, PathBuf::from(format!("/cases/{case_id}")))
}

// ---------------------------------------------------------------------------
// Fake collaborators
// ---------------------------------------------------------------------------

/// Extractor with canned results by file name, plain text otherwise
///
/// Stored copies are named `<custody id>-<original name>`, so scripts match
/// on the name suffix.
#[derive(Debug, Default)]
pub struct ScriptedExtractor {
    scripts: HashMap<String, Result<ExtractedText, ExtractionFailure>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, name: &str, failure: ExtractionFailure) -> Self {
        self.scripts.insert(name.to_string(), Err(failure));
        self
    }

    pub fn returning(mut self, name: &str, text: ExtractedText) -> Self {
        self.scripts.insert(name.to_string(), Ok(text));
        self
    }
}

impl TextExtractor for ScriptedExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractionFailure> {
        let stored = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match self.scripts.iter().find(|(name, _)| stored.ends_with(name.as_str())) {
            Some((_, result)) => result.clone(),
            None => PlainTextExtractor.extract(path),
        }
    }
}

/// Registry answering from a fixed table; unknown ids are not found
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    name: String,
    answers: HashMap<String, RegistryStatus>,
}

impl StaticRegistry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answers: HashMap::new(),
        }
    }

    pub fn with(mut self, identifier: &str, status: RegistryStatus) -> Self {
        self.answers.insert(dossier_core::normalize_identifier(identifier), status);
        self
    }
}

#[async_trait]
impl RegistryLookup for StaticRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, identifier: &str) -> Result<RegistryStatus, Inconclusive> {
        self.answers
            .get(&dossier_core::normalize_identifier(identifier))
            .cloned()
            .ok_or_else(|| Inconclusive::NotFound {
                registry: self.name.clone(),
                identifier: identifier.to_string(),
            })
    }
}

/// Registry that answers `Active` after a delay
#[derive(Debug, Clone)]
pub struct SlowRegistry {
    pub delay: Duration,
}

#[async_trait]
impl RegistryLookup for SlowRegistry {
    fn name(&self) -> &str {
        "slow-registry"
    }

    async fn lookup(&self, _identifier: &str) -> Result<RegistryStatus, Inconclusive> {
        tokio::time::sleep(self.delay).await;
        Ok(RegistryStatus::Active)
    }
}

/// Registry that is always down
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRegistry;

#[async_trait]
impl RegistryLookup for UnavailableRegistry {
    fn name(&self) -> &str {
        "offline-registry"
    }

    async fn lookup(&self, _identifier: &str) -> Result<RegistryStatus, Inconclusive> {
        Err(Inconclusive::Unavailable {
            registry: self.name().to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

pub fn collaborators_with_registry(registry: impl RegistryLookup + 'static) -> Collaborators {
    Collaborators::builtin().with_registry(Arc::new(registry))
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Stage that always returns a failure
#[derive(Debug, Clone)]
pub struct FailingStage {
    pub id: StageId,
    pub cause: String,
}

impl FailingStage {
    pub fn new(id: StageId, cause: &str) -> Self {
        Self {
            id,
            cause: cause.to_string(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: StageContext<'_>, _case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        Err(StageFailure::new(self.id, self.cause.clone()))
    }
}

/// Stage that panics
#[derive(Debug, Clone, Copy)]
pub struct PanickingStage(pub StageId);

#[async_trait]
impl Stage for PanickingStage {
    fn id(&self) -> StageId {
        self.0
    }

    async fn run(&self, _ctx: StageContext<'_>, _case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        panic!("index out of bounds in {}", self.0)
    }
}

/// Stage that requests an abort while it runs, then completes normally
#[derive(Debug, Clone)]
pub struct AbortingStage {
    pub id: StageId,
    pub handle: AbortHandle,
}

#[async_trait]
impl Stage for AbortingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: StageContext<'_>, _case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        self.handle.abort();
        Ok(vec![Finding::new(
            Severity::Informational,
            self.id.as_str(),
            "TEST-ABORT",
            "abort requested mid-stage",
        )])
    }
}
