use super::{Stage, StageContext, StageId};
use crate::case::CaseFile;
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_custody::Sha256Digest;
use dossier_evidence::{EvidenceRecord, ExtractedField, ExtractionMethod, Finding, Severity};

const STAGE: &str = "quality";

/// Custody re-verification, page legibility and field extraction
///
/// Documents whose text could not be extracted contribute zero-confidence
/// placeholders for their group's required fields, so the gap is decided
/// by the abstention policy instead of disappearing.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityStage;

#[async_trait]
impl Stage for QualityStage {
    fn id(&self) -> StageId {
        StageId::Quality
    }

    async fn run(&self, ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let mut findings = Vec::new();
        let mut fields = Vec::new();

        for doc in &case.documents {
            let file = doc.file_name();

            if !ctx.custody.verify(&doc.custody.custody_id) {
                let recomputed = Sha256Digest::compute_file(doc.stored_path())
                    .map_or_else(|e| format!("unreadable: {e}"), |h| h.to_string());
                let evidence = EvidenceRecord::builder(file.clone())
                    .page(1)
                    .snippet(format!("recorded sha256 {}", doc.custody.sha256))
                    .detected(recomputed)
                    .expected(doc.custody.sha256.to_string())
                    .method(ExtractionMethod::Heuristic)
                    .rule("QLT-001")
                    .build();
                findings.push(
                    Finding::new(
                        Severity::Critical,
                        STAGE,
                        "QLT-001",
                        format!("Stored copy of {file} no longer matches its custody hash"),
                    )
                    .with_evidence(evidence)
                    .with_action("Re-ingest the original document and investigate the custody store")
                    .with_area("custody")
                    .needs_review(),
                );
            }

            if let Some(failure) = &doc.extraction_error {
                let group = doc.category.as_str();
                let placeholders: Vec<ExtractedField> = case
                    .requirements
                    .iter()
                    .filter(|r| r.category == doc.category)
                    .flat_map(|r| r.required_fields.iter())
                    .map(|f| ExtractedField::unreadable(f.name.clone(), f.field_type, file.clone()).in_group(group))
                    .collect();
                tracing::warn!(
                    case_id = %case.case_id,
                    file = %file,
                    placeholders = placeholders.len(),
                    "text extraction failed: {failure}"
                );
                findings.push(
                    Finding::new(
                        Severity::Uncertain,
                        STAGE,
                        "QLT-002",
                        format!("No usable text could be extracted: {failure}"),
                    )
                    .with_action("Provide a legible copy or review the document manually")
                    .with_area(group)
                    .needs_review(),
                );
                fields.extend(placeholders);
                continue;
            }

            let min = ctx.profile.page_legibility_min;
            for page in doc.pages.iter().filter(|p| p.confidence < min) {
                findings.push(
                    Finding::new(
                        Severity::Minor,
                        STAGE,
                        "QLT-003",
                        format!(
                            "{file} page {} read with confidence {:.2}, below {min:.2}",
                            page.number, page.confidence
                        ),
                    )
                    .with_evidence(doc.page_evidence(page.number, "QLT-003", ExtractionMethod::Ocr))
                    .with_action("Check values read from this page against the original")
                    .with_area("document review"),
                );
            }

            fields.extend(ctx.collaborators.fields.extract_fields(doc));
        }

        tracing::debug!(case_id = %case.case_id, fields = fields.len(), "fields extracted");
        case.fields.extend(fields);
        Ok(findings)
    }
}
