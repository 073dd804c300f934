use super::{Stage, StageContext, StageId};
use crate::case::CaseFile;
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_evidence::{ExtractionMethod, Finding, Severity};

/// Declared versus received pages, and blank pages
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessStage;

#[async_trait]
impl Stage for CompletenessStage {
    fn id(&self) -> StageId {
        StageId::Completeness
    }

    async fn run(&self, _ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let stage = StageId::Completeness.as_str();
        let mut findings = Vec::new();

        for doc in case.documents.iter().filter(|d| d.is_readable()) {
            let file = doc.file_name();
            let received = doc.pages.len();

            let declared = case
                .populated("declared_pages")
                .filter(|f| f.source_file == file)
                .find_map(|f| Some((f, f.value.as_deref()?.trim().parse::<usize>().ok()?)));
            if let Some((field, declared)) = declared {
                if declared > received {
                    findings.push(
                        Finding::new(
                            Severity::Major,
                            stage,
                            "CMP-001",
                            format!("{file} declares {declared} pages but {received} were received"),
                        )
                        .with_evidence(field.to_evidence("CMP-001"))
                        .with_action("Obtain the missing pages")
                        .with_area(doc.category.as_str()),
                    );
                }
            }

            let blank: Vec<u32> = doc.pages.iter().filter(|p| p.is_blank()).map(|p| p.number).collect();
            if let Some(first) = blank.first() {
                let pages = blank.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");
                findings.push(
                    Finding::new(
                        Severity::Minor,
                        stage,
                        "CMP-002",
                        format!("{file} has blank page(s): {pages}"),
                    )
                    .with_evidence(doc.page_evidence(*first, "CMP-002", ExtractionMethod::Ocr))
                    .with_action("Confirm the blank pages are intentional")
                    .with_area("document review"),
                );
            }
        }
        Ok(findings)
    }
}
