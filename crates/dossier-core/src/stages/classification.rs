use super::{Stage, StageContext, StageId};
use crate::case::{CaseFile, Classification, DocumentCategory, DocumentNature};
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_evidence::{ExtractionMethod, Finding, Severity};
use dossier_integrity::{CaseExpectations, GroupExpectation};

/// Categorizes documents, classifies the case and resolves its requirements
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationStage;

#[async_trait]
impl Stage for ClassificationStage {
    fn id(&self) -> StageId {
        StageId::Classification
    }

    async fn run(&self, ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let classifier = &ctx.collaborators.classifier;
        let mut findings = Vec::new();

        for doc in &mut case.documents {
            let text = doc.full_text();
            doc.category = classifier.categorize(&doc.file_name(), &text);
            if doc.category == DocumentCategory::Unknown {
                findings.push(
                    Finding::new(
                        Severity::Informational,
                        StageId::Classification.as_str(),
                        "CLS-002",
                        format!("Document {} does not match any known category", doc.file_name()),
                    )
                    .with_evidence(doc.page_evidence(1, "CLS-002", ExtractionMethod::Heuristic))
                    .with_area("document review"),
                );
            }
        }

        let case_text = case
            .documents
            .iter()
            .map(crate::case::SourceDocument::full_text)
            .collect::<Vec<_>>()
            .join("\n");
        let classification = Classification {
            nature: classifier.nature(&case_text),
            regime: classifier.regime(&case_text),
        };
        tracing::info!(
            case_id = %case.case_id,
            nature = %classification.nature,
            regime = %classification.regime,
            "case classified"
        );

        if classification.nature == DocumentNature::Unknown {
            let evidence = case
                .documents
                .iter()
                .find(|d| d.category == DocumentCategory::Contract)
                .or_else(|| case.documents.first())
                .map(|d| d.page_evidence(1, "CLS-001", ExtractionMethod::Heuristic));
            let mut finding = Finding::new(
                Severity::Uncertain,
                StageId::Classification.as_str(),
                "CLS-001",
                "Nature of the transaction could not be determined; default requirements applied",
            )
            .with_action("Confirm the transaction nature and the applicable requirement list")
            .with_area("legal review")
            .needs_review();
            finding.evidence.extend(evidence);
            findings.push(finding);
        }

        let catalog = &ctx.collaborators.catalog;
        let requirements = catalog.required_documents(classification.nature, classification.regime);
        let rules = catalog.checkpoint_rules(classification.nature, classification.regime);

        let mut expectations = CaseExpectations::new(case.expectations.inventory.clone());
        for req in &requirements {
            expectations = expectations.expect_group(GroupExpectation::new(
                req.category.as_str(),
                req.min_populated_fields,
                req.rule_id.clone(),
            ));
        }
        expectations.unique_keys = rules.unique_keys;
        expectations.sum_rules = rules.sum_rules;

        case.expectations = expectations;
        case.requirements = requirements;
        case.classification = Some(classification);
        Ok(findings)
    }
}
