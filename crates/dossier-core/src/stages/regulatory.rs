use super::{Stage, StageContext, StageId};
use crate::case::CaseFile;
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_evidence::{ExtractionMethod, FieldType, Finding, Severity};

/// Required fields of every present document group
///
/// Absent groups are the checkpoint's concern. Signature fields are left
/// to [`super::SignatureStage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegulatoryStage;

#[async_trait]
impl Stage for RegulatoryStage {
    fn id(&self) -> StageId {
        StageId::Regulatory
    }

    async fn run(&self, _ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let stage = StageId::Regulatory.as_str();
        let mut findings = Vec::new();

        for req in &case.requirements {
            let Some(first_doc) = case.documents_in(req.category).next() else {
                continue;
            };
            let group = req.category.as_str();
            for required in req.required_fields.iter().filter(|f| f.field_type != FieldType::Signature) {
                let mut candidates = case
                    .fields
                    .iter()
                    .filter(|f| f.group == group && f.field_name == required.name);
                let mut abstained = None;
                let satisfied = candidates.any(|f| {
                    if f.is_abstained() && abstained.is_none() {
                        abstained = Some(f);
                    }
                    f.is_populated()
                });
                if satisfied {
                    continue;
                }

                let (description, evidence) = match abstained {
                    Some(field) => (
                        format!(
                            "Required field '{}' of {group} could not be read reliably in {}",
                            required.name, field.source_file
                        ),
                        field.to_evidence(&req.rule_id),
                    ),
                    None => (
                        format!("Required field '{}' is missing from {group} {}", required.name, first_doc.file_name()),
                        first_doc.page_evidence(1, &req.rule_id, ExtractionMethod::PatternMatch),
                    ),
                };
                findings.push(
                    Finding::new(Severity::Major, stage, req.rule_id.clone(), description)
                        .with_evidence(evidence)
                        .with_action(format!("Obtain a {group} stating '{}'", required.name))
                        .with_area(group),
                );
            }
        }
        Ok(findings)
    }
}
