use super::{Stage, StageContext, StageId};
use crate::case::CaseFile;
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_evidence::{ExtractedField, FieldType, Finding, Severity};
use dossier_integrity::parse_amount;
use std::collections::BTreeMap;

/// Fields that must carry the same value in every document of a case
pub const CASE_WIDE_FIELDS: &[&str] = &[
    "contract_number",
    "contractor",
    "tax_id",
    "authorized_representative",
    "contract_value",
];

/// Cross-document consistency of case-wide fields
#[derive(Debug, Clone, Copy, Default)]
pub struct CoherenceStage;

fn normalize(field: &ExtractedField) -> String {
    let raw = field.value.as_deref().unwrap_or_default();
    if field.field_type == FieldType::Amount {
        if let Some(amount) = parse_amount(raw) {
            return format!("{amount:.2}");
        }
    }
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[async_trait]
impl Stage for CoherenceStage {
    fn id(&self) -> StageId {
        StageId::Coherence
    }

    async fn run(&self, _ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let mut findings = Vec::new();
        for name in CASE_WIDE_FIELDS.iter().copied() {
            // first occurrence of each distinct value
            let mut variants: BTreeMap<String, &ExtractedField> = BTreeMap::new();
            for field in case.populated(name) {
                variants.entry(normalize(field)).or_insert(field);
            }
            if variants.len() < 2 {
                continue;
            }
            let mut holders: Vec<&ExtractedField> = variants.into_values().collect();
            holders.sort_by(|a, b| (&a.source_file, a.page).cmp(&(&b.source_file, b.page)));
            let values = holders
                .iter()
                .map(|f| format!("'{}' ({})", f.value.as_deref().unwrap_or_default(), f.source_file))
                .collect::<Vec<_>>()
                .join(" vs ");
            findings.push(
                Finding::new(
                    Severity::Major,
                    StageId::Coherence.as_str(),
                    "COH-001",
                    format!("'{name}' differs across documents: {values}"),
                )
                .with_all_evidence(holders.iter().map(|f| f.to_evidence("COH-001")))
                .with_action(format!("Confirm the correct '{name}' and correct the inconsistent documents"))
                .with_area("document review"),
            );
        }
        Ok(findings)
    }
}
