use super::{Stage, StageContext, StageId};
use crate::case::CaseFile;
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_evidence::{ExtractedField, Finding, Severity};

/// Signature presence and signatory authority
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureStage;

fn same_person(a: &str, b: &str) -> bool {
    let key = |s: &str| -> Vec<String> {
        let mut words: Vec<String> = s
            .split_whitespace()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect())
            .filter(|w: &String| !w.is_empty())
            .collect();
        words.sort();
        words
    };
    key(a) == key(b)
}

#[async_trait]
impl Stage for SignatureStage {
    fn id(&self) -> StageId {
        StageId::Signature
    }

    async fn run(&self, _ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let stage = StageId::Signature.as_str();
        let mut findings = Vec::new();

        for req in case.requirements.iter().filter(|r| r.requires_signature) {
            for doc in case.documents_in(req.category) {
                let file = doc.file_name();
                let signed = case
                    .populated("signature")
                    .any(|f| f.source_file == file);
                if signed {
                    continue;
                }
                findings.push(
                    Finding::new(
                        Severity::Major,
                        stage,
                        "SIG-001",
                        format!("{file} requires a signature but none could be found"),
                    )
                    .with_evidence(doc.last_page_evidence("SIG-001"))
                    .with_action("Obtain a signed copy of the document")
                    .with_area(req.category.as_str()),
                );
            }
        }

        let representatives: Vec<&ExtractedField> = case.populated("authorized_representative").collect();
        if representatives.is_empty() {
            return Ok(findings);
        }
        for signature in case.populated("signature") {
            let signer = signature.value.as_deref().unwrap_or_default();
            if representatives
                .iter()
                .any(|r| same_person(signer, r.value.as_deref().unwrap_or_default()))
            {
                continue;
            }
            let representative = representatives[0];
            findings.push(
                Finding::new(
                    Severity::Major,
                    stage,
                    "SIG-002",
                    format!(
                        "{} is signed by '{signer}', who is not the authorized representative '{}'",
                        signature.source_file,
                        representative.value.as_deref().unwrap_or_default()
                    ),
                )
                .with_evidence(signature.to_evidence("SIG-002"))
                .with_evidence(representative.to_evidence("SIG-002"))
                .with_action("Provide proof of the signatory's authority, such as a power of attorney")
                .with_area("legal review"),
            );
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::same_person;

    #[test]
    fn names_match_regardless_of_order_and_case() {
        assert!(same_person("Ana María Ruiz", "RUIZ ana maría"));
        assert!(same_person("Ana Ruiz.", "ana ruiz"));
        assert!(!same_person("Ana Ruiz", "Luis Ruiz"));
    }
}
