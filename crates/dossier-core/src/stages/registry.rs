use super::{Stage, StageContext, StageId};
use crate::case::CaseFile;
use crate::collaborators::{normalize_identifier, RegistryStatus};
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_evidence::{EvidenceRecord, ExtractedField, ExtractionMethod, Finding, Severity};

/// Fields whose values are looked up in external registries
pub const REGISTRY_FIELDS: &[&str] = &["tax_id"];

/// External registry checks of the parties' identifiers
///
/// A registry that cannot answer never blocks the case: the identifier is
/// reported as INFORMATIONAL for manual follow-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStage;

fn describe(status: &RegistryStatus) -> String {
    match status {
        RegistryStatus::Active => "active".to_string(),
        RegistryStatus::Inactive { detail } => format!("inactive ({detail})"),
        RegistryStatus::Sanctioned { detail } => format!("sanctioned ({detail})"),
    }
}

#[async_trait]
impl Stage for RegistryStage {
    fn id(&self) -> StageId {
        StageId::Registry
    }

    async fn run(&self, ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let stage = StageId::Registry.as_str();
        if ctx.router.is_empty() {
            tracing::debug!(case_id = %case.case_id, "no registries configured, skipping lookups");
            return Ok(Vec::new());
        }

        let identifiers: Vec<&ExtractedField> = REGISTRY_FIELDS
            .iter()
            .copied()
            .flat_map(|name| case.populated(name))
            .collect();
        let source_of = |id: &str| {
            let key = normalize_identifier(id);
            identifiers
                .iter()
                .copied()
                .find(|f| normalize_identifier(f.value.as_deref().unwrap_or_default()) == key)
        };

        let answers = ctx
            .router
            .resolve_all(identifiers.iter().filter_map(|f| f.value.clone()))
            .await;

        let mut findings = Vec::new();
        for (identifier, result) in answers {
            let Some(field) = source_of(&identifier) else {
                continue;
            };
            match result {
                Ok(answer) if answer.status.is_adverse() => {
                    let status = describe(&answer.status);
                    let lookup = EvidenceRecord::builder(field.source_file.clone())
                        .page(field.page)
                        .snippet(if field.snippet.is_empty() { identifier.as_str() } else { field.snippet.as_str() })
                        .detected(status.clone())
                        .expected("active")
                        .method(ExtractionMethod::ExternalLookup)
                        .rule("REG-001")
                        .build();
                    findings.push(
                        Finding::new(
                            Severity::Critical,
                            stage,
                            "REG-001",
                            format!("{} reports {identifier} as {status}", answer.registry),
                        )
                        .with_evidence(field.to_evidence("REG-001"))
                        .with_evidence(lookup)
                        .with_action("Confirm the party's standing before contracting")
                        .with_area("legal review")
                        .needs_review(),
                    );
                }
                Ok(answer) => {
                    tracing::debug!(identifier = %identifier, registry = %answer.registry, "registry check passed");
                }
                Err(inconclusive) => {
                    tracing::info!(identifier = %identifier, "registry check inconclusive: {inconclusive}");
                    findings.push(
                        Finding::new(
                            Severity::Informational,
                            stage,
                            "REG-002",
                            format!("Registry check for {identifier} was inconclusive: {inconclusive}"),
                        )
                        .with_evidence(field.to_evidence("REG-002"))
                        .with_action("Verify the identifier manually in the registry")
                        .with_area("legal review")
                        .needs_review(),
                    );
                }
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::describe;
    use crate::collaborators::RegistryStatus;

    #[test]
    fn statuses_read_as_text() {
        assert_eq!(describe(&RegistryStatus::Active), "active");
        assert_eq!(
            describe(&RegistryStatus::Sanctioned {
                detail: "fiscal liability".into()
            }),
            "sanctioned (fiscal liability)"
        );
    }
}
