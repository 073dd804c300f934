use super::{Stage, StageContext, StageId};
use crate::case::CaseFile;
use crate::error::StageFailure;
use async_trait::async_trait;
use dossier_evidence::{Finding, Severity};
use dossier_integrity::parse_amount;

/// Whether a contractual penalty applies and was applied
#[derive(Debug, Clone, Copy, Default)]
pub struct PenaltyStage;

#[async_trait]
impl Stage for PenaltyStage {
    fn id(&self) -> StageId {
        StageId::Penalty
    }

    async fn run(&self, _ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let stage = StageId::Penalty.as_str();
        let mut findings = Vec::new();

        let delay = case
            .populated("delay_days")
            .filter_map(|f| Some((f, parse_amount(f.value.as_deref()?)?)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let penalty = case
            .populated("penalty_amount")
            .filter_map(|f| Some((f, parse_amount(f.value.as_deref()?)?)))
            .find(|(_, amount)| *amount > 0.0);

        let delayed_days = delay.map_or(0.0, |(_, days)| days);
        match (delay, penalty) {
            (Some((field, days)), None) if days > 0.0 => findings.push(
                Finding::new(
                    Severity::Major,
                    stage,
                    "PEN-001",
                    format!("{days:.0} day(s) of delay reported but no penalty was applied"),
                )
                .with_evidence(field.to_evidence("PEN-001"))
                .with_action("Apply the contractual penalty or document why it does not apply")
                .with_area("contract administration"),
            ),
            (_, Some((field, amount))) if delayed_days <= 0.0 => findings.push(
                Finding::new(
                    Severity::Minor,
                    stage,
                    "PEN-002",
                    format!("Penalty of {amount:.2} applied without any reported delay"),
                )
                .with_evidence(field.to_evidence("PEN-002"))
                .with_action("Document the breach that justifies the penalty")
                .with_area("contract administration"),
            ),
            _ => {}
        }
        Ok(findings)
    }
}
