//! End-to-end reviews over temporary case folders

use async_trait::async_trait;
use dossier_core::stages::ClassificationStage;
use dossier_core::{
    AbortHandle, CaseFile, Collaborators, Decision, ExtractionFailure, Orchestrator, RegistryStatus, ReviewError,
    ReviewReport, Stage, StageContext, StageFailure, StageId, STAGE_FAILURE_RULE, TRACE_FAILURE_RULE,
};
use dossier_evidence::{ExtractionMethod, Finding, Severity};
use dossier_integrity::{CheckpointStatus, ABSTENTION_RULE, HALT_RULE};
use dossier_test_utils::{
    clean_case, collaborators_with_registry, invoice, test_config, AbortingStage, CaseFolder, FailingStage,
    PanickingStage, ScriptedExtractor, SlowRegistry, StaticRegistry, UnavailableRegistry, CONTRACT,
};
use dossier_trace::{list_runs, read_run, verify_run, RunStatus};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(folder: &CaseFolder) -> Orchestrator {
    Orchestrator::new(test_config(folder), Collaborators::builtin()).unwrap()
}

fn rules(report: &ReviewReport) -> Vec<&str> {
    report.findings.iter().map(|f| f.finding.rule_id.as_str()).collect()
}

fn run_status(orchestrator: &Orchestrator, report_run: dossier_trace::RunId) -> Option<RunStatus> {
    list_runs(orchestrator.trace().dir())
        .unwrap()
        .into_iter()
        .find(|r| r.run_id == report_run)
        .and_then(|r| r.status)
}

#[tokio::test]
async fn clean_case_proceeds() {
    let folder = clean_case();
    let orchestrator = orchestrator(&folder);

    let report = orchestrator.review(folder.path()).await.unwrap();

    assert_eq!(report.decision, Decision::Proceed, "findings: {:?}", rules(&report));
    assert_eq!(report.checkpoint_status, Some(CheckpointStatus::Ok));
    assert!(!report.halted);
    assert_eq!(report.counts.critical + report.counts.major, 0);
    assert_eq!(report.custody.len(), 2);
    assert_eq!(report.case_id, "CT-2024-017");
    for record in &report.custody {
        assert!(orchestrator.custody().verify(&record.custody_id));
    }
    assert_eq!(run_status(&orchestrator, report.run_id), Some(RunStatus::Completed));
}

#[tokio::test]
async fn trace_records_every_stage_in_order() {
    let folder = clean_case();
    let orchestrator = orchestrator(&folder);
    let report = orchestrator.review(folder.path()).await.unwrap();

    let dir = orchestrator.trace().dir();
    assert!(verify_run(dir, report.run_id).unwrap() > 0);

    let entered: Vec<String> = read_run(dir, report.run_id)
        .unwrap()
        .into_iter()
        .filter(|e| e.message == dossier_trace::STAGE_ENTER)
        .map(|e| e.stage_id)
        .collect();
    assert_eq!(
        entered,
        vec![
            "classification",
            "quality",
            "integrity_checkpoint",
            "coherence",
            "regulatory",
            "signature",
            "completeness",
            "penalty",
            "registry",
            "aggregating",
        ]
    );
}

#[tokio::test]
async fn missing_invoice_group_halts_and_blocks() {
    let folder = CaseFolder::new("CT-2024-018").with("contract.txt", CONTRACT);
    let orchestrator = orchestrator(&folder);

    let report = orchestrator.review(folder.path()).await.unwrap();

    assert_eq!(report.checkpoint_status, Some(CheckpointStatus::Critical));
    assert_eq!(report.decision, Decision::DoNotProceed);
    assert!(report.halted);
    assert!(rules(&report).contains(&"REQ-INVOICE"));
    assert!(rules(&report).contains(&HALT_RULE));
    // nothing after the checkpoint ran
    assert!(report.findings.iter().all(|f| f.finding.source_stage != "signature"));
    assert_eq!(run_status(&orchestrator, report.run_id), Some(RunStatus::Halted));
}

#[tokio::test]
async fn halt_can_be_disabled() {
    let folder = CaseFolder::new("CT-2024-019").with("contract.txt", CONTRACT);
    let config = test_config(&folder).with_halt_on_critical(false);
    let orchestrator = Orchestrator::new(config, Collaborators::builtin()).unwrap();

    let report = orchestrator.review(folder.path()).await.unwrap();

    assert!(!report.halted);
    assert_eq!(report.decision, Decision::DoNotProceed);
    assert!(!rules(&report).contains(&HALT_RULE));
    assert_eq!(run_status(&orchestrator, report.run_id), Some(RunStatus::Completed));
}

#[tokio::test]
async fn low_confidence_field_is_abstained_with_citation() {
    let folder = CaseFolder::new("CT-2024-020").with("contract.txt", CONTRACT);
    folder.write_pages(
        "invoice.txt",
        &[
            (1.0, "INVOICE\nInvoice No: FV-001\nSubtotal: 1,000.00\nTax: 190.00\nTotal: 1,190.00"),
            (0.55, "Date: 2024-03-01"),
        ],
    );
    let orchestrator = orchestrator(&folder);

    let report = orchestrator.review(folder.path()).await.unwrap();

    let abstention: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.finding.rule_id == ABSTENTION_RULE)
        .collect();
    assert_eq!(abstention.len(), 1);
    assert_eq!(abstention[0].finding.severity, Severity::Informational);
    assert_eq!(abstention[0].citations, vec!["invoice.txt p.2: \"Date: 2024-03-01\"".to_string()]);
    assert_eq!(report.checkpoint_status, Some(CheckpointStatus::Ok));
    assert_eq!(report.decision, Decision::Proceed);
}

#[tokio::test]
async fn total_mismatch_is_major_and_warns() {
    let folder = CaseFolder::new("CT-2024-021")
        .with("contract.txt", CONTRACT)
        .with("invoice.txt", &invoice("100.00", "18.00", "119.00"));
    let orchestrator = orchestrator(&folder);

    let report = orchestrator.review(folder.path()).await.unwrap();

    let mismatch = report
        .findings
        .iter()
        .find(|f| f.finding.rule_id == "ARITH-INVOICE-TOTAL")
        .unwrap();
    assert_eq!(mismatch.finding.severity, Severity::Major);
    assert!(!mismatch.is_flagged());
    assert_eq!(report.checkpoint_status, Some(CheckpointStatus::Warning));
    assert_eq!(report.decision, Decision::ProceedWithFindings);
}

#[tokio::test]
async fn unreadable_document_becomes_abstained_fields() {
    let folder = clean_case();
    let extractor = ScriptedExtractor::new().failing("invoice.txt", ExtractionFailure::unreadable("invoice.txt", "corrupt scan"));
    let collaborators = Collaborators::builtin().with_extractor(Arc::new(extractor));
    let orchestrator = Orchestrator::new(test_config(&folder), collaborators).unwrap();

    let report = orchestrator.review(folder.path()).await.unwrap();

    assert!(rules(&report).contains(&"QLT-002"));
    let abstained = report.findings.iter().filter(|f| f.finding.rule_id == ABSTENTION_RULE).count();
    assert_eq!(abstained, 2, "invoice_number and total");
    assert_eq!(report.checkpoint_status, Some(CheckpointStatus::Critical));
    assert_eq!(report.decision, Decision::DoNotProceed);
}

#[tokio::test]
async fn failing_stage_becomes_cited_critical_and_run_continues() {
    let folder = clean_case();
    let orchestrator = orchestrator(&folder).with_stage(Box::new(FailingStage::new(StageId::Coherence, "index out of range")));

    let report = orchestrator.review(folder.path()).await.unwrap();

    let failure = report
        .findings
        .iter()
        .find(|f| f.finding.rule_id == STAGE_FAILURE_RULE)
        .unwrap();
    assert_eq!(failure.finding.severity, Severity::Critical);
    assert_eq!(failure.finding.description, "stage coherence failed: index out of range");
    assert!(!failure.is_flagged());
    assert_eq!(report.decision, Decision::DoNotProceed);
    assert_eq!(run_status(&orchestrator, report.run_id), Some(RunStatus::Completed));
}

#[tokio::test]
async fn panicking_stage_is_contained() {
    let folder = clean_case();
    let orchestrator = orchestrator(&folder).with_stage(Box::new(PanickingStage(StageId::Penalty)));

    let report = orchestrator.review(folder.path()).await.unwrap();

    let failure = report
        .findings
        .iter()
        .find(|f| f.finding.rule_id == STAGE_FAILURE_RULE)
        .unwrap();
    assert_eq!(failure.finding.source_stage, "penalty");
    assert!(failure.finding.description.contains("panicked"));
    assert_eq!(report.decision, Decision::DoNotProceed);
}

#[tokio::test]
async fn abort_between_stages_keeps_findings_and_closes_run() {
    let folder = clean_case();
    let handle = AbortHandle::new();
    let orchestrator = orchestrator(&folder).with_stage(Box::new(AbortingStage {
        id: StageId::Coherence,
        handle: handle.clone(),
    }));

    let err = orchestrator
        .review_with_abort(folder.path(), &handle)
        .await
        .unwrap_err();

    let (run_id, next_stage, findings) = match err {
        ReviewError::Aborted {
            run_id,
            next_stage,
            findings,
        } => (run_id, next_stage, findings),
        other => panic!("expected an aborted run, got {other:?}"),
    };
    assert_eq!(next_stage, "regulatory");
    assert!(findings.iter().any(|f| f.rule_id == "TEST-ABORT"));
    assert_eq!(run_status(&orchestrator, run_id), Some(RunStatus::Aborted));
    assert!(verify_run(orchestrator.trace().dir(), run_id).is_ok());
}

#[tokio::test]
async fn abort_before_start_runs_no_stage() {
    let folder = clean_case();
    let handle = AbortHandle::new();
    handle.abort();
    let orchestrator = orchestrator(&folder);

    let err = orchestrator
        .review_with_abort(folder.path(), &handle)
        .await
        .unwrap_err();

    assert!(err.is_aborted());
    if let ReviewError::Aborted { next_stage, findings, .. } = err {
        assert_eq!(next_stage, "classification");
        assert!(findings.is_empty());
    }
}

#[tokio::test]
async fn sanctioned_contractor_blocks_with_lookup_evidence() {
    let folder = clean_case();
    let registry = StaticRegistry::new("sanctions").with(
        "900.123.456",
        RegistryStatus::Sanctioned {
            detail: "fiscal liability".into(),
        },
    );
    let orchestrator = Orchestrator::new(test_config(&folder), collaborators_with_registry(registry)).unwrap();

    let report = orchestrator.review(folder.path()).await.unwrap();

    let hit = report.findings.iter().find(|f| f.finding.rule_id == "REG-001").unwrap();
    assert_eq!(hit.finding.severity, Severity::Critical);
    assert!(hit
        .finding
        .evidence
        .iter()
        .any(|e| e.extraction_method() == ExtractionMethod::ExternalLookup));
    assert_eq!(report.decision, Decision::DoNotProceed);
}

#[tokio::test]
async fn lookup_timeout_is_informational() {
    let folder = clean_case();
    let mut config = test_config(&folder);
    config.profile.lookup_timeout_ms = 20;
    let registry = SlowRegistry {
        delay: Duration::from_secs(2),
    };
    let orchestrator = Orchestrator::new(config, collaborators_with_registry(registry)).unwrap();

    let report = orchestrator.review(folder.path()).await.unwrap();

    let inconclusive = report.findings.iter().find(|f| f.finding.rule_id == "REG-002").unwrap();
    assert_eq!(inconclusive.finding.severity, Severity::Informational);
    assert!(inconclusive.finding.description.contains("timed out"));
    assert_eq!(report.decision, Decision::Proceed);
}

#[tokio::test]
async fn unavailable_registry_never_blocks() {
    let folder = clean_case();
    let orchestrator = Orchestrator::new(test_config(&folder), collaborators_with_registry(UnavailableRegistry)).unwrap();

    let report = orchestrator.review(folder.path()).await.unwrap();

    assert!(rules(&report).contains(&"REG-002"));
    assert_eq!(report.decision, Decision::Proceed);
}

#[tokio::test]
async fn excluded_identifiers_are_not_looked_up() {
    let folder = clean_case();
    let mut config = test_config(&folder);
    config.profile.excluded_identifiers = vec!["900123456".into()];
    let orchestrator = Orchestrator::new(config, collaborators_with_registry(UnavailableRegistry)).unwrap();

    let report = orchestrator.review(folder.path()).await.unwrap();

    assert!(!rules(&report).contains(&"REG-002"));
}

/// Classification followed by an out-of-band edit of every stored copy
struct TamperingStage;

#[async_trait]
impl Stage for TamperingStage {
    fn id(&self) -> StageId {
        StageId::Classification
    }

    async fn run(&self, ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let findings = ClassificationStage.run(ctx, case).await?;
        for doc in &case.documents {
            let path = doc.stored_path();
            let mut perms = std::fs::metadata(path).unwrap().permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            std::fs::set_permissions(path, perms).unwrap();
            std::fs::write(path, "Total: 1.00\n").unwrap();
        }
        Ok(findings)
    }
}

#[tokio::test]
async fn tampered_custody_copy_is_critical() {
    let folder = clean_case();
    let orchestrator = orchestrator(&folder).with_stage(Box::new(TamperingStage));

    let report = orchestrator.review(folder.path()).await.unwrap();

    let tampered: Vec<_> = report.findings.iter().filter(|f| f.finding.rule_id == "QLT-001").collect();
    assert_eq!(tampered.len(), 2);
    assert!(tampered.iter().all(|f| f.finding.severity == Severity::Critical && !f.is_flagged()));
    assert_eq!(report.decision, Decision::DoNotProceed);
}

#[tokio::test]
async fn empty_folder_fails_before_any_run() {
    let folder = CaseFolder::new("EMPTY-1");
    let orchestrator = orchestrator(&folder);

    let err = orchestrator.review(folder.path()).await.unwrap_err();

    assert!(matches!(err, ReviewError::EmptyCase(_)));
    assert!(err.is_fatal_before_stages());
}

#[tokio::test]
async fn report_round_trips_through_disk() {
    let folder = clean_case();
    let orchestrator = orchestrator(&folder);
    let report = orchestrator.review(folder.path()).await.unwrap();

    let path = folder.work_dir().join("reports").join("report.json");
    report.persist(&path).unwrap();
    let loaded = ReviewReport::load(&path).unwrap();

    assert_eq!(loaded.decision, report.decision);
    assert_eq!(loaded.findings, report.findings);
    assert!(report.render_text().contains("Decision: PROCEED"));
}

/// Classification, then the trace file is replaced by a directory so
/// every later append fails
struct TraceBreakingStage {
    trace_file: PathBuf,
}

#[async_trait]
impl Stage for TraceBreakingStage {
    fn id(&self) -> StageId {
        StageId::Classification
    }

    async fn run(&self, ctx: StageContext<'_>, case: &mut CaseFile) -> Result<Vec<Finding>, StageFailure> {
        let findings = ClassificationStage.run(ctx, case).await?;
        std::fs::remove_file(&self.trace_file).unwrap();
        std::fs::create_dir(&self.trace_file).unwrap();
        Ok(findings)
    }
}

#[tokio::test]
async fn failing_trace_still_reaches_a_blocking_decision() {
    let folder = clean_case();
    let base = orchestrator(&folder);
    let trace_file = base.trace().current_file();
    let orchestrator = base.with_stage(Box::new(TraceBreakingStage {
        trace_file: trace_file.clone(),
    }));

    let report = orchestrator.review(folder.path()).await.unwrap();

    assert_eq!(report.decision, Decision::DoNotProceed);
    let failures: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.finding.rule_id == TRACE_FAILURE_RULE)
        .collect();
    assert_eq!(failures.len(), 1);
    let failure = &failures[0].finding;
    assert_eq!(failure.severity, Severity::Critical);
    assert_eq!(failure.source_stage, "trace");
    let evidence = &failure.evidence[0];
    assert_eq!(evidence.source_file(), trace_file.to_string_lossy());
    assert_eq!(evidence.page(), 1);
    assert!(evidence.snippet().starts_with("trace append failed"));
    assert!(evidence.is_complete());
    assert!(!failures[0].is_flagged());
}

async fn review_without_halt(folder: &CaseFolder) -> ReviewReport {
    let config = test_config(folder).with_halt_on_critical(false);
    Orchestrator::new(config, Collaborators::builtin())
        .unwrap()
        .review(folder.path())
        .await
        .unwrap()
}

fn single<'r>(report: &'r ReviewReport, rule: &str) -> &'r Finding {
    let matching: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.finding.rule_id == rule)
        .collect();
    assert_eq!(matching.len(), 1, "{rule} in {:?}", rules(report));
    assert!(!matching[0].is_flagged(), "{rule} lost its evidence");
    &matching[0].finding
}

fn cites(finding: &Finding, file: &str, page: u32, snippet: &str) {
    assert!(
        finding
            .evidence
            .iter()
            .any(|e| e.source_file() == file && e.page() == page && e.snippet() == snippet && e.is_complete()),
        "no citation of {file} p.{page} {snippet:?} in {:?}",
        finding.evidence
    );
}

#[tokio::test]
async fn contractor_mismatch_across_documents_is_major() {
    let folder = CaseFolder::new("CT-2024-030")
        .with("contract.txt", CONTRACT)
        .with(
            "invoice.txt",
            &format!("{}Contractor: Constructora Norte Ltda\n", invoice("1,000.00", "190.00", "1,190.00")),
        );

    let report = review_without_halt(&folder).await;

    let mismatch = single(&report, "COH-001");
    assert_eq!(mismatch.severity, Severity::Major);
    assert_eq!(mismatch.source_stage, "coherence");
    assert!(mismatch.description.starts_with("'contractor' differs across documents"));
    assert_eq!(mismatch.evidence.len(), 2);
    cites(mismatch, "contract.txt", 1, "Contractor: Obras Andinas SAS");
    cites(mismatch, "invoice.txt", 1, "Contractor: Constructora Norte Ltda");
    assert_eq!(report.decision, Decision::ProceedWithFindings);
}

#[tokio::test]
async fn unsigned_contract_is_major() {
    let folder = CaseFolder::new("CT-2024-031")
        .with("contract.txt", &CONTRACT.replace("Signed by: Ana Ruiz\n", ""))
        .with("invoice.txt", &invoice("1,000.00", "190.00", "1,190.00"));

    let report = review_without_halt(&folder).await;

    let unsigned = single(&report, "SIG-001");
    assert_eq!(unsigned.severity, Severity::Major);
    assert_eq!(unsigned.source_stage, "signature");
    assert_eq!(unsigned.description, "contract.txt requires a signature but none could be found");
    let evidence = &unsigned.evidence[0];
    assert_eq!(evidence.source_file(), "contract.txt");
    assert_eq!(evidence.page(), 1);
    assert!(evidence.snippet().starts_with("SERVICE CONTRACT"));
    assert!(evidence.is_complete());
}

#[tokio::test]
async fn signer_other_than_representative_is_major() {
    let folder = CaseFolder::new("CT-2024-032")
        .with("contract.txt", &CONTRACT.replace("Signed by: Ana Ruiz", "Signed by: Luis Gomez"))
        .with("invoice.txt", &invoice("1,000.00", "190.00", "1,190.00"));

    let report = review_without_halt(&folder).await;

    assert!(!rules(&report).contains(&"SIG-001"));
    let signer = single(&report, "SIG-002");
    assert_eq!(signer.severity, Severity::Major);
    assert!(signer.description.contains("'Luis Gomez'"));
    cites(signer, "contract.txt", 1, "Signed by: Luis Gomez");
    cites(signer, "contract.txt", 1, "Legal representative: Ana Ruiz");
}

#[tokio::test]
async fn missing_declared_pages_are_major() {
    let folder = CaseFolder::new("CT-2024-033")
        .with("contract.txt", &CONTRACT.replace("Declared pages: 1", "Declared pages: 3"))
        .with("invoice.txt", &invoice("1,000.00", "190.00", "1,190.00"));

    let report = review_without_halt(&folder).await;

    let short = single(&report, "CMP-001");
    assert_eq!(short.severity, Severity::Major);
    assert_eq!(short.description, "contract.txt declares 3 pages but 1 were received");
    cites(short, "contract.txt", 1, "Declared pages: 3");
    assert_eq!(short.evidence[0].detected_value(), "3");
}

#[tokio::test]
async fn blank_page_is_minor() {
    let folder = CaseFolder::new("CT-2024-034").with("contract.txt", CONTRACT);
    folder.write_pages("invoice.txt", &[(1.0, &invoice("1,000.00", "190.00", "1,190.00")), (1.0, "")]);

    let report = review_without_halt(&folder).await;

    let blank = single(&report, "CMP-002");
    assert_eq!(blank.severity, Severity::Minor);
    assert_eq!(blank.description, "invoice.txt has blank page(s): 2");
    let evidence = &blank.evidence[0];
    assert_eq!(evidence.source_file(), "invoice.txt");
    assert_eq!(evidence.page(), 2);
    assert!(evidence.is_complete());
}

#[tokio::test]
async fn delay_without_penalty_is_major() {
    let folder = CaseFolder::new("CT-2024-035")
        .with("contract.txt", CONTRACT)
        .with(
            "invoice.txt",
            &format!("{}Delay days: 12\n", invoice("1,000.00", "190.00", "1,190.00")),
        );

    let report = review_without_halt(&folder).await;

    let unpenalized = single(&report, "PEN-001");
    assert_eq!(unpenalized.severity, Severity::Major);
    assert_eq!(unpenalized.description, "12 day(s) of delay reported but no penalty was applied");
    cites(unpenalized, "invoice.txt", 1, "Delay days: 12");
    assert!(!rules(&report).contains(&"PEN-002"));
}

#[tokio::test]
async fn penalty_without_delay_is_minor() {
    let folder = CaseFolder::new("CT-2024-036")
        .with("contract.txt", CONTRACT)
        .with(
            "invoice.txt",
            &format!("{}Penalty amount: 500.00\n", invoice("1,000.00", "190.00", "1,190.00")),
        );

    let report = review_without_halt(&folder).await;

    let unjustified = single(&report, "PEN-002");
    assert_eq!(unjustified.severity, Severity::Minor);
    assert_eq!(unjustified.description, "Penalty of 500.00 applied without any reported delay");
    cites(unjustified, "invoice.txt", 1, "Penalty amount: 500.00");
    assert!(!rules(&report).contains(&"PEN-001"));
}

#[tokio::test]
async fn missing_required_field_is_cited_against_its_document() {
    let invoice_text = invoice("1,000.00", "190.00", "1,190.00").replace("Invoice No: FV-001\n", "");
    let folder = CaseFolder::new("CT-2024-037")
        .with("contract.txt", CONTRACT)
        .with("invoice.txt", &invoice_text);

    let report = review_without_halt(&folder).await;

    let missing: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.finding.rule_id == "REQ-INVOICE" && f.finding.source_stage == "regulatory")
        .collect();
    assert_eq!(missing.len(), 1, "{:?}", rules(&report));
    let finding = &missing[0].finding;
    assert_eq!(finding.severity, Severity::Major);
    assert_eq!(finding.description, "Required field 'invoice_number' is missing from invoice invoice.txt");
    assert_eq!(finding.responsible_area, "invoice");
    let evidence = &finding.evidence[0];
    assert_eq!(evidence.source_file(), "invoice.txt");
    assert_eq!(evidence.page(), 1);
    assert_eq!(evidence.extraction_method(), ExtractionMethod::PatternMatch);
    assert!(evidence.snippet().starts_with("INVOICE"));
    assert!(evidence.is_complete());
}

#[tokio::test]
async fn unknown_nature_needs_review() {
    let folder = CaseFolder::new("CT-2024-038")
        .with(
            "contract.txt",
            &CONTRACT
                .replace("SERVICE CONTRACT", "CONTRACT")
                .replace("cleaning services", "cleaning"),
        )
        .with("invoice.txt", &invoice("1,000.00", "190.00", "1,190.00"));

    let report = review_without_halt(&folder).await;

    let unknown = single(&report, "CLS-001");
    assert_eq!(unknown.severity, Severity::Uncertain);
    assert_eq!(unknown.source_stage, "classification");
    assert!(unknown.requires_human_review);
    let evidence = &unknown.evidence[0];
    assert_eq!(evidence.source_file(), "contract.txt");
    assert_eq!(evidence.page(), 1);
    assert!(evidence.snippet().starts_with("CONTRACT"));
    assert!(evidence.is_complete());
}
