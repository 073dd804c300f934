//! Stage orchestrator
//!
//! Drives one case file through intake, the analysis stages, the integrity
//! checkpoint and the decision fold. Every state change goes through
//! [`validate_transition`] and is mirrored in the trace log.
//!
//! Failure policy: intake errors stop the run before any stage. A stage
//! that fails or panics becomes a CRITICAL finding and the run continues,
//! and so does a trace log that stops accepting appends. An abort request
//! is honoured between stages only.

use crate::case::{CaseFile, SourceDocument};
use crate::collaborators::{Collaborators, RegistryRouter};
use crate::decision::{decide, validate_transition, ReviewState};
use crate::error::{ExtractionFailure, ReviewError, StageFailure};
use crate::report::ReviewReport;
use crate::stages::{standard_stages, Stage, StageContext, StageId};
use crate::types::ReviewConfig;
use dossier_custody::CustodyChain;
use dossier_evidence::{validate_all, EvidenceRecord, ExtractionMethod, Finding, Severity, SeverityCounts};
use dossier_integrity::{CheckpointStatus, IntegrityCheckpoint, CHECKPOINT_STAGE};
use dossier_trace::{attrs, Attributes, RunId, RunStatus, TraceError, TraceLevel, TraceLog};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Rule id of the finding recorded for a failed stage
pub const STAGE_FAILURE_RULE: &str = "STG-FAIL-001";

/// Rule id of the finding recorded when the trace log stops accepting appends
pub const TRACE_FAILURE_RULE: &str = "TRC-FAIL-001";

/// Trace stage label of the decision fold
const AGGREGATION_STAGE: &str = "aggregating";

/// Source stage of the trace failure finding
const TRACE_STAGE: &str = "trace";

/// Cloneable cancellation flag, checked between stages
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the current stage still runs to completion
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs reviews against one custody store and trace directory
pub struct Orchestrator {
    config: ReviewConfig,
    collaborators: Collaborators,
    stages: Vec<Box<dyn Stage>>,
    custody: CustodyChain,
    trace: TraceLog,
    router: RegistryRouter,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("stages", &self.stages.iter().map(|s| s.id()).collect::<Vec<_>>())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Open the custody store and trace directory named by `config`
    ///
    /// # Errors
    /// [`ReviewError::Store`] or [`ReviewError::Trace`] if either cannot
    /// be opened
    pub fn new(config: ReviewConfig, collaborators: Collaborators) -> Result<Self, ReviewError> {
        let custody = CustodyChain::open(&config.store_dir)?;
        let trace = TraceLog::open(&config.trace_dir)?;
        let router = RegistryRouter::new(
            collaborators.registries.clone(),
            Duration::from_millis(config.profile.lookup_timeout_ms),
        )
        .with_max_concurrent(config.max_concurrent_lookups)
        .with_excluded(config.profile.excluded_identifiers.iter().cloned());
        Ok(Self {
            config,
            collaborators,
            stages: standard_stages(),
            custody,
            trace,
            router,
        })
    }

    /// Replace the stage with the same id
    #[must_use]
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        if let Some(slot) = self.stages.iter_mut().find(|s| s.id() == stage.id()) {
            *slot = stage;
        }
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    #[must_use]
    pub fn custody(&self) -> &CustodyChain {
        &self.custody
    }

    #[must_use]
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// Review the case file in `folder`
    ///
    /// # Errors
    /// See [`Orchestrator::review_with_abort`]
    pub async fn review(&self, folder: &Path) -> Result<ReviewReport, ReviewError> {
        self.review_with_abort(folder, &AbortHandle::new()).await
    }

    /// Review the case file in `folder`, honouring `abort` between stages
    ///
    /// Once the run is open, a failed trace append no longer stops it: the
    /// run continues and the failure is folded in as a CRITICAL finding.
    ///
    /// # Errors
    /// - [`ReviewError::CaseFolder`] / [`ReviewError::EmptyCase`] before a run is opened
    /// - [`ReviewError::Trace`] when the run cannot be opened in the trace log
    /// - [`ReviewError::Intake`] when a document cannot be taken into custody
    /// - [`ReviewError::Aborted`] with the findings gathered so far
    pub async fn review_with_abort(&self, folder: &Path, abort: &AbortHandle) -> Result<ReviewReport, ReviewError> {
        let sources = list_case_files(folder)?;
        let case_id = case_id_for(folder);
        let trace_file = self.trace.current_file();
        let run_id = self.trace.start_run(&case_id)?;
        info!(case_id = %case_id, run_id = %run_id, documents = sources.len(), "review started");

        let mut run = RunTrace::new(&self.trace, run_id, trace_file);
        let mut case = CaseFile::new(case_id, folder);
        if let Err(e) = self.intake(&mut run, &sources, &mut case) {
            error!(case_id = %case.case_id, run_id = %run_id, "intake failed: {e}");
            run.log(TraceLevel::Error, "intake failed", attrs! { "error" => e.to_string() });
            run.end(RunStatus::Failed);
            return Err(e);
        }

        let mut state = ReviewState::NotStarted;
        let mut halted = false;
        for stage in &self.stages {
            let id = stage.id();
            if abort.is_aborted() {
                validate_transition(state, ReviewState::Aborted)?;
                warn!(case_id = %case.case_id, run_id = %run_id, next_stage = %id, "review aborted");
                run.log(
                    TraceLevel::Warn,
                    "abort requested",
                    attrs! { "next_stage" => id.as_str(), "findings" => case.findings().len() },
                );
                run.end(RunStatus::Aborted);
                run.report_failure(&mut case);
                return Err(ReviewError::Aborted {
                    run_id,
                    next_stage: id.to_string(),
                    findings: case.into_findings(),
                });
            }

            let next = ReviewState::Stage(id);
            validate_transition(state, next)?;
            state = next;
            run.enter_stage(id.as_str());
            self.run_stage(&mut run, stage.as_ref(), &mut case).await;

            if id == StageId::Quality && self.run_checkpoint(&mut run, &mut case) {
                validate_transition(state, ReviewState::Aggregating)?;
                state = ReviewState::Aggregating;
                halted = true;
                break;
            }
        }

        if state != ReviewState::Aggregating {
            validate_transition(state, ReviewState::Aggregating)?;
        }
        run.enter_stage(AGGREGATION_STAGE);
        run.report_failure(&mut case);
        let mut degraded = validate_all(case.findings_mut());
        let mut decision = decide(case.findings());
        let counts = SeverityCounts::of(case.findings());
        run.log(
            TraceLevel::Info,
            "decision",
            attrs! {
                "decision" => decision.as_str(),
                "critical" => counts.critical,
                "major" => counts.major,
                "findings" => counts.total(),
                "degraded" => degraded,
            },
        );
        run.end(if halted { RunStatus::Halted } else { RunStatus::Completed });
        // the trail could not be closed; the decision must reflect that
        if run.report_failure(&mut case) {
            degraded += validate_all(case.findings_mut());
            decision = decide(case.findings());
        }
        let decision = case.set_decision(decision);
        validate_transition(ReviewState::Aggregating, ReviewState::Decided)?;

        let report = ReviewReport::new(
            &case,
            run_id,
            self.config.profile.name.clone(),
            decision,
            halted,
            run.file().to_path_buf(),
        );
        info!(case_id = %case.case_id, run_id = %run_id, decision = %decision, halted, degraded, "review decided");
        Ok(report)
    }

    /// Take every source into custody and extract its text from the stored copy
    fn intake(&self, run: &mut RunTrace<'_>, sources: &[PathBuf], case: &mut CaseFile) -> Result<(), ReviewError> {
        for source in sources {
            let record = self.custody.ingest(source, &case.case_id)?;
            let mut document = SourceDocument::new(record);
            match self.collaborators.extractor.extract(document.stored_path()) {
                Ok(text) if text.pages.is_empty() => {
                    document.extraction_error = Some(ExtractionFailure::Empty {
                        file: document.file_name(),
                    });
                }
                Ok(text) => document.pages = text.pages,
                Err(failure) => document.extraction_error = Some(failure),
            }
            run.log(
                TraceLevel::Info,
                "document ingested",
                attrs! {
                    "file" => document.file_name(),
                    "custody_id" => document.custody.custody_id.to_string(),
                    "sha256" => document.custody.sha256.to_string(),
                    "pages" => document.pages.len(),
                    "extraction_error" => document.extraction_error.as_ref().map(ToString::to_string),
                },
            );
            case.add_document(document);
        }
        Ok(())
    }

    /// Run one stage; failures and panics become a CRITICAL finding
    async fn run_stage(&self, run: &mut RunTrace<'_>, stage: &dyn Stage, case: &mut CaseFile) {
        let id = stage.id();
        let ctx = StageContext {
            collaborators: &self.collaborators,
            profile: &self.config.profile,
            custody: &self.custody,
            router: &self.router,
        };
        let outcome = AssertUnwindSafe(stage.run(ctx, case)).catch_unwind().await;
        let mut findings = match outcome {
            Ok(Ok(findings)) => findings,
            Ok(Err(failure)) => vec![record_failure(run, &failure)],
            Err(payload) => {
                let cause = if let Some(s) = payload.downcast_ref::<&str>() {
                    format!("panicked: {s}")
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    format!("panicked: {s}")
                } else {
                    "panicked".to_string()
                };
                vec![record_failure(run, &StageFailure::new(id, cause))]
            }
        };

        let degraded = validate_all(&mut findings);
        for finding in &findings {
            run.log(
                TraceLevel::Info,
                "finding",
                attrs! {
                    "rule_id" => finding.rule_id.as_str(),
                    "severity" => finding.severity.as_str(),
                    "evidence" => finding.evidence.len(),
                    "degraded" => finding.degraded,
                },
            );
        }
        debug!(case_id = %case.case_id, stage = %id, findings = findings.len(), degraded, "stage finished");
        case.append_findings(findings);
    }

    /// Evaluate the integrity checkpoint; `true` when the run must halt
    fn run_checkpoint(&self, run: &mut RunTrace<'_>, case: &mut CaseFile) -> bool {
        run.enter_stage(CHECKPOINT_STAGE);
        let fields = std::mem::take(&mut case.fields);
        let expectations = case.expectations.clone();
        let report = IntegrityCheckpoint::new(&self.config.profile).evaluate(fields, case.findings_mut(), &expectations);

        let summary = report.summary;
        run.log(
            match report.status {
                CheckpointStatus::Ok => TraceLevel::Info,
                CheckpointStatus::Warning | CheckpointStatus::Critical => TraceLevel::Warn,
            },
            "checkpoint evaluated",
            attrs! {
                "status" => report.status.as_str(),
                "total_fields" => summary.total_fields,
                "abstained_fields" => summary.abstained_fields,
                "abstention_rate" => summary.abstention_rate,
                "structural_failures" => summary.structural_failures,
                "duplicate_keys" => summary.duplicate_keys,
                "arithmetic_failures" => summary.arithmetic_failures,
                "degraded_findings" => summary.degraded_findings,
            },
        );

        case.fields = report.fields;
        case.checkpoint = Some((report.status, summary));
        case.append_findings(report.findings);

        let Some(halt) = report.halt else {
            return false;
        };
        if !self.config.halt_on_critical {
            warn!(case_id = %case.case_id, "checkpoint is CRITICAL, continuing: {}", halt.reason);
            return false;
        }
        warn!(case_id = %case.case_id, "halting on checkpoint: {}", halt.reason);
        run.log(TraceLevel::Warn, "halt", attrs! { "reason" => halt.reason.as_str() });
        case.append_findings([halt.to_finding()]);
        true
    }
}

fn record_failure(run: &mut RunTrace<'_>, failure: &StageFailure) -> Finding {
    error!(run_id = %run.run_id, stage = %failure.stage, "{failure}");
    run.log(TraceLevel::Error, "stage failed", attrs! { "cause" => failure.cause.as_str() });
    let evidence = EvidenceRecord::builder(run.file().to_string_lossy())
        .page(1)
        .snippet(failure.to_string())
        .detected(failure.cause.clone())
        .method(ExtractionMethod::Heuristic)
        .rule(STAGE_FAILURE_RULE)
        .build();
    Finding::new(Severity::Critical, failure.stage.as_str(), STAGE_FAILURE_RULE, failure.to_string())
        .with_evidence(evidence)
        .with_action(format!("Re-run the {} stage or complete it manually", failure.stage))
        .with_area("review operations")
        .needs_review()
}

/// Trace writer for one open run
///
/// The first failed append is kept and later appends are skipped; the
/// terminal event is still attempted once. The failure surfaces as a
/// CRITICAL finding citing the trace file.
struct RunTrace<'a> {
    trace: &'a TraceLog,
    run_id: RunId,
    file: PathBuf,
    failure: Option<String>,
    reported: bool,
    ended: bool,
}

impl<'a> RunTrace<'a> {
    fn new(trace: &'a TraceLog, run_id: RunId, file: PathBuf) -> Self {
        Self {
            trace,
            run_id,
            file,
            failure: None,
            reported: false,
            ended: false,
        }
    }

    fn file(&self) -> &Path {
        &self.file
    }

    fn log(&mut self, level: TraceLevel, message: &str, attributes: Attributes) {
        if self.failure.is_none() {
            let result = self.trace.log(self.run_id, level, message, attributes);
            self.check(result);
        }
    }

    fn enter_stage(&mut self, stage_id: &str) {
        if self.failure.is_none() {
            let result = self.trace.enter_stage(self.run_id, stage_id);
            self.check(result);
        }
    }

    fn end(&mut self, status: RunStatus) {
        if !self.ended {
            self.ended = true;
            let result = self.trace.end_run(self.run_id, status);
            self.check(result);
        }
    }

    fn check(&mut self, result: Result<(), TraceError>) {
        if let Err(e) = result {
            error!(run_id = %self.run_id, "trace append failed: {e}");
            self.failure.get_or_insert_with(|| e.to_string());
        }
    }

    /// Append the failure finding once; `true` if it was added now
    fn report_failure(&mut self, case: &mut CaseFile) -> bool {
        if self.reported {
            return false;
        }
        let Some(cause) = self.failure.clone() else {
            return false;
        };
        self.reported = true;
        let evidence = EvidenceRecord::builder(self.file.to_string_lossy())
            .page(1)
            .snippet(format!("trace append failed: {cause}"))
            .detected(cause.clone())
            .method(ExtractionMethod::Heuristic)
            .rule(TRACE_FAILURE_RULE)
            .build();
        case.append_findings([Finding::new(
            Severity::Critical,
            TRACE_STAGE,
            TRACE_FAILURE_RULE,
            format!("Audit trail incomplete, trace append failed: {cause}"),
        )
        .with_evidence(evidence)
        .with_action("Restore write access to the trace directory and re-run the review")
        .with_area("review operations")
        .needs_review()]);
        true
    }
}

/// Regular, non-hidden files of a case folder in name order
fn list_case_files(folder: &Path) -> Result<Vec<PathBuf>, ReviewError> {
    let case_folder_error = |source: std::io::Error| ReviewError::CaseFolder {
        path: folder.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(case_folder_error)? {
        let entry = entry.map_err(case_folder_error)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().map_err(case_folder_error)?.is_file() {
            files.push(entry.path());
        }
    }
    if files.is_empty() {
        return Err(ReviewError::EmptyCase(folder.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

/// Case id derived from the folder name, restricted to `[A-Za-z0-9._-]`
fn case_id_for(folder: &Path) -> String {
    let name = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    if id.is_empty() || id.chars().all(|c| c == '.') {
        "case".to_string()
    } else {
        id
    }
}
