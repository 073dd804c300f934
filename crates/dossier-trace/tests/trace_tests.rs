use dossier_trace::{
    attrs, list_runs, read_run, trace_files, verify_run, RunId, RunStatus, TraceError, TraceLevel,
    TraceLog, RUN_END, RUN_START, STAGE_ENTER,
};
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn run_lifecycle_is_recorded_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();

    let run = log.start_run("CASE-1").unwrap();
    log.enter_stage(run, "classification").unwrap();
    log.log(run, TraceLevel::Info, "classified", attrs! { "nature" => "service_contract" })
        .unwrap();
    log.end_run(run, RunStatus::Completed).unwrap();

    let events = read_run(dir.path(), run).unwrap();
    let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec![RUN_START, STAGE_ENTER, "classified", RUN_END]);
    assert_eq!(events[2].stage_id, "classification");
    assert_eq!(events[3].run_status(), Some(RunStatus::Completed));
    assert_eq!(verify_run(dir.path(), run).unwrap(), 4);
    assert!(!log.is_open(run));
}

#[test]
fn closed_run_rejects_appends() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();
    let run = log.start_run("CASE-1").unwrap();
    log.end_run(run, RunStatus::Aborted).unwrap();

    let err = log.log(run, TraceLevel::Info, "late", attrs! {}).unwrap_err();
    assert!(matches!(err, TraceError::RunClosed(_)));
    assert!(matches!(log.end_run(run, RunStatus::Completed), Err(TraceError::RunClosed(_))));
}

#[test]
fn ended_runs_release_their_cursors() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();
    let mut last = None;
    for i in 0..400 {
        let run = log.start_run(&format!("CASE-{i}")).unwrap();
        log.end_run(run, RunStatus::Completed).unwrap();
        last = Some(run);
    }
    let open = log.start_run("CASE-open").unwrap();

    assert_eq!(log.open_runs(), 1);
    assert!(log.is_open(open));
    let err = log.log(last.unwrap(), TraceLevel::Info, "late", attrs! {}).unwrap_err();
    assert!(matches!(err, TraceError::RunClosed(_)));
}

#[test]
fn unknown_run_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();
    let err = log.log(RunId::new(), TraceLevel::Info, "x", attrs! {}).unwrap_err();
    assert!(matches!(err, TraceError::UnknownRun(_)));
}

#[test]
fn interleaved_runs_verify_independently() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();
    let a = log.start_run("CASE-A").unwrap();
    let b = log.start_run("CASE-B").unwrap();
    for i in 0..5 {
        log.log(a, TraceLevel::Debug, "tick", attrs! { "i" => i }).unwrap();
        log.log(b, TraceLevel::Warn, "tock", attrs! { "i" => i }).unwrap();
    }
    log.end_run(a, RunStatus::Completed).unwrap();
    log.end_run(b, RunStatus::Halted).unwrap();

    assert_eq!(verify_run(dir.path(), a).unwrap(), 7);
    assert_eq!(verify_run(dir.path(), b).unwrap(), 7);

    let runs = list_runs(dir.path()).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().any(|r| r.case_id == "CASE-B" && r.status == Some(RunStatus::Halted)));
}

#[test]
fn edited_record_breaks_chain() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();
    let run = log.start_run("CASE-1").unwrap();
    log.log(run, TraceLevel::Info, "decision PROCEED", attrs! {}).unwrap();
    log.end_run(run, RunStatus::Completed).unwrap();

    let file = &trace_files(dir.path()).unwrap()[0];
    let text = fs::read_to_string(file).unwrap();
    fs::write(file, text.replace("decision PROCEED", "decision DO_NOT_PROCEED")).unwrap();

    assert!(matches!(
        verify_run(dir.path(), run),
        Err(TraceError::BrokenChain { seq: 1, .. })
    ));
}

#[test]
fn dropped_record_breaks_chain() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();
    let run = log.start_run("CASE-1").unwrap();
    log.log(run, TraceLevel::Info, "one", attrs! {}).unwrap();
    log.log(run, TraceLevel::Info, "two", attrs! {}).unwrap();

    let file = &trace_files(dir.path()).unwrap()[0];
    let kept: Vec<String> = fs::read_to_string(file)
        .unwrap()
        .lines()
        .filter(|l| !l.contains("\"one\""))
        .map(str::to_string)
        .collect();
    fs::write(file, kept.join("\n") + "\n").unwrap();

    assert!(matches!(verify_run(dir.path(), run), Err(TraceError::BrokenChain { seq: 1, .. })));
}

#[test]
fn logs_are_written_to_the_day_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = TraceLog::open(dir.path()).unwrap();
    let run = log.start_run("CASE-1").unwrap();
    let _ = run;
    let files = trace_files(dir.path()).unwrap();
    assert_eq!(files, vec![log.current_file()]);
}
