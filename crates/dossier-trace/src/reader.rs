//! Reading and verifying trace files

use crate::error::TraceError;
use crate::event::{RunId, RunStatus, TraceEvent, GENESIS_HASH};
use crate::log::{RUN_END, RUN_START};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Summary of one run found in a trace directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub case_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub events: usize,
    /// `None` if the run never wrote its terminal event
    pub status: Option<RunStatus>,
}

/// Trace files of `dir`, oldest day first
///
/// # Errors
/// Fails if the directory cannot be listed
pub fn trace_files(dir: &Path) -> Result<Vec<PathBuf>, TraceError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| TraceError::io(dir, e))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("trace-") && n.ends_with(".jsonl"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Every event of every run in `dir`, in file then line order
///
/// # Errors
/// I/O failures or malformed lines
pub fn read_all(dir: &Path) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events = Vec::new();
    for path in trace_files(dir)? {
        let file = File::open(&path).map_err(|e| TraceError::io(&path, e))?;
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| TraceError::io(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|_| TraceError::Malformed {
                path: path.clone(),
                line: i + 1,
            })?;
            events.push(event);
        }
    }
    Ok(events)
}

/// Events of one run ordered by sequence number
///
/// # Errors
/// I/O failures or malformed lines
pub fn read_run(dir: &Path, run_id: RunId) -> Result<Vec<TraceEvent>, TraceError> {
    let mut events: Vec<TraceEvent> = read_all(dir)?
        .into_iter()
        .filter(|e| e.run_id == run_id)
        .collect();
    events.sort_by_key(|e| e.seq);
    Ok(events)
}

/// Check the hash chain of one run, returning its event count
///
/// # Errors
/// [`TraceError::UnknownRun`] if the run has no events,
/// [`TraceError::BrokenChain`] at the first gap, edit or reordering.
pub fn verify_run(dir: &Path, run_id: RunId) -> Result<usize, TraceError> {
    let events = read_run(dir, run_id)?;
    if events.is_empty() {
        return Err(TraceError::UnknownRun(run_id));
    }
    let mut prev = GENESIS_HASH.to_string();
    for (expected_seq, e) in (0u64..).zip(events.iter()) {
        if e.seq != expected_seq || e.prev_hash != prev || e.hash != e.compute_hash() {
            return Err(TraceError::BrokenChain {
                run_id,
                seq: expected_seq,
            });
        }
        prev.clone_from(&e.hash);
    }
    Ok(events.len())
}

/// One summary per run found in `dir`, ordered by run id
///
/// # Errors
/// I/O failures or malformed lines
pub fn list_runs(dir: &Path) -> Result<Vec<RunSummary>, TraceError> {
    let mut runs: BTreeMap<RunId, RunSummary> = BTreeMap::new();
    for e in read_all(dir)? {
        let summary = runs.entry(e.run_id).or_insert_with(|| RunSummary {
            run_id: e.run_id,
            case_id: e.case_id.clone(),
            started_at: None,
            events: 0,
            status: None,
        });
        summary.events += 1;
        if e.message == RUN_START {
            summary.started_at = Some(e.timestamp);
        }
        if e.message == RUN_END {
            summary.status = e.run_status();
        }
    }
    Ok(runs.into_values().collect())
}
