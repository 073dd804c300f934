//! Trace log writer
//!
//! Every call appends exactly one JSON line to the file of the event's
//! calendar day (`trace-YYYY-MM-DD.jsonl`, UTC). Writes are serialized by
//! one mutex per log and each line goes out in a single append-mode write.
//! Records are chained per run, so interleaved runs and day rotation keep
//! each run independently verifiable.

use crate::error::TraceError;
use crate::event::{RunId, RunStatus, TraceEvent, TraceLevel, GENESIS_HASH, RUN_STAGE};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Message of the first event of a run
pub const RUN_START: &str = "run.start";
/// Message of a stage transition event
pub const STAGE_ENTER: &str = "stage.enter";
/// Message of the terminal event of a run
pub const RUN_END: &str = "run.end";

/// Attribute map passed to [`TraceLog::log`]
pub type Attributes = BTreeMap<String, Value>;

/// Ended runs remembered to answer [`TraceError::RunClosed`]; older ones
/// are reported as unknown
const CLOSED_RUNS_KEPT: usize = 256;

#[derive(Debug)]
struct RunCursor {
    case_id: String,
    next_seq: u64,
    last_hash: String,
    stage: String,
}

#[derive(Debug, Default)]
struct Runs {
    open: HashMap<RunId, RunCursor>,
    closed: VecDeque<RunId>,
}

impl Runs {
    fn cursor(&mut self, run_id: RunId) -> Result<&mut RunCursor, TraceError> {
        if self.closed.contains(&run_id) {
            return Err(TraceError::RunClosed(run_id));
        }
        self.open.get_mut(&run_id).ok_or(TraceError::UnknownRun(run_id))
    }

    fn close(&mut self, run_id: RunId) {
        self.open.remove(&run_id);
        self.closed.push_back(run_id);
        if self.closed.len() > CLOSED_RUNS_KEPT {
            self.closed.pop_front();
        }
    }
}

/// Append-only trace log rooted at a directory
#[derive(Debug)]
pub struct TraceLog {
    dir: PathBuf,
    runs: Mutex<Runs>,
}

impl TraceLog {
    /// Open a log directory, creating it if needed
    ///
    /// # Errors
    /// Fails if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TraceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| TraceError::io(&dir, e))?;
        Ok(Self {
            dir,
            runs: Mutex::new(Runs::default()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds events of `date`
    #[must_use]
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        file_for(&self.dir, date)
    }

    /// File receiving events right now
    #[must_use]
    pub fn current_file(&self) -> PathBuf {
        self.file_for(Utc::now().date_naive())
    }

    /// Open a new run for `case_id`
    ///
    /// # Errors
    /// Fails if the start event cannot be written
    pub fn start_run(&self, case_id: &str) -> Result<RunId, TraceError> {
        let run_id = RunId::new();
        let mut runs = self.runs.lock();
        runs.open.insert(
            run_id,
            RunCursor {
                case_id: case_id.to_string(),
                next_seq: 0,
                last_hash: GENESIS_HASH.to_string(),
                stage: RUN_STAGE.to_string(),
            },
        );
        let mut attrs = Attributes::new();
        attrs.insert("case_id".into(), Value::from(case_id));
        if let Err(e) = self.append_locked(&mut runs, run_id, None, TraceLevel::Info, RUN_START, attrs) {
            runs.open.remove(&run_id);
            return Err(e);
        }
        Ok(run_id)
    }

    /// Append one event to `run_id`, stamped with the run's current stage
    ///
    /// # Errors
    /// Unknown or closed run, or an I/O failure
    pub fn log(
        &self,
        run_id: RunId,
        level: TraceLevel,
        message: &str,
        attributes: Attributes,
    ) -> Result<(), TraceError> {
        let mut runs = self.runs.lock();
        self.append_locked(&mut runs, run_id, None, level, message, attributes)
    }

    /// Record a stage transition; later events carry `stage_id`
    ///
    /// # Errors
    /// Unknown or closed run, or an I/O failure
    pub fn enter_stage(&self, run_id: RunId, stage_id: &str) -> Result<(), TraceError> {
        let mut runs = self.runs.lock();
        let previous = runs.cursor(run_id)?.stage.clone();
        let mut attrs = Attributes::new();
        attrs.insert("from".into(), Value::from(previous));
        attrs.insert("to".into(), Value::from(stage_id));
        self.append_locked(&mut runs, run_id, Some(stage_id), TraceLevel::Info, STAGE_ENTER, attrs)?;
        if let Some(cursor) = runs.open.get_mut(&run_id) {
            cursor.stage = stage_id.to_string();
        }
        Ok(())
    }

    /// Write the terminal event and drop the run's cursor
    ///
    /// # Errors
    /// Unknown or already closed run, or an I/O failure
    pub fn end_run(&self, run_id: RunId, status: RunStatus) -> Result<(), TraceError> {
        let mut runs = self.runs.lock();
        let mut attrs = Attributes::new();
        attrs.insert("status".into(), serde_json::to_value(status)?);
        let level = match status {
            RunStatus::Completed => TraceLevel::Info,
            RunStatus::Halted | RunStatus::Aborted => TraceLevel::Warn,
            RunStatus::Failed => TraceLevel::Error,
        };
        self.append_locked(&mut runs, run_id, Some(RUN_STAGE), level, RUN_END, attrs)?;
        runs.close(run_id);
        Ok(())
    }

    /// Whether `run_id` is open in this log
    #[must_use]
    pub fn is_open(&self, run_id: RunId) -> bool {
        self.runs.lock().open.contains_key(&run_id)
    }

    /// Number of runs started and not yet ended
    #[must_use]
    pub fn open_runs(&self) -> usize {
        self.runs.lock().open.len()
    }

    fn append_locked(
        &self,
        runs: &mut Runs,
        run_id: RunId,
        stage_override: Option<&str>,
        level: TraceLevel,
        message: &str,
        attributes: Attributes,
    ) -> Result<(), TraceError> {
        let cursor = runs.cursor(run_id)?;

        let timestamp = Utc::now();
        let mut event = TraceEvent {
            run_id,
            case_id: cursor.case_id.clone(),
            seq: cursor.next_seq,
            timestamp,
            stage_id: stage_override.unwrap_or(cursor.stage.as_str()).to_string(),
            level,
            message: message.to_string(),
            attributes,
            prev_hash: cursor.last_hash.clone(),
            hash: String::new(),
        };
        event.hash = event.compute_hash();

        self.write_line(timestamp, &event)?;
        emit(&event);

        cursor.next_seq += 1;
        cursor.last_hash = event.hash;
        Ok(())
    }

    fn write_line(&self, timestamp: DateTime<Utc>, event: &TraceEvent) -> Result<(), TraceError> {
        let path = self.file_for(timestamp.date_naive());
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| TraceError::io(&path, e))?;
        file.write_all(&line).map_err(|e| TraceError::io(&path, e))
    }
}

pub(crate) fn file_for(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("trace-{}.jsonl", date.format("%Y-%m-%d")))
}

fn emit(event: &TraceEvent) {
    match event.level {
        TraceLevel::Debug => tracing::debug!(run_id = %event.run_id, stage = %event.stage_id, seq = event.seq, "{}", event.message),
        TraceLevel::Info => tracing::info!(run_id = %event.run_id, stage = %event.stage_id, seq = event.seq, "{}", event.message),
        TraceLevel::Warn => tracing::warn!(run_id = %event.run_id, stage = %event.stage_id, seq = event.seq, "{}", event.message),
        TraceLevel::Error => tracing::error!(run_id = %event.run_id, stage = %event.stage_id, seq = event.seq, "{}", event.message),
    }
}
