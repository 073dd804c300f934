use crate::event::RunId;
use std::path::PathBuf;

/// Errors of the trace log
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error on trace file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed trace line {line} in {path}")]
    Malformed { path: PathBuf, line: usize },

    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    /// The run already received its terminal event
    #[error("run already ended: {0}")]
    RunClosed(RunId),

    /// A record of the run was edited, dropped or reordered
    #[error("trace chain of run {run_id} broken at seq {seq}")]
    BrokenChain { run_id: RunId, seq: u64 },
}

impl TraceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
