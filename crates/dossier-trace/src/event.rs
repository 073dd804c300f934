//! Trace events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use ulid::Ulid;

/// Hex of the all-zero digest, the first link of every run
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Stage id used for events outside any analysis stage
pub const RUN_STAGE: &str = "run";

/// Unique run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl TraceLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Terminal status written by `end_run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// All stages ran and a decision was produced
    Completed,
    /// The integrity checkpoint stopped the remaining stages
    Halted,
    /// Cancelled between stages
    Aborted,
    /// Intake or persistence failed
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Halted => "HALTED",
            Self::Aborted => "ABORTED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One self-contained trace record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub run_id: RunId,
    pub case_id: String,
    /// Position within the run, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub stage_id: String,
    pub level: TraceLevel,
    pub message: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub prev_hash: String,
    pub hash: String,
}

impl TraceEvent {
    /// Hash over every field except `hash` itself
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.run_id.to_string().as_str(),
            self.case_id.as_str(),
            self.timestamp.to_rfc3339().as_str(),
            self.stage_id.as_str(),
            self.level.as_str(),
            self.message.as_str(),
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.update(self.seq.to_le_bytes());
        // BTreeMap keeps attribute order canonical
        let attrs = serde_json::to_string(&self.attributes).unwrap_or_default();
        hasher.update((attrs.len() as u64).to_le_bytes());
        hasher.update(attrs.as_bytes());
        hasher.update(self.prev_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Status carried by a terminal `run.end` event
    #[must_use]
    pub fn run_status(&self) -> Option<RunStatus> {
        self.attributes
            .get("status")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> TraceEvent {
        TraceEvent {
            run_id: RunId::new(),
            case_id: "C".into(),
            seq: 0,
            timestamp: Utc::now(),
            stage_id: RUN_STAGE.into(),
            level: TraceLevel::Info,
            message: "m".into(),
            attributes: BTreeMap::new(),
            prev_hash: GENESIS_HASH.into(),
            hash: String::new(),
        }
    }

    #[test]
    fn hash_covers_message_and_attributes() {
        let base = event();
        let mut changed = base.clone();
        changed.message = "n".into();
        assert_ne!(base.compute_hash(), changed.compute_hash());

        let mut attr = base.clone();
        attr.attributes.insert("k".into(), serde_json::json!(1));
        assert_ne!(base.compute_hash(), attr.compute_hash());
    }

    #[test]
    fn status_round_trips_through_attributes() {
        let mut e = event();
        e.attributes
            .insert("status".into(), serde_json::to_value(RunStatus::Aborted).unwrap());
        assert_eq!(e.run_status(), Some(RunStatus::Aborted));
        assert_eq!(serde_json::to_string(&RunStatus::Aborted).unwrap(), "\"ABORTED\"");
    }
}
