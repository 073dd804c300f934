//! Dossier Trace Log
//!
//! Append-only, newline-delimited audit trail of review runs.
//!
//! - [`TraceLog::start_run`] / [`TraceLog::log`] / [`TraceLog::end_run`]
//! - [`TraceLog::enter_stage`]: stage transitions with timestamps
//! - [`verify_run`]: per-run hash chain verification
//!
//! Records are never rewritten. Files rotate by UTC calendar day.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod event;
mod log;
mod reader;

pub use error::TraceError;
pub use event::{RunId, RunStatus, TraceEvent, TraceLevel, GENESIS_HASH, RUN_STAGE};
pub use log::{Attributes, TraceLog, RUN_END, RUN_START, STAGE_ENTER};
pub use reader::{list_runs, read_all, read_run, trace_files, verify_run, RunSummary};

/// Build an [`Attributes`] map from `key => value` pairs
///
/// ```rust
/// let attrs = dossier_trace::attrs! { "stage" => "coherence", "findings" => 3 };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => { $crate::Attributes::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Attributes::new();
        $( map.insert(($key).to_string(), $crate::__json::json!($value)); )+
        map
    }};
}

#[doc(hidden)]
pub use serde_json as __json;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
