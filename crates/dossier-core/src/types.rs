//! Review configuration

use dossier_integrity::{CalibrationProfile, ProfileName};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default custody store, relative to the working directory
pub const DEFAULT_STORE_DIR: &str = ".dossier/store";
/// Default trace directory, relative to the working directory
pub const DEFAULT_TRACE_DIR: &str = ".dossier/trace";

/// Settings of one [`crate::Orchestrator`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Thresholds shared by every component of a run
    pub profile: CalibrationProfile,
    /// Custody store root (copies and intake ledger)
    pub store_dir: PathBuf,
    /// Directory of the daily trace files
    pub trace_dir: PathBuf,
    /// Skip the remaining stages when the checkpoint is CRITICAL
    pub halt_on_critical: bool,
    /// Registry lookups in flight at once
    pub max_concurrent_lookups: usize,
}

impl ReviewConfig {
    /// Create with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_profile(mut self, profile: CalibrationProfile) -> Self {
        self.profile = profile;
        self
    }

    /// With one of the named presets
    #[inline]
    #[must_use]
    pub fn with_preset(self, name: ProfileName) -> Self {
        self.with_profile(CalibrationProfile::preset(name))
    }

    #[inline]
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_trace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_dir = dir.into();
        self
    }

    /// Store and trace directories under one root
    #[must_use]
    pub fn with_work_dir(self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.with_store_dir(root.join("store")).with_trace_dir(root.join("trace"))
    }

    #[inline]
    #[must_use]
    pub fn with_halt_on_critical(mut self, halt: bool) -> Self {
        self.halt_on_critical = halt;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_concurrent_lookups(mut self, max: usize) -> Self {
        self.max_concurrent_lookups = max.max(1);
        self
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            profile: CalibrationProfile::default(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            trace_dir: PathBuf::from(DEFAULT_TRACE_DIR),
            halt_on_critical: true,
            max_concurrent_lookups: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_halt_and_use_balanced() {
        let config = ReviewConfig::default();
        assert!(config.halt_on_critical);
        assert_eq!(config.profile.name, "balanced");
        assert_eq!(config.max_concurrent_lookups, 4);
    }

    #[test]
    fn work_dir_sets_both_directories() {
        let config = ReviewConfig::new().with_work_dir("/tmp/run").with_max_concurrent_lookups(0);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/run/store"));
        assert_eq!(config.trace_dir, PathBuf::from("/tmp/run/trace"));
        assert_eq!(config.max_concurrent_lookups, 1);
    }
}
