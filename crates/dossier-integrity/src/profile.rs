//! Calibration profiles
//!
//! Every threshold used by the abstention policy and the integrity
//! checkpoint lives in a [`CalibrationProfile`]. Three presets ship with
//! the crate; custom profiles are small JSON documents that override
//! named thresholds of a preset:
//!
//! ```json
//! {
//!   "name": "tax-audit",
//!   "extends": "conservative",
//!   "thresholds": { "identifier.accept": 0.95, "checkpoint.critical_abstention_rate": 0.15 }
//! }
//! ```

use dossier_evidence::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Per-field-type thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldThreshold {
    /// Confidence at or above which a field is LEGIBLE
    pub accept: f64,
    /// Confidence below which a field is abstained
    pub abstain: f64,
    /// Minimum supporting snippet length for LEGIBLE
    pub min_snippet_chars: usize,
}

impl FieldThreshold {
    #[must_use]
    pub const fn new(accept: f64, abstain: f64, min_snippet_chars: usize) -> Self {
        Self {
            accept,
            abstain,
            min_snippet_chars,
        }
    }
}

/// Aggregate thresholds of the integrity checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointThresholds {
    pub warning_abstention_rate: f64,
    pub critical_abstention_rate: f64,
    /// WARNING when arithmetic failures exceed this count
    pub warning_arithmetic_failures: usize,
    /// CRITICAL when arithmetic failures exceed this count
    pub critical_arithmetic_failures: usize,
    /// Allowed absolute difference between a total and its components
    pub amount_tolerance: f64,
}

/// Named preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    Conservative,
    #[default]
    Balanced,
    Permissive,
}

impl ProfileName {
    pub const ALL: [ProfileName; 3] = [Self::Conservative, Self::Balanced, Self::Permissive];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Permissive => "permissive",
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProfileError::UnknownPreset(s.to_string()))
    }
}

/// Immutable set of thresholds, passed explicitly to each component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub name: String,
    pub field_thresholds: BTreeMap<FieldType, FieldThreshold>,
    pub checkpoint: CheckpointThresholds,
    /// Pages read below this confidence are reported as poorly legible
    pub page_legibility_min: f64,
    /// Timeout applied to each external registry lookup
    pub lookup_timeout_ms: u64,
    /// Identifiers never sent to external registries
    #[serde(default)]
    pub excluded_identifiers: Vec<String>,
}

impl CalibrationProfile {
    /// Built-in preset
    #[must_use]
    pub fn preset(name: ProfileName) -> Self {
        // identifier, amount, date, name, signature, count, free_text
        let (shift, checkpoint, page_min, timeout) = match name {
            ProfileName::Conservative => (
                0.05,
                CheckpointThresholds {
                    warning_abstention_rate: 0.05,
                    critical_abstention_rate: 0.20,
                    warning_arithmetic_failures: 0,
                    critical_arithmetic_failures: 0,
                    amount_tolerance: 0.01,
                },
                0.70,
                8_000,
            ),
            ProfileName::Balanced => (
                0.0,
                CheckpointThresholds {
                    warning_abstention_rate: 0.10,
                    critical_abstention_rate: 0.30,
                    warning_arithmetic_failures: 0,
                    critical_arithmetic_failures: 2,
                    amount_tolerance: 0.01,
                },
                0.60,
                5_000,
            ),
            ProfileName::Permissive => (
                -0.10,
                CheckpointThresholds {
                    warning_abstention_rate: 0.20,
                    critical_abstention_rate: 0.50,
                    warning_arithmetic_failures: 1,
                    critical_arithmetic_failures: 4,
                    amount_tolerance: 0.05,
                },
                0.50,
                3_000,
            ),
        };
        let base = [
            (FieldType::Identifier, 0.90, 0.70, 4),
            (FieldType::Amount, 0.85, 0.65, 3),
            (FieldType::Date, 0.80, 0.60, 6),
            (FieldType::Name, 0.75, 0.55, 3),
            (FieldType::Signature, 0.70, 0.50, 3),
            (FieldType::Count, 0.80, 0.60, 1),
            (FieldType::FreeText, 0.60, 0.40, 0),
        ];
        let field_thresholds = base
            .into_iter()
            .map(|(t, accept, abstain, snippet)| {
                let accept: f64 = accept + shift;
                let abstain: f64 = abstain + shift;
                (t, FieldThreshold::new(round2(accept.min(0.99)), round2(abstain.max(0.0)), snippet))
            })
            .collect();
        Self {
            name: name.as_str().to_string(),
            field_thresholds,
            checkpoint,
            page_legibility_min: page_min,
            lookup_timeout_ms: timeout,
            excluded_identifiers: Vec::new(),
        }
    }

    /// Thresholds for `field_type`, falling back to free text
    #[must_use]
    pub fn threshold_for(&self, field_type: FieldType) -> FieldThreshold {
        self.field_thresholds
            .get(&field_type)
            .or_else(|| self.field_thresholds.get(&FieldType::FreeText))
            .copied()
            .unwrap_or(FieldThreshold::new(0.6, 0.4, 0))
    }

    /// Replace the thresholds of one field type
    #[must_use]
    pub fn with_field_threshold(mut self, field_type: FieldType, threshold: FieldThreshold) -> Self {
        self.field_thresholds.insert(field_type, threshold);
        self
    }

    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: CheckpointThresholds) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    #[must_use]
    pub fn with_excluded_identifiers(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.excluded_identifiers.extend(ids);
        self
    }

    /// Set one threshold by its dotted name
    ///
    /// # Errors
    /// Unknown names and values that are not valid for the threshold
    pub fn set_threshold(&mut self, name: &str, value: f64) -> Result<(), ProfileError> {
        let invalid = || ProfileError::InvalidValue {
            name: name.to_string(),
            value,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }
        if let Some((group, key)) = name.split_once('.') {
            if group == "checkpoint" {
                let cp = &mut self.checkpoint;
                match key {
                    "warning_abstention_rate" => cp.warning_abstention_rate = unit(value).ok_or_else(invalid)?,
                    "critical_abstention_rate" => cp.critical_abstention_rate = unit(value).ok_or_else(invalid)?,
                    "warning_arithmetic_failures" => cp.warning_arithmetic_failures = count(value).ok_or_else(invalid)?,
                    "critical_arithmetic_failures" => cp.critical_arithmetic_failures = count(value).ok_or_else(invalid)?,
                    "amount_tolerance" => cp.amount_tolerance = value,
                    _ => return Err(ProfileError::UnknownThreshold(name.to_string())),
                }
                return Ok(());
            }
            let field_type: FieldType = group
                .parse()
                .map_err(|_| ProfileError::UnknownThreshold(name.to_string()))?;
            let mut t = self.threshold_for(field_type);
            match key {
                "accept" => t.accept = unit(value).ok_or_else(invalid)?,
                "abstain" => t.abstain = unit(value).ok_or_else(invalid)?,
                "min_snippet_chars" => t.min_snippet_chars = count(value).ok_or_else(invalid)?,
                _ => return Err(ProfileError::UnknownThreshold(name.to_string())),
            }
            self.field_thresholds.insert(field_type, t);
            return Ok(());
        }
        match name {
            "page_legibility_min" => self.page_legibility_min = unit(value).ok_or_else(invalid)?,
            "lookup_timeout_ms" => {
                self.lookup_timeout_ms = count(value).ok_or_else(invalid)? as u64;
            }
            _ => return Err(ProfileError::UnknownThreshold(name.to_string())),
        }
        Ok(())
    }

    /// Check cross-threshold consistency
    ///
    /// # Errors
    /// The first inconsistency found
    pub fn validate(&self) -> Result<(), ProfileError> {
        for (field_type, t) in &self.field_thresholds {
            if !(0.0..=1.0).contains(&t.accept) || !(0.0..=1.0).contains(&t.abstain) || t.abstain > t.accept {
                return Err(ProfileError::Inconsistent(format!(
                    "{field_type}: abstain {} must not exceed accept {} and both must lie in [0, 1]",
                    t.abstain, t.accept
                )));
            }
        }
        let cp = &self.checkpoint;
        if cp.warning_abstention_rate <= 0.0 || cp.warning_abstention_rate > cp.critical_abstention_rate {
            return Err(ProfileError::Inconsistent(format!(
                "abstention rates: warning {} must be positive and not exceed critical {}",
                cp.warning_abstention_rate, cp.critical_abstention_rate
            )));
        }
        if cp.warning_arithmetic_failures > cp.critical_arithmetic_failures {
            return Err(ProfileError::Inconsistent(format!(
                "arithmetic failures: warning {} exceeds critical {}",
                cp.warning_arithmetic_failures, cp.critical_arithmetic_failures
            )));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(ProfileError::Inconsistent("lookup_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Build a profile from a JSON profile document
    ///
    /// # Errors
    /// Malformed JSON, unknown preset or threshold, invalid values
    pub fn from_json_str(json: &str) -> Result<Self, ProfileError> {
        let doc: ProfileDocument = serde_json::from_str(json)?;
        let mut profile = Self::preset(doc.extends.unwrap_or_default());
        profile.name = doc.name;
        for (name, value) in &doc.thresholds {
            profile.set_threshold(name, *value)?;
        }
        profile.excluded_identifiers.extend(doc.excluded_identifiers);
        profile.validate()?;
        Ok(profile)
    }

    /// Load a JSON profile document from disk
    ///
    /// # Errors
    /// I/O failures and everything [`Self::from_json_str`] rejects
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let profile = Self::from_json_str(&text)?;
        tracing::info!(profile = %profile.name, "loaded calibration profile from {}", path.display());
        Ok(profile)
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::preset(ProfileName::Balanced)
    }
}

/// On-disk form of a custom profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub name: String,
    #[serde(default)]
    pub extends: Option<ProfileName>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, f64>,
    #[serde(default)]
    pub excluded_identifiers: Vec<String>,
}

/// Errors loading or validating a profile
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("unknown profile preset: '{0}'")]
    UnknownPreset(String),

    #[error("unknown threshold: '{0}'")]
    UnknownThreshold(String),

    #[error("invalid value {value} for threshold '{name}'")]
    InvalidValue { name: String, value: f64 },

    #[error("inconsistent profile: {0}")]
    Inconsistent(String),

    #[error("malformed profile document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("io error reading profile {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn unit(value: f64) -> Option<f64> {
    (0.0..=1.0).contains(&value).then_some(value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(value: f64) -> Option<usize> {
    (value.fract() == 0.0 && value >= 0.0).then_some(value as usize)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
