//! Evidence records
//!
//! An [`EvidenceRecord`] is a citation: source file, page and a literal
//! text snippet, together with the value that was detected there and the
//! method that produced it. Records are immutable once built; the only way
//! to create one is through [`EvidenceRecord::builder`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of characters kept from a literal snippet.
pub const MAX_SNIPPET_CHARS: usize = 250;

/// How a value or citation was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Deterministic pattern (regex, fixed layout)
    PatternMatch,
    /// Keyword or positional heuristic
    Heuristic,
    /// Optical character recognition
    Ocr,
    /// Answer from an external registry
    ExternalLookup,
    /// Value formally withheld by the abstention policy
    Abstention,
}

impl ExtractionMethod {
    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PatternMatch => "pattern_match",
            Self::Heuristic => "heuristic",
            Self::Ocr => "ocr",
            Self::ExternalLookup => "external_lookup",
            Self::Abstention => "abstention",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pattern_match" => Ok(Self::PatternMatch),
            "heuristic" => Ok(Self::Heuristic),
            "ocr" => Ok(Self::Ocr),
            "external_lookup" => Ok(Self::ExternalLookup),
            "abstention" => Ok(Self::Abstention),
            other => Err(crate::ParseEnumError::new("extraction method", other)),
        }
    }
}

/// A citation backing a finding or a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    source_file: String,
    page: u32,
    snippet: String,
    detected_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_value: Option<String>,
    extraction_method: ExtractionMethod,
    confidence: f64,
    rule_id: String,
}

impl EvidenceRecord {
    /// Start building a record for `source_file`
    #[must_use]
    pub fn builder(source_file: impl Into<String>) -> EvidenceBuilder {
        EvidenceBuilder::new(source_file)
    }

    #[must_use]
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// 1-based page number; 0 means unknown
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    #[must_use]
    pub fn detected_value(&self) -> &str {
        &self.detected_value
    }

    #[must_use]
    pub fn expected_value(&self) -> Option<&str> {
        self.expected_value.as_deref()
    }

    #[must_use]
    pub fn extraction_method(&self) -> ExtractionMethod {
        self.extraction_method
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    /// Whether this record carries the full citation tuple
    ///
    /// Requires a non-empty file, a page of at least 1, a non-blank
    /// snippet and a non-empty rule id.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.source_file.trim().is_empty()
            && self.page >= 1
            && !self.snippet.trim().is_empty()
            && !self.rule_id.trim().is_empty()
    }

    /// `file p.N: "snippet"` form used in reports
    #[must_use]
    pub fn citation(&self) -> String {
        format!("{} p.{}: \"{}\"", self.source_file, self.page, self.snippet)
    }
}

/// Builder for [`EvidenceRecord`]
#[derive(Debug, Clone)]
pub struct EvidenceBuilder {
    source_file: String,
    page: u32,
    snippet: String,
    detected_value: String,
    expected_value: Option<String>,
    extraction_method: ExtractionMethod,
    confidence: f64,
    rule_id: String,
}

impl EvidenceBuilder {
    fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            page: 0,
            snippet: String::new(),
            detected_value: String::new(),
            expected_value: None,
            extraction_method: ExtractionMethod::PatternMatch,
            confidence: 1.0,
            rule_id: String::new(),
        }
    }

    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Literal text; truncated to [`MAX_SNIPPET_CHARS`] characters
    #[must_use]
    pub fn snippet(mut self, snippet: impl AsRef<str>) -> Self {
        self.snippet = truncate_snippet(snippet.as_ref());
        self
    }

    #[must_use]
    pub fn detected(mut self, value: impl Into<String>) -> Self {
        self.detected_value = value.into();
        self
    }

    #[must_use]
    pub fn expected(mut self, value: impl Into<String>) -> Self {
        self.expected_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: ExtractionMethod) -> Self {
        self.extraction_method = method;
        self
    }

    /// Confidence, clamped into `[0, 1]`; NaN becomes 0
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = rule_id.into();
        self
    }

    #[must_use]
    pub fn build(self) -> EvidenceRecord {
        EvidenceRecord {
            source_file: self.source_file,
            page: self.page,
            snippet: self.snippet,
            detected_value: self.detected_value,
            expected_value: self.expected_value,
            extraction_method: self.extraction_method,
            confidence: self.confidence,
            rule_id: self.rule_id,
        }
    }
}

/// Collapse whitespace and cut to [`MAX_SNIPPET_CHARS`] on a char boundary
#[must_use]
pub fn truncate_snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_SNIPPET_CHARS {
        return collapsed;
    }
    collapsed.chars().take(MAX_SNIPPET_CHARS).collect()
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> EvidenceRecord {
        EvidenceRecord::builder("invoice.pdf")
            .page(2)
            .snippet("Total: 118.00")
            .detected("118.00")
            .rule("ARITH-001")
            .build()
    }

    #[test]
    fn complete_record_has_full_tuple() {
        assert!(full().is_complete());
    }

    #[test]
    fn page_zero_is_incomplete() {
        let rec = EvidenceRecord::builder("invoice.pdf")
            .snippet("Total")
            .rule("R")
            .build();
        assert!(!rec.is_complete());
    }

    #[test]
    fn blank_snippet_is_incomplete() {
        let rec = EvidenceRecord::builder("a.pdf").page(1).snippet("   ").rule("R").build();
        assert!(!rec.is_complete());
    }

    #[test]
    fn missing_rule_is_incomplete() {
        let rec = EvidenceRecord::builder("a.pdf").page(1).snippet("x").build();
        assert!(!rec.is_complete());
    }

    #[test]
    fn snippet_is_truncated_on_char_boundary() {
        let long = "ñ".repeat(400);
        let rec = EvidenceRecord::builder("a").snippet(&long).build();
        assert_eq!(rec.snippet().chars().count(), MAX_SNIPPET_CHARS);
    }

    #[test]
    fn snippet_whitespace_is_collapsed() {
        assert_eq!(truncate_snippet("  a \n\t b  "), "a b");
    }

    #[test]
    fn confidence_is_clamped() {
        let rec = EvidenceRecord::builder("a").confidence(1.7).build();
        assert!((rec.confidence() - 1.0).abs() < f64::EPSILON);
        let rec = EvidenceRecord::builder("a").confidence(f64::NAN).build();
        assert!(rec.confidence().abs() < f64::EPSILON);
    }

    #[test]
    fn method_names_parse_back() {
        for m in [
            ExtractionMethod::PatternMatch,
            ExtractionMethod::Heuristic,
            ExtractionMethod::Ocr,
            ExtractionMethod::ExternalLookup,
            ExtractionMethod::Abstention,
        ] {
            assert_eq!(m.as_str().parse::<ExtractionMethod>().unwrap(), m);
        }
    }

    #[test]
    fn citation_format() {
        assert_eq!(full().citation(), "invoice.pdf p.2: \"Total: 118.00\"");
    }
}
