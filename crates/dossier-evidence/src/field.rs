//! Extracted fields
//!
//! Values pulled out of source documents by an extraction stage. A field
//! is never edited after creation; the abstention policy may only swap it
//! for its [`ExtractedField::abstained`] counterpart.

use crate::evidence::{clamp_confidence, truncate_snippet, EvidenceRecord, ExtractionMethod};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of value a field carries; selects the abstention thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Tax ids, contract numbers, invoice numbers
    Identifier,
    /// Monetary amounts
    Amount,
    Date,
    /// Person or company names
    Name,
    /// Signature blocks and signatory names
    Signature,
    /// Counts such as pages or days
    Count,
    FreeText,
}

impl FieldType {
    /// All variants, in threshold-table order
    pub const ALL: [FieldType; 7] = [
        Self::Identifier,
        Self::Amount,
        Self::Date,
        Self::Name,
        Self::Signature,
        Self::Count,
        Self::FreeText,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Amount => "amount",
            Self::Date => "date",
            Self::Name => "name",
            Self::Signature => "signature",
            Self::Count => "count",
            Self::FreeText => "free_text",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = crate::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::ParseEnumError::new("field type", s))
    }
}

/// Legibility verdict for a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionStatus {
    /// Trusted
    Legible,
    /// Kept, but below the acceptance threshold
    Incomplete,
    /// Abstained
    Illegible,
}

/// A value extracted from a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub field_name: String,
    pub value: Option<String>,
    pub source_file: String,
    /// 1-based page; 0 when unknown
    pub page: u32,
    pub confidence: f64,
    pub extraction_method: ExtractionMethod,
    pub field_type: FieldType,
    /// Literal text the value was read from
    #[serde(default)]
    pub snippet: String,
    /// Document group (category) the source document belongs to
    #[serde(default)]
    pub group: String,
}

impl ExtractedField {
    /// Create a field with a value
    #[must_use]
    pub fn new(
        field_name: impl Into<String>,
        field_type: FieldType,
        value: impl Into<String>,
        source_file: impl Into<String>,
        page: u32,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            value: Some(value.into()),
            source_file: source_file.into(),
            page,
            confidence: 1.0,
            extraction_method: ExtractionMethod::PatternMatch,
            field_type,
            snippet: String::new(),
            group: String::new(),
        }
    }

    /// Placeholder for a field whose source could not be read at all
    #[must_use]
    pub fn unreadable(
        field_name: impl Into<String>,
        field_type: FieldType,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            value: None,
            source_file: source_file.into(),
            page: 0,
            confidence: 0.0,
            extraction_method: ExtractionMethod::Ocr,
            field_type,
            snippet: String::new(),
            group: String::new(),
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: ExtractionMethod) -> Self {
        self.extraction_method = method;
        self
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: impl AsRef<str>) -> Self {
        self.snippet = truncate_snippet(snippet.as_ref());
        self
    }

    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// The abstained replacement of this field
    ///
    /// Keeps the provenance (file, page, snippet, group) and discards the
    /// value and confidence.
    #[must_use]
    pub fn abstained(&self) -> Self {
        Self {
            field_name: self.field_name.clone(),
            value: None,
            source_file: self.source_file.clone(),
            page: self.page,
            confidence: 0.0,
            extraction_method: ExtractionMethod::Abstention,
            field_type: self.field_type,
            snippet: self.snippet.clone(),
            group: self.group.clone(),
        }
    }

    #[must_use]
    pub fn is_abstained(&self) -> bool {
        self.extraction_method == ExtractionMethod::Abstention
    }

    /// Whether the field carries a non-blank value
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    /// Evidence record citing where this field was read
    #[must_use]
    pub fn to_evidence(&self, rule_id: &str) -> EvidenceRecord {
        let snippet = if self.snippet.is_empty() {
            self.value.clone().unwrap_or_default()
        } else {
            self.snippet.clone()
        };
        EvidenceRecord::builder(self.source_file.clone())
            .page(self.page)
            .snippet(snippet)
            .detected(self.value.clone().unwrap_or_default())
            .method(self.extraction_method)
            .confidence(self.confidence)
            .rule(rule_id)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abstained_keeps_provenance_only() {
        let field = ExtractedField::new("tax_id", FieldType::Identifier, "900123456", "rut.pdf", 1)
            .with_confidence(0.4)
            .with_snippet("NIT 900123456")
            .in_group("registration");
        let a = field.abstained();
        assert_eq!(a.value, None);
        assert!(a.confidence.abs() < f64::EPSILON);
        assert_eq!(a.extraction_method, ExtractionMethod::Abstention);
        assert_eq!(a.source_file, "rut.pdf");
        assert_eq!(a.page, 1);
        assert_eq!(a.snippet, "NIT 900123456");
        assert_eq!(a.group, "registration");
        assert!(a.is_abstained());
    }

    #[test]
    fn blank_value_is_not_populated() {
        let f = ExtractedField::new("name", FieldType::Name, "  ", "a.pdf", 1);
        assert!(!f.is_populated());
        assert!(!ExtractedField::unreadable("name", FieldType::Name, "a.pdf").is_populated());
    }

    #[test]
    fn evidence_falls_back_to_value_when_no_snippet() {
        let f = ExtractedField::new("total", FieldType::Amount, "118.00", "inv.pdf", 2);
        let ev = f.to_evidence("R");
        assert_eq!(ev.snippet(), "118.00");
        assert!(ev.is_complete());
    }

    #[test]
    fn field_type_round_trips_through_str() {
        for t in FieldType::ALL {
            assert_eq!(t.as_str().parse::<FieldType>().unwrap(), t);
        }
        assert!("nope".parse::<FieldType>().is_err());
    }
}
