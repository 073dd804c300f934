//! Case-level expectations checked by the integrity checkpoint
//!
//! Structural completeness, natural-key uniqueness and arithmetic
//! consistency. Each check reads fields after abstention and returns
//! evidence-backed findings; none of them mutates its input.

use crate::amount::{amounts_agree, parse_amount};
use dossier_evidence::{EvidenceRecord, ExtractedField, ExtractionMethod, Finding, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stage name recorded on checkpoint findings
pub const CHECKPOINT_STAGE: &str = "integrity_checkpoint";
pub const UNIQUENESS_RULE: &str = "CHK-UNIQ-001";

/// Minimum populated fields expected from one document group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupExpectation {
    pub group: String,
    pub min_populated_fields: usize,
    pub rule_id: String,
}

impl GroupExpectation {
    #[must_use]
    pub fn new(group: impl Into<String>, min_populated_fields: usize, rule_id: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            min_populated_fields,
            rule_id: rule_id.into(),
        }
    }
}

/// A field whose value acts as a natural key within the case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueKey {
    pub field_name: String,
    #[serde(default)]
    pub allow_duplicates: bool,
}

impl UniqueKey {
    #[must_use]
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            allow_duplicates: false,
        }
    }
}

/// `total_field` must equal the sum of `component_fields` within a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumRule {
    pub rule_id: String,
    pub total_field: String,
    pub component_fields: Vec<String>,
}

impl SumRule {
    #[must_use]
    pub fn new(rule_id: impl Into<String>, total_field: impl Into<String>, components: &[&str]) -> Self {
        Self {
            rule_id: rule_id.into(),
            total_field: total_field.into(),
            component_fields: components.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// Listing of the files received for a case
///
/// Absent documents have no page to cite, so findings about them cite
/// this listing instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseInventory {
    pub folder: String,
    pub files: Vec<String>,
}

impl CaseInventory {
    #[must_use]
    pub fn new(folder: impl Into<String>, files: impl IntoIterator<Item = String>) -> Self {
        Self {
            folder: folder.into(),
            files: files.into_iter().collect(),
        }
    }

    /// One-line listing used as snippet
    #[must_use]
    pub fn listing(&self) -> String {
        if self.files.is_empty() {
            "files received: (none)".to_string()
        } else {
            format!("files received: {}", self.files.join(", "))
        }
    }

    /// Evidence citing the listing, with `expected` as the missing item
    #[must_use]
    pub fn evidence(&self, rule_id: &str, expected: &str) -> EvidenceRecord {
        EvidenceRecord::builder(self.folder.clone())
            .page(1)
            .snippet(self.listing())
            .detected(format!("{} file(s)", self.files.len()))
            .expected(expected)
            .method(ExtractionMethod::Heuristic)
            .rule(rule_id)
            .build()
    }
}

/// Everything the checkpoint needs to know about a case beyond its fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseExpectations {
    pub groups: Vec<GroupExpectation>,
    pub unique_keys: Vec<UniqueKey>,
    pub sum_rules: Vec<SumRule>,
    pub inventory: CaseInventory,
}

impl CaseExpectations {
    #[must_use]
    pub fn new(inventory: CaseInventory) -> Self {
        Self {
            inventory,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn expect_group(mut self, expectation: GroupExpectation) -> Self {
        self.groups.push(expectation);
        self
    }

    #[must_use]
    pub fn unique(mut self, key: UniqueKey) -> Self {
        self.unique_keys.push(key);
        self
    }

    #[must_use]
    pub fn sum(mut self, rule: SumRule) -> Self {
        self.sum_rules.push(rule);
        self
    }
}

/// Groups below their populated-field minimum, one CRITICAL finding each
#[must_use]
pub fn check_structure(fields: &[ExtractedField], expectations: &CaseExpectations) -> Vec<Finding> {
    let mut populated: BTreeMap<&str, usize> = BTreeMap::new();
    for f in fields.iter().filter(|f| f.is_populated()) {
        *populated.entry(f.group.as_str()).or_default() += 1;
    }
    expectations
        .groups
        .iter()
        .filter(|g| g.min_populated_fields > 0)
        .filter_map(|g| {
            let found = populated.get(g.group.as_str()).copied().unwrap_or(0);
            (found < g.min_populated_fields).then(|| {
                Finding::new(
                    Severity::Critical,
                    CHECKPOINT_STAGE,
                    g.rule_id.clone(),
                    format!(
                        "Document group '{}' has {found} usable field(s), {} required",
                        g.group, g.min_populated_fields
                    ),
                )
                .with_evidence(expectations.inventory.evidence(&g.rule_id, &g.group))
                .with_action(format!("Provide a legible '{}' document", g.group))
                .with_area(g.group.clone())
                .needs_review()
            })
        })
        .collect()
}

/// Natural keys shared by more than one document, one MAJOR finding per value
#[must_use]
pub fn check_uniqueness(fields: &[ExtractedField], expectations: &CaseExpectations) -> Vec<Finding> {
    let mut findings = Vec::new();
    for key in expectations.unique_keys.iter().filter(|k| !k.allow_duplicates) {
        let mut by_value: BTreeMap<String, Vec<&ExtractedField>> = BTreeMap::new();
        for f in fields.iter().filter(|f| f.field_name == key.field_name && f.is_populated()) {
            let value = normalize_key(f.value.as_deref().unwrap_or_default());
            by_value.entry(value).or_default().push(f);
        }
        for (value, holders) in by_value {
            let files: BTreeSet<&str> = holders.iter().map(|f| f.source_file.as_str()).collect();
            if files.len() < 2 {
                continue;
            }
            let count = files.len();
            let listed = files.into_iter().collect::<Vec<_>>().join(", ");
            findings.push(
                Finding::new(
                    Severity::Major,
                    CHECKPOINT_STAGE,
                    UNIQUENESS_RULE,
                    format!(
                        "'{}' value {value} appears in {count} documents: {listed}",
                        key.field_name
                    ),
                )
                .with_all_evidence(holders.iter().map(|f| f.to_evidence(UNIQUENESS_RULE)))
                .with_action("Confirm whether the documents describe the same record")
                .with_area("document review"),
            );
        }
    }
    findings
}

/// Totals that do not match their components, checked per document
///
/// Rules are skipped for a document unless its total and every component
/// were read; abstained values are never guessed.
#[must_use]
pub fn check_arithmetic(fields: &[ExtractedField], expectations: &CaseExpectations, tolerance: f64) -> Vec<Finding> {
    let mut by_file: BTreeMap<&str, Vec<&ExtractedField>> = BTreeMap::new();
    for f in fields.iter().filter(|f| f.is_populated()) {
        by_file.entry(f.source_file.as_str()).or_default().push(f);
    }

    let mut findings = Vec::new();
    for (file, doc_fields) in by_file {
        let lookup = |name: &str| doc_fields.iter().copied().find(|f| f.field_name == name);
        for rule in &expectations.sum_rules {
            let Some(total) = lookup(rule.total_field.as_str()) else {
                continue;
            };
            let components: Option<Vec<&ExtractedField>> =
                rule.component_fields.iter().map(|c| lookup(c.as_str())).collect();
            let Some(components) = components.filter(|c| !c.is_empty()) else {
                continue;
            };
            let Some(stated) = total.value.as_deref().and_then(parse_amount) else {
                continue;
            };
            let parts: Option<Vec<f64>> = components
                .iter()
                .map(|c| c.value.as_deref().and_then(parse_amount))
                .collect();
            let Some(parts) = parts else {
                continue;
            };
            let sum: f64 = parts.iter().sum();
            if amounts_agree(sum, stated, tolerance) {
                continue;
            }

            let total_evidence = EvidenceRecord::builder(total.source_file.clone())
                .page(total.page)
                .snippet(if total.snippet.is_empty() {
                    total.value.as_deref().unwrap_or_default()
                } else {
                    total.snippet.as_str()
                })
                .detected(total.value.clone().unwrap_or_default())
                .expected(format!("{sum:.2}"))
                .method(total.extraction_method)
                .confidence(total.confidence)
                .rule(rule.rule_id.clone())
                .build();
            findings.push(
                Finding::new(
                    Severity::Major,
                    CHECKPOINT_STAGE,
                    rule.rule_id.clone(),
                    format!(
                        "In {file}, '{}' states {stated:.2} but {} sum to {sum:.2}",
                        rule.total_field,
                        rule.component_fields.join(" + ")
                    ),
                )
                .with_evidence(total_evidence)
                .with_all_evidence(components.iter().map(|c| c.to_evidence(&rule.rule_id)))
                .with_action("Reconcile the stated total with its components")
                .with_area("financial review"),
            );
        }
    }
    findings
}

fn normalize_key(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_evidence::FieldType;

    fn amount(name: &str, value: &str, file: &str) -> ExtractedField {
        ExtractedField::new(name, FieldType::Amount, value, file, 2)
            .with_snippet(format!("{name}: {value}"))
            .in_group("invoice")
    }

    fn expectations() -> CaseExpectations {
        CaseExpectations::new(CaseInventory::new("case-17", vec!["invoice.txt".to_string()]))
            .expect_group(GroupExpectation::new("invoice", 2, "CHK-STRUCT-INV"))
            .expect_group(GroupExpectation::new("contract", 1, "CHK-STRUCT-CON"))
            .unique(UniqueKey::new("invoice_number"))
            .sum(SumRule::new("CHK-ARITH-001", "total", &["subtotal", "tax"]))
    }

    #[test]
    fn missing_group_cites_inventory() {
        let fields = vec![amount("subtotal", "100.00", "invoice.txt"), amount("tax", "18.00", "invoice.txt")];
        let findings = check_structure(&fields, &expectations());
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.rule_id, "CHK-STRUCT-CON");
        assert!(f.has_sufficient_evidence());
        assert_eq!(f.evidence[0].source_file(), "case-17");
        assert!(f.evidence[0].snippet().contains("invoice.txt"));
    }

    #[test]
    fn abstained_fields_do_not_count_as_populated() {
        let fields = vec![
            amount("subtotal", "100.00", "invoice.txt"),
            amount("tax", "18.00", "invoice.txt").abstained(),
            ExtractedField::new("party", FieldType::Name, "ACME", "contract.txt", 1).in_group("contract"),
        ];
        let findings = check_structure(&fields, &expectations());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "CHK-STRUCT-INV");
    }

    #[test]
    fn shared_key_across_documents_is_major() {
        let fields = vec![
            ExtractedField::new("invoice_number", FieldType::Identifier, "FV-0091", "a.txt", 1),
            ExtractedField::new("invoice_number", FieldType::Identifier, "fv 0091", "b.txt", 1),
            ExtractedField::new("invoice_number", FieldType::Identifier, "FV-0092", "c.txt", 1),
        ];
        let findings = check_uniqueness(&fields, &expectations());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Major);
        assert_eq!(findings[0].evidence.len(), 2);
    }

    #[test]
    fn repeated_key_within_one_document_is_fine() {
        let fields = vec![
            ExtractedField::new("invoice_number", FieldType::Identifier, "FV-0091", "a.txt", 1),
            ExtractedField::new("invoice_number", FieldType::Identifier, "FV-0091", "a.txt", 3),
        ];
        assert!(check_uniqueness(&fields, &expectations()).is_empty());
    }

    #[test]
    fn allowed_duplicates_are_skipped() {
        let mut exp = expectations();
        exp.unique_keys[0].allow_duplicates = true;
        let fields = vec![
            ExtractedField::new("invoice_number", FieldType::Identifier, "FV-0091", "a.txt", 1),
            ExtractedField::new("invoice_number", FieldType::Identifier, "FV-0091", "b.txt", 1),
        ];
        assert!(check_uniqueness(&fields, &exp).is_empty());
    }

    #[test]
    fn total_mismatch_is_major_with_all_operands() {
        let fields = vec![
            amount("subtotal", "100.00", "invoice.txt"),
            amount("tax", "18.00", "invoice.txt"),
            amount("total", "119.00", "invoice.txt"),
        ];
        let findings = check_arithmetic(&fields, &expectations(), 0.01);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Major);
        assert_eq!(findings[0].evidence.len(), 3);
        assert_eq!(findings[0].evidence[0].expected_value(), Some("118.00"));
    }

    #[test]
    fn matching_total_and_missing_component_pass() {
        let ok = vec![
            amount("subtotal", "100.00", "invoice.txt"),
            amount("tax", "18.00", "invoice.txt"),
            amount("total", "118.00", "invoice.txt"),
        ];
        assert!(check_arithmetic(&ok, &expectations(), 0.01).is_empty());

        let partial = vec![amount("subtotal", "100.00", "invoice.txt"), amount("total", "119.00", "invoice.txt")];
        assert!(check_arithmetic(&partial, &expectations(), 0.01).is_empty());
    }

    #[test]
    fn components_in_other_documents_are_not_mixed() {
        let fields = vec![
            amount("subtotal", "100.00", "a.txt"),
            amount("tax", "18.00", "b.txt"),
            amount("total", "119.00", "a.txt"),
        ];
        assert!(check_arithmetic(&fields, &expectations(), 0.01).is_empty());
    }
}
