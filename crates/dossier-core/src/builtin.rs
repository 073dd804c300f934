//! Built-in collaborators for plain-text case files
//!
//! Enough to run the pipeline end to end on UTF-8 documents. None of this
//! is part of the decision core; real deployments plug in their own OCR
//! engine, pattern libraries and catalogs through [`crate::collaborators`].

use crate::case::{DocumentCategory, DocumentNature, PageText, Regime, SourceDocument};
use crate::collaborators::{
    CheckpointRules, DocumentClassifier, ExtractedText, FieldExtractor, RequirementCatalog, RequirementSpec,
    TextExtractor,
};
use crate::error::ExtractionFailure;
use dossier_evidence::{ExtractedField, ExtractionMethod, FieldType};
use dossier_integrity::{SumRule, UniqueKey};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Page separator of plain-text documents
pub const PAGE_BREAK: char = '\u{000C}';
/// Optional first line of a page carrying its OCR confidence
pub const CONFIDENCE_HEADER: &str = "#confidence=";

/// UTF-8 text files, pages split on form feed
///
/// A page whose first line is `#confidence=<0..1>` reports that
/// confidence; other pages report 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractionFailure> {
        let file = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let bytes = std::fs::read(path).map_err(|e| ExtractionFailure::unreadable(&file, e))?;
        let text = String::from_utf8(bytes).map_err(|_| ExtractionFailure::Unsupported { file: file.clone() })?;
        if text.trim().is_empty() {
            return Err(ExtractionFailure::Empty { file });
        }

        let pages = (1u32..)
            .zip(text.split(PAGE_BREAK))
            .map(|(number, raw)| {
                let (confidence, body) = split_confidence_header(raw);
                PageText::new(number, body.trim_matches('\n'), confidence)
            })
            .collect();
        Ok(ExtractedText { pages })
    }
}

fn split_confidence_header(raw: &str) -> (f64, &str) {
    let trimmed = raw.trim_start_matches(['\n', '\r']);
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    match first.trim().strip_prefix(CONFIDENCE_HEADER) {
        Some(value) => (value.trim().parse().unwrap_or(0.0), rest),
        None => (1.0, trimmed),
    }
}

const CATEGORY_KEYWORDS: &[(DocumentCategory, &[&str])] = &[
    (DocumentCategory::PowerOfAttorney, &["power of attorney", "poder especial", "poder general"]),
    (DocumentCategory::InsurancePolicy, &["insurance policy", "policy number", "poliza", "póliza"]),
    (DocumentCategory::Invoice, &["invoice", "factura"]),
    (DocumentCategory::ProgressReport, &["progress report", "informe de avance", "acta de avance"]),
    (DocumentCategory::Certificate, &["certificate", "certificado", "registration"]),
    (DocumentCategory::Contract, &["contract", "contrato", "agreement"]),
];

const NATURE_KEYWORDS: &[(DocumentNature, &[&str])] = &[
    (DocumentNature::PublicWorks, &["public works", "obra pública", "obra publica", "construction works"]),
    (DocumentNature::Consulting, &["consulting", "consultancy", "consultoría", "consultoria"]),
    (DocumentNature::SupplyContract, &["supply of", "supply contract", "suministro"]),
    (DocumentNature::ServiceContract, &["services", "service contract", "prestación de servicios"]),
];

const REGIME_KEYWORDS: &[(Regime, &[&str])] = &[
    (Regime::Special, &["special regime", "régimen especial", "regimen especial"]),
    (Regime::Public, &["public procurement", "public entity", "ley 80", "entidad estatal"]),
    (Regime::Private, &["private law", "private parties", "derecho privado"]),
];

/// Keyword lookup tables for category, nature and regime
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

fn first_match<T: Copy>(table: &[(T, &[&str])], haystack: &str) -> Option<T> {
    let haystack = haystack.to_lowercase();
    table
        .iter()
        .find(|(_, words)| words.iter().any(|w| haystack.contains(w)))
        .map(|(value, _)| *value)
}

impl DocumentClassifier for KeywordClassifier {
    fn categorize(&self, file_name: &str, text: &str) -> DocumentCategory {
        let stem = file_name.replace(['_', '-', '.'], " ");
        let head: String = text.chars().take(600).collect();
        first_match(CATEGORY_KEYWORDS, &stem)
            .or_else(|| first_match(CATEGORY_KEYWORDS, &head))
            .unwrap_or(DocumentCategory::Unknown)
    }

    fn nature(&self, text: &str) -> DocumentNature {
        first_match(NATURE_KEYWORDS, text).unwrap_or(DocumentNature::Unknown)
    }

    fn regime(&self, text: &str) -> Regime {
        first_match(REGIME_KEYWORDS, text).unwrap_or(Regime::Unknown)
    }
}

const FIELD_LABELS: &[(&str, &str, FieldType)] = &[
    ("contract number", "contract_number", FieldType::Identifier),
    ("contract no", "contract_number", FieldType::Identifier),
    ("contractor", "contractor", FieldType::Name),
    ("tax id", "tax_id", FieldType::Identifier),
    ("nit", "tax_id", FieldType::Identifier),
    ("invoice number", "invoice_number", FieldType::Identifier),
    ("invoice no", "invoice_number", FieldType::Identifier),
    ("policy number", "policy_number", FieldType::Identifier),
    ("insured amount", "insured_amount", FieldType::Amount),
    ("subtotal", "subtotal", FieldType::Amount),
    ("tax", "tax", FieldType::Amount),
    ("vat", "tax", FieldType::Amount),
    ("total", "total", FieldType::Amount),
    ("contract value", "contract_value", FieldType::Amount),
    ("issue date", "issue_date", FieldType::Date),
    ("date", "issue_date", FieldType::Date),
    ("signed by", "signature", FieldType::Signature),
    ("signature", "signature", FieldType::Signature),
    ("legal representative", "authorized_representative", FieldType::Name),
    ("authorized representative", "authorized_representative", FieldType::Name),
    ("declared pages", "declared_pages", FieldType::Count),
    ("delay days", "delay_days", FieldType::Count),
    ("penalty amount", "penalty_amount", FieldType::Amount),
    ("object", "object", FieldType::FreeText),
];

fn label_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?m)^[ \t]*([A-Za-z][A-Za-z .]{0,40}?)[ \t]*:[ \t]*(\S.*?)[ \t]*$").ok())
        .as_ref()
}

/// `Label: value` lines mapped to typed fields
///
/// Each field inherits its page's confidence. Unknown labels are ignored.
#[derive(Debug, Clone)]
pub struct LabeledFieldExtractor {
    labels: BTreeMap<String, (String, FieldType)>,
}

impl LabeledFieldExtractor {
    #[must_use]
    pub fn new() -> Self {
        let labels = FIELD_LABELS
            .iter()
            .map(|(label, name, ty)| ((*label).to_string(), ((*name).to_string(), *ty)))
            .collect();
        Self { labels }
    }

    /// Map an extra label to a field
    #[must_use]
    pub fn with_label(mut self, label: &str, field_name: &str, field_type: FieldType) -> Self {
        self.labels
            .insert(label.to_lowercase(), (field_name.to_string(), field_type));
        self
    }
}

impl Default for LabeledFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for LabeledFieldExtractor {
    fn extract_fields(&self, document: &SourceDocument) -> Vec<ExtractedField> {
        let Some(pattern) = label_pattern() else {
            return Vec::new();
        };
        let file = document.file_name();
        let mut fields = Vec::new();
        for page in &document.pages {
            for caps in pattern.captures_iter(&page.text) {
                let label = caps[1].trim().trim_end_matches('.').to_lowercase();
                let Some((name, field_type)) = self.labels.get(&label) else {
                    continue;
                };
                fields.push(
                    ExtractedField::new(name.clone(), *field_type, &caps[2], file.clone(), page.number)
                        .with_confidence(page.confidence)
                        .with_method(if page.confidence < 1.0 {
                            ExtractionMethod::Ocr
                        } else {
                            ExtractionMethod::PatternMatch
                        })
                        .with_snippet(&caps[0])
                        .in_group(document.category.as_str()),
                );
            }
        }
        fields
    }
}

/// Requirement lists keyed by `(nature, regime)` with a fallback list
#[derive(Debug, Clone, Default)]
pub struct StaticRequirementCatalog {
    table: BTreeMap<(DocumentNature, Regime), Vec<RequirementSpec>>,
    fallback: Vec<RequirementSpec>,
    rules: CheckpointRules,
}

impl StaticRequirementCatalog {
    #[must_use]
    pub fn new(fallback: Vec<RequirementSpec>) -> Self {
        Self {
            table: BTreeMap::new(),
            fallback,
            rules: CheckpointRules::default(),
        }
    }

    #[must_use]
    pub fn with_entry(mut self, nature: DocumentNature, regime: Regime, specs: Vec<RequirementSpec>) -> Self {
        self.table.insert((nature, regime), specs);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: CheckpointRules) -> Self {
        self.rules = rules;
        self
    }

    /// Contract and invoice for every case, plus insurance and a registry
    /// certificate for public works and public-regime cases
    #[must_use]
    pub fn standard() -> Self {
        let contract = RequirementSpec::new(DocumentCategory::Contract, "REQ-CONTRACT")
            .field("contract_number", FieldType::Identifier)
            .field("contractor", FieldType::Name)
            .field("signature", FieldType::Signature)
            .min_fields(2)
            .signed();
        let invoice = RequirementSpec::new(DocumentCategory::Invoice, "REQ-INVOICE")
            .field("invoice_number", FieldType::Identifier)
            .field("total", FieldType::Amount)
            .min_fields(2);
        let policy = RequirementSpec::new(DocumentCategory::InsurancePolicy, "REQ-POLICY")
            .field("policy_number", FieldType::Identifier)
            .field("insured_amount", FieldType::Amount);
        let certificate = RequirementSpec::new(DocumentCategory::Certificate, "REQ-CERTIFICATE")
            .field("tax_id", FieldType::Identifier);

        let base = vec![contract, invoice];
        let mut public = base.clone();
        public.extend([policy, certificate]);

        let mut catalog = Self::new(base.clone()).with_rules(CheckpointRules {
            unique_keys: vec![UniqueKey::new("invoice_number"), UniqueKey::new("policy_number")],
            sum_rules: vec![SumRule::new("ARITH-INVOICE-TOTAL", "total", &["subtotal", "tax"])],
        });
        for nature in DocumentNature::ALL {
            catalog.table.insert((*nature, Regime::Public), public.clone());
        }
        for regime in Regime::ALL {
            catalog
                .table
                .insert((DocumentNature::PublicWorks, *regime), public.clone());
        }
        catalog
    }
}

impl RequirementCatalog for StaticRequirementCatalog {
    fn required_documents(&self, nature: DocumentNature, regime: Regime) -> Vec<RequirementSpec> {
        self.table
            .get(&(nature, regime))
            .unwrap_or(&self.fallback)
            .clone()
    }

    fn checkpoint_rules(&self, _nature: DocumentNature, _regime: Regime) -> CheckpointRules {
        self.rules.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dossier_custody::{CustodyId, CustodyRecord, Sha256Digest};
    use std::path::PathBuf;

    fn document(name: &str, pages: Vec<PageText>, category: DocumentCategory) -> SourceDocument {
        let mut doc = SourceDocument::new(CustodyRecord {
            custody_id: CustodyId::new(),
            case_id: "C-1".into(),
            original_path: PathBuf::from(format!("/cases/C-1/{name}")),
            stored_copy_path: PathBuf::from(format!("/store/C-1/{name}")),
            sha256: Sha256Digest::zero(),
            size_bytes: 0,
            ingestion_timestamp: Utc::now(),
        });
        doc.pages = pages;
        doc.category = category;
        doc
    }

    #[test]
    fn pages_split_on_form_feed_with_confidence_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.txt");
        std::fs::write(&path, "Contract No: CT-1\n\u{000C}#confidence=0.42\nblurry text\n").unwrap();

        let text = PlainTextExtractor.extract(&path).unwrap();
        assert_eq!(text.pages.len(), 2);
        assert_eq!(text.pages[0].number, 1);
        assert!((text.pages[0].confidence - 1.0).abs() < f64::EPSILON);
        assert!((text.pages[1].confidence - 0.42).abs() < 1e-9);
        assert_eq!(text.pages[1].text, "blurry text");
    }

    #[test]
    fn empty_and_binary_files_fail_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "  \n").unwrap();
        assert!(matches!(PlainTextExtractor.extract(&empty), Err(ExtractionFailure::Empty { .. })));

        let binary = dir.path().join("scan.pdf");
        std::fs::write(&binary, [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        assert!(matches!(
            PlainTextExtractor.extract(&binary),
            Err(ExtractionFailure::Unsupported { .. })
        ));
    }

    #[test]
    fn classifier_prefers_file_name() {
        let c = KeywordClassifier;
        assert_eq!(c.categorize("invoice_0091.txt", "Contract reference CT-1"), DocumentCategory::Invoice);
        assert_eq!(c.categorize("scan01.txt", "SERVICE CONTRACT between"), DocumentCategory::Contract);
        assert_eq!(c.categorize("notes.txt", "misc"), DocumentCategory::Unknown);
        assert_eq!(c.nature("Provision of consulting services"), DocumentNature::Consulting);
        assert_eq!(c.regime("Governed by public procurement law"), Regime::Public);
        assert_eq!(c.regime("nothing here"), Regime::Unknown);
    }

    #[test]
    fn labeled_lines_become_typed_fields() {
        let doc = document(
            "contract.txt",
            vec![
                PageText::new(1, "SERVICE CONTRACT\nContract No: CT-118\nContractor: Obras Andinas SAS", 0.97),
                PageText::new(2, "Signed by: Ana Ruiz\nFavourite colour: blue", 1.0),
            ],
            DocumentCategory::Contract,
        );
        let fields = LabeledFieldExtractor::new().extract_fields(&doc);
        let names: Vec<&str> = fields.iter().map(|f| f.field_name.as_str()).collect();
        assert_eq!(names, vec!["contract_number", "contractor", "signature"]);
        assert_eq!(fields[0].value.as_deref(), Some("CT-118"));
        assert_eq!(fields[0].snippet, "Contract No: CT-118");
        assert_eq!(fields[0].extraction_method, ExtractionMethod::Ocr);
        assert_eq!(fields[2].page, 2);
        assert_eq!(fields[2].group, "contract");
    }

    #[test]
    fn catalog_adds_public_requirements() {
        let catalog = StaticRequirementCatalog::standard();
        let private = catalog.required_documents(DocumentNature::ServiceContract, Regime::Private);
        let public = catalog.required_documents(DocumentNature::ServiceContract, Regime::Public);
        assert_eq!(private.len(), 2);
        assert_eq!(public.len(), 4);
        assert!(public.iter().any(|r| r.category == DocumentCategory::InsurancePolicy));
    }
}
