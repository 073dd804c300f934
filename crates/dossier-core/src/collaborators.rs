//! External collaborators
//!
//! Everything the decision core consumes but does not implement: text
//! extraction, document classification, field extraction, requirement
//! lists and external registries. Built-in implementations live in
//! [`crate::builtin`].

use crate::case::{DocumentCategory, DocumentNature, PageText, Regime, SourceDocument};
use crate::error::{ExtractionFailure, Inconclusive};
use async_trait::async_trait;
use dossier_evidence::{ExtractedField, FieldType};
use dossier_integrity::{SumRule, UniqueKey};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Text by page with per-page confidence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub pages: Vec<PageText>,
}

/// Text/OCR engine
pub trait TextExtractor: Send + Sync {
    /// Extract the text of the file at `path`
    ///
    /// # Errors
    /// [`ExtractionFailure`] when nothing usable could be read
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractionFailure>;
}

/// Pattern library for categories, natures and regimes
pub trait DocumentClassifier: Send + Sync {
    fn categorize(&self, file_name: &str, text: &str) -> DocumentCategory;
    fn nature(&self, text: &str) -> DocumentNature;
    fn regime(&self, text: &str) -> Regime;
}

/// Reads typed fields from a classified document
pub trait FieldExtractor: Send + Sync {
    fn extract_fields(&self, document: &SourceDocument) -> Vec<ExtractedField>;
}

/// A field a document group must carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredField {
    pub name: String,
    pub field_type: FieldType,
}

/// Requirements for one document group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSpec {
    pub category: DocumentCategory,
    pub rule_id: String,
    pub required_fields: Vec<RequiredField>,
    /// Minimum populated fields for the group to count as present
    pub min_populated_fields: usize,
    pub requires_signature: bool,
}

impl RequirementSpec {
    #[must_use]
    pub fn new(category: DocumentCategory, rule_id: impl Into<String>) -> Self {
        Self {
            category,
            rule_id: rule_id.into(),
            required_fields: Vec::new(),
            min_populated_fields: 1,
            requires_signature: false,
        }
    }

    #[must_use]
    pub fn field(mut self, name: &str, field_type: FieldType) -> Self {
        self.required_fields.push(RequiredField {
            name: name.to_string(),
            field_type,
        });
        self
    }

    #[must_use]
    pub fn min_fields(mut self, min: usize) -> Self {
        self.min_populated_fields = min;
        self
    }

    #[must_use]
    pub fn signed(mut self) -> Self {
        self.requires_signature = true;
        self
    }
}

/// Uniqueness and arithmetic rules applying to a case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRules {
    pub unique_keys: Vec<UniqueKey>,
    pub sum_rules: Vec<SumRule>,
}

/// Required-document lists keyed by nature and regime
pub trait RequirementCatalog: Send + Sync {
    fn required_documents(&self, nature: DocumentNature, regime: Regime) -> Vec<RequirementSpec>;

    fn checkpoint_rules(&self, _nature: DocumentNature, _regime: Regime) -> CheckpointRules {
        CheckpointRules::default()
    }
}

/// Standing of an identifier in an external registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistryStatus {
    Active,
    Inactive { detail: String },
    Sanctioned { detail: String },
}

impl RegistryStatus {
    /// Whether this status blocks the case
    #[must_use]
    pub fn is_adverse(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Conclusive registry answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAnswer {
    pub registry: String,
    pub identifier: String,
    pub status: RegistryStatus,
}

/// One external registry
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    fn name(&self) -> &str;

    /// Look up `identifier`
    ///
    /// # Errors
    /// [`Inconclusive`] when the registry gives no usable answer
    async fn lookup(&self, identifier: &str) -> Result<RegistryStatus, Inconclusive>;
}

/// Ordered list of registries, stopping at the first conclusive answer
#[derive(Clone)]
pub struct RegistryRouter {
    lookups: Vec<Arc<dyn RegistryLookup>>,
    timeout: Duration,
    max_concurrent: usize,
    excluded: BTreeSet<String>,
}

impl std::fmt::Debug for RegistryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryRouter")
            .field("lookups", &self.lookups.iter().map(|l| l.name()).collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("max_concurrent", &self.max_concurrent)
            .field("excluded", &self.excluded)
            .finish()
    }
}

impl RegistryRouter {
    #[must_use]
    pub fn new(lookups: Vec<Arc<dyn RegistryLookup>>, timeout: Duration) -> Self {
        Self {
            lookups,
            timeout,
            max_concurrent: 4,
            excluded: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Identifiers never sent to any registry
    #[must_use]
    pub fn with_excluded(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.excluded.extend(ids.into_iter().map(|id| normalize_identifier(&id)));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    #[must_use]
    pub fn is_excluded(&self, identifier: &str) -> bool {
        self.excluded.contains(&normalize_identifier(identifier))
    }

    /// Resolve one identifier through the ordered registries
    ///
    /// Each attempt is bounded by the router's timeout. When every registry
    /// is inconclusive the last inconclusive result is returned.
    ///
    /// # Errors
    /// [`Inconclusive`] when no registry answered conclusively
    pub async fn resolve(&self, identifier: &str) -> Result<RegistryAnswer, Inconclusive> {
        let mut last = Inconclusive::Unavailable {
            registry: "router".to_string(),
            reason: "no registries configured".to_string(),
        };
        for lookup in &self.lookups {
            let attempt = tokio::time::timeout(self.timeout, lookup.lookup(identifier)).await;
            match attempt {
                Ok(Ok(status)) => {
                    return Ok(RegistryAnswer {
                        registry: lookup.name().to_string(),
                        identifier: identifier.to_string(),
                        status,
                    })
                }
                Ok(Err(inconclusive)) => {
                    tracing::debug!(registry = lookup.name(), identifier, "inconclusive: {inconclusive}");
                    last = inconclusive;
                }
                Err(_) => {
                    tracing::warn!(registry = lookup.name(), identifier, "registry lookup timed out");
                    last = Inconclusive::Timeout {
                        registry: lookup.name().to_string(),
                        identifier: identifier.to_string(),
                        after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    };
                }
            }
        }
        Err(last)
    }

    /// Resolve many identifiers concurrently, in first-seen order
    ///
    /// Duplicates (after normalization) and excluded identifiers are
    /// dropped before any lookup. At most `max_concurrent` identifiers are
    /// in flight at once; all of them are awaited.
    pub async fn resolve_all<I>(&self, identifiers: I) -> Vec<(String, Result<RegistryAnswer, Inconclusive>)>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = BTreeSet::new();
        let unique: Vec<String> = identifiers
            .into_iter()
            .filter(|id| !self.is_excluded(id))
            .filter(|id| seen.insert(normalize_identifier(id)))
            .collect();
        stream::iter(unique)
            .map(|id| async move {
                let result = self.resolve(&id).await;
                (id, result)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}

/// Identifier without separators, upper-cased
#[must_use]
pub fn normalize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Every collaborator an orchestrator needs
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn TextExtractor>,
    pub classifier: Arc<dyn DocumentClassifier>,
    pub fields: Arc<dyn FieldExtractor>,
    pub catalog: Arc<dyn RequirementCatalog>,
    pub registries: Vec<Arc<dyn RegistryLookup>>,
}

impl Collaborators {
    /// Built-in text collaborators and no external registries
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            extractor: Arc::new(crate::builtin::PlainTextExtractor),
            classifier: Arc::new(crate::builtin::KeywordClassifier),
            fields: Arc::new(crate::builtin::LabeledFieldExtractor::new()),
            catalog: Arc::new(crate::builtin::StaticRequirementCatalog::standard()),
            registries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn DocumentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_field_extractor(mut self, fields: Arc<dyn FieldExtractor>) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn RequirementCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Append a registry after those already configured
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn RegistryLookup>) -> Self {
        self.registries.push(registry);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("registries", &self.registries.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
