//! Entity selectors: schema-validated projections of raw payloads.
//!
//! Every projection starts from [`EntitySelector::basic`], which normalizes
//! the payload shape and drops items the validator rejects. Projections are
//! total: malformed input yields an empty result, never a panic.

use crate::normalize;
use crate::reference::{Reference, ReferenceOption, ReferenceTransformer};
use docsync_model::{AcceptAll, DatedValue, Document, EntitySchema, SchemaValidator, Validator};
use docsync_store::{CachedValue, Paginated};
use docsync_types::EntityType;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Read-path projections for one entity type. Immutable once built.
#[derive(Clone)]
pub struct EntitySelector {
    schema: EntitySchema,
    validator: Arc<dyn Validator>,
    references: ReferenceTransformer,
}

impl EntitySelector {
    /// A selector validating with [`SchemaValidator`].
    ///
    /// References are labelled by the schema's label fields when it declares
    /// any, otherwise by the default label rule.
    pub fn new(schema: EntitySchema) -> Self {
        Self::with_validator(schema, Arc::new(SchemaValidator))
    }

    pub fn with_validator(schema: EntitySchema, validator: Arc<dyn Validator>) -> Self {
        let references = if schema.label_fields.is_empty() {
            ReferenceTransformer::default()
        } else {
            ReferenceTransformer::from_fields(schema.label_fields.iter().cloned())
        };
        Self {
            schema,
            validator,
            references,
        }
    }

    /// A schema-less selector accepting every object.
    pub fn permissive(entity_type: EntityType) -> Self {
        Self::with_validator(EntitySchema::new(entity_type), Arc::new(AcceptAll))
    }

    pub fn with_references(mut self, references: ReferenceTransformer) -> Self {
        self.references = references;
        self
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.schema.entity_type
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn references(&self) -> &ReferenceTransformer {
        &self.references
    }

    /// Valid documents of a raw payload, in payload order.
    pub fn basic(&self, raw: &Value) -> Vec<Document> {
        self.filter_valid(normalize::items(raw))
    }

    /// Valid documents deserialized into `T`; items that fail either step
    /// are excluded.
    pub fn basic_as<T: DeserializeOwned>(&self, raw: &Value) -> Vec<T> {
        let docs = self.basic(raw);
        let total = docs.len();
        let typed: Vec<T> = docs
            .into_iter()
            .filter_map(|doc| serde_json::from_value(doc).ok())
            .collect();
        if typed.len() < total {
            debug!(
                "Excluded {} {} item(s) that failed to deserialize",
                total - typed.len(),
                self.entity_type()
            );
        }
        typed
    }

    /// [`basic`](Self::basic) over an already cached value.
    pub fn basic_cached(&self, value: &CachedValue) -> Vec<Document> {
        self.filter_valid(value.items())
    }

    /// The first valid document.
    pub fn detail(&self, raw: &Value) -> Option<Document> {
        normalize::items(raw)
            .iter()
            .find_map(|item| self.validator.validate(&self.schema, item))
    }

    pub fn detail_cached(&self, value: &CachedValue) -> Option<Document> {
        value
            .items()
            .iter()
            .find_map(|item| self.validator.validate(&self.schema, item))
    }

    /// Valid documents with date-like strings converted to dates.
    pub fn with_dates(&self, raw: &Value) -> Vec<DatedValue> {
        self.basic(raw).iter().map(DatedValue::from_json).collect()
    }

    pub fn reference(&self, raw: &Value) -> Vec<Reference> {
        self.references.transform_all(&self.basic(raw))
    }

    /// References carrying every entity field, for typeahead options.
    pub fn with_options(&self, raw: &Value) -> Vec<ReferenceOption> {
        self.references.options(&self.basic(raw))
    }

    /// Valid documents plus pagination read from the payload.
    pub fn paginated(&self, raw: &Value) -> Paginated {
        let items = self.basic(raw);
        let pagination = normalize::pagination(raw, items.len());
        Paginated { items, pagination }
    }

    /// Composes [`basic`](Self::basic) with a per-item mapping.
    pub fn transform<'a, R, F>(&'a self, f: F) -> impl Fn(&Value) -> Vec<R> + 'a
    where
        R: 'a,
        F: Fn(&Document) -> R + 'a,
    {
        move |raw| self.basic(raw).iter().map(&f).collect()
    }

    /// True if `doc` satisfies the schema.
    pub fn validate(&self, doc: &Value) -> bool {
        self.validator.validate(&self.schema, doc).is_some()
    }

    fn filter_valid(&self, items: &[Value]) -> Vec<Document> {
        let valid: Vec<Document> = items
            .iter()
            .filter_map(|item| self.validator.validate(&self.schema, item))
            .collect();
        let excluded = items.len() - valid.len();
        if excluded > 0 {
            debug!(
                "Excluded {} invalid {} item(s) of {}",
                excluded,
                self.entity_type(),
                items.len()
            );
        }
        valid
    }
}

impl fmt::Debug for EntitySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySelector")
            .field("entity_type", self.entity_type())
            .field("fields", &self.schema.fields.len())
            .finish()
    }
}
