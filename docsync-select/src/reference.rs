//! Reference transformer: projects entities into `{value, label}` pairs for
//! pickers and typeahead inputs.
//!
//! A reference is only produced for entities with a usable id (`_id`, then
//! `id`). The label comes from a caller-supplied function; when that function
//! yields nothing or an empty string, the id stands in as the label.

use docsync_model::{Document, DocumentExt};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Derives a display label from an entity.
pub type LabelFn = Arc<dyn Fn(&Document) -> Option<String> + Send + Sync>;

/// Derives additional reference fields from an entity.
pub type ExtraFn = Arc<dyn Fn(&Document) -> Map<String, Value> + Send + Sync>;

/// Fields checked, in order, by [`default_label`].
pub const DEFAULT_LABEL_FIELDS: &[&str] = &["name", "title", "label", "displayName"];

/// A `{value, label}` pair plus any extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub value: String,
    pub label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reference carrying every field of its source entity.
///
/// Serializes as one flat object: entity fields first, then extra fields,
/// then `value` and `label`, later entries winning on name clashes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOption {
    pub reference: Reference,
    pub fields: Map<String, Value>,
}

impl ReferenceOption {
    pub fn value(&self) -> &str {
        &self.reference.value
    }

    pub fn label(&self) -> &str {
        &self.reference.label
    }

    pub fn to_value(&self) -> Value {
        let mut out = self.fields.clone();
        for (k, v) in &self.reference.extra {
            out.insert(k.clone(), v.clone());
        }
        out.insert("value".into(), Value::String(self.reference.value.clone()));
        out.insert("label".into(), Value::String(self.reference.label.clone()));
        Value::Object(out)
    }
}

impl Serialize for ReferenceOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// First non-empty string among [`DEFAULT_LABEL_FIELDS`].
pub fn default_label(doc: &Document) -> Option<String> {
    DEFAULT_LABEL_FIELDS
        .iter()
        .filter_map(|field| doc.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|label| !label.is_empty())
        .map(str::to_string)
}

/// Builds references from entities.
#[derive(Clone)]
pub struct ReferenceTransformer {
    label: LabelFn,
    extra: Option<ExtraFn>,
}

impl ReferenceTransformer {
    pub fn new(label: impl Fn(&Document) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            label: Arc::new(label),
            extra: None,
        }
    }

    /// Labels entities by the first non-empty string among `fields`.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        Self::new(move |doc| {
            fields
                .iter()
                .filter_map(|field| doc.get(field.as_str()).and_then(Value::as_str))
                .find(|label| !label.trim().is_empty())
                .map(str::to_string)
        })
    }

    pub fn with_extra(
        mut self,
        extra: impl Fn(&Document) -> Map<String, Value> + Send + Sync + 'static,
    ) -> Self {
        self.extra = Some(Arc::new(extra));
        self
    }

    /// The reference for one entity, or `None` if it has no usable id.
    pub fn transform(&self, doc: &Document) -> Option<Reference> {
        let value = doc.doc_id()?;
        let label = (self.label)(doc)
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| value.clone());
        let mut extra = self.extra.as_ref().map(|f| f(doc)).unwrap_or_default();
        extra.remove("value");
        extra.remove("label");
        Some(Reference {
            value,
            label,
            extra,
        })
    }

    /// References for every entity with a usable id, in input order.
    pub fn transform_all(&self, docs: &[Document]) -> Vec<Reference> {
        docs.iter().filter_map(|doc| self.transform(doc)).collect()
    }

    /// The reference plus every entity field.
    pub fn option(&self, doc: &Document) -> Option<ReferenceOption> {
        let reference = self.transform(doc)?;
        let fields = doc.as_object().cloned().unwrap_or_default();
        Some(ReferenceOption { reference, fields })
    }

    pub fn options(&self, docs: &[Document]) -> Vec<ReferenceOption> {
        docs.iter().filter_map(|doc| self.option(doc)).collect()
    }
}

impl Default for ReferenceTransformer {
    fn default() -> Self {
        Self::new(default_label)
    }
}

impl fmt::Debug for ReferenceTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTransformer")
            .field("extra", &self.extra.is_some())
            .finish()
    }
}
