use docsync_types::EntityType;
use serde::{Deserialize, Serialize};

/// Describes an entity type's document structure for validation and
/// labelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Top-level fields tried in order when deriving a display label.
    #[serde(default)]
    pub label_fields: Vec<String>,
}

impl EntitySchema {
    /// A schema with no declared fields; every object validates.
    pub fn new(entity_type: impl Into<EntityType>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: Vec::new(),
            label_fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_label_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Looks up a declared field by its JSON pointer.
    pub fn field(&self, path: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.field_path == path)
    }

    /// Pointers of the fields declared as dates.
    pub fn date_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.field_type == FieldType::DateTime)
            .map(|f| f.field_path.as_str())
    }
}

/// A field of a document, addressed by JSON pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// JSON pointer path (e.g., "/schoolName", "/address/city").
    pub field_path: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Allowed values. Only meaningful when FieldType is Enum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_options: Option<Vec<String>>,
}

impl FieldSpec {
    fn simple(path: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            field_path: path.into(),
            field_type,
            required,
            enum_options: None,
        }
    }

    pub fn text(path: &str, required: bool) -> Self {
        Self::simple(path, FieldType::Text, required)
    }

    /// Array of strings.
    pub fn tag(path: &str) -> Self {
        Self::simple(path, FieldType::Tag, false)
    }

    pub fn datetime(path: &str, required: bool) -> Self {
        Self::simple(path, FieldType::DateTime, required)
    }

    pub fn number(path: &str, required: bool) -> Self {
        Self::simple(path, FieldType::Number, required)
    }

    pub fn bool(path: &str) -> Self {
        Self::simple(path, FieldType::Bool, false)
    }

    /// Id of another entity (string or integer).
    pub fn relation(path: &str, required: bool) -> Self {
        Self::simple(path, FieldType::Relation, required)
    }

    pub fn json(path: &str) -> Self {
        Self::simple(path, FieldType::Json, false)
    }

    pub fn enumeration(path: &str, options: Vec<String>, required: bool) -> Self {
        Self {
            field_path: path.into(),
            field_type: FieldType::Enum,
            required,
            enum_options: Some(options),
        }
    }
}

/// The value type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Tag,
    DateTime,
    Number,
    Bool,
    Relation,
    Json,
    Enum,
}
