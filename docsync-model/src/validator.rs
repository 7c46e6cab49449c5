use crate::dates::parse_date;
use crate::{EntitySchema, FieldSpec, FieldType};
use serde_json::Value;

/// The schema validation collaborator.
///
/// `validate` returns the (possibly normalized) value when it satisfies the
/// schema and `None` otherwise. Implementations must not panic: selectors
/// call this on every item of every read.
pub trait Validator: Send + Sync {
    fn validate(&self, schema: &EntitySchema, value: &Value) -> Option<Value>;
}

/// Accepts any JSON object unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _schema: &EntitySchema, value: &Value) -> Option<Value> {
        value.is_object().then(|| value.clone())
    }
}

/// Checks required fields and declared field types.
///
/// Undeclared fields pass through untouched; `null` counts as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl Validator for SchemaValidator {
    fn validate(&self, schema: &EntitySchema, value: &Value) -> Option<Value> {
        if !value.is_object() {
            return None;
        }
        for field in &schema.fields {
            match value.pointer(&field.field_path) {
                None | Some(Value::Null) => {
                    if field.required {
                        return None;
                    }
                }
                Some(v) => {
                    if !field_matches(field, v) {
                        return None;
                    }
                }
            }
        }
        Some(value.clone())
    }
}

fn field_matches(field: &FieldSpec, value: &Value) -> bool {
    match field.field_type {
        FieldType::Text => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Bool => value.is_boolean(),
        FieldType::Json => true,
        FieldType::Tag => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        FieldType::Relation => match value {
            Value::String(s) => !s.is_empty(),
            Value::Number(_) => true,
            _ => false,
        },
        FieldType::DateTime => value.as_str().is_some_and(|s| parse_date(s).is_some()),
        FieldType::Enum => match (value.as_str(), &field.enum_options) {
            (Some(s), Some(options)) => options.iter().any(|o| o == s),
            (Some(_), None) => true,
            (None, _) => false,
        },
    }
}
