use docsync_types::document_id;
use serde_json::Value;

/// A raw document as stored by the remote collaborator.
///
/// Documents are JSON objects carrying an `_id` and/or `id` field; everything
/// else is defined by the entity's schema.
pub type Document = Value;

/// Accessors over raw documents.
pub trait DocumentExt {
    /// The document id, `_id` before `id`.
    fn doc_id(&self) -> Option<String>;

    /// Returns true if either id field equals `id`.
    fn has_id(&self, id: &str) -> bool;

    /// Extract a string value using a JSON pointer (e.g., "/title").
    fn get_str(&self, pointer: &str) -> Option<&str>;

    /// Extract a boolean value using a JSON pointer.
    fn get_bool(&self, pointer: &str) -> Option<bool>;

    /// Extract a numeric value using a JSON pointer.
    fn get_number(&self, pointer: &str) -> Option<f64>;

    /// Shallow-merges the members of `patch` into this document.
    ///
    /// Non-object documents or patches leave the document untouched.
    fn merge_patch(&mut self, patch: &Value);
}

impl DocumentExt for Value {
    fn doc_id(&self) -> Option<String> {
        document_id(self)
    }

    fn has_id(&self, id: &str) -> bool {
        ["_id", "id"].iter().any(|field| match self.get(field) {
            Some(Value::String(s)) => s == id,
            Some(Value::Number(n)) => n.to_string() == id,
            _ => false,
        })
    }

    fn get_str(&self, pointer: &str) -> Option<&str> {
        self.pointer(pointer).and_then(|v| v.as_str())
    }

    fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.pointer(pointer).and_then(|v| v.as_bool())
    }

    fn get_number(&self, pointer: &str) -> Option<f64> {
        self.pointer(pointer).and_then(|v| v.as_f64())
    }

    fn merge_patch(&mut self, patch: &Value) {
        if let (Some(target), Some(source)) = (self.as_object_mut(), patch.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
