//! Identifier types used throughout the docsync core.
//!
//! Entity ids belong to the remote document store and are plain strings.
//! The only ids minted locally are temporary ids for optimistic creates,
//! which use UUID v7 so they sort by creation time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix marking an id as provisional.
pub const DEFAULT_TEMP_ID_PREFIX: &str = "temp_";

/// Tag partitioning the cache namespace for one domain concept
/// (e.g. `"schools"`, `"visits"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    /// Creates an entity type tag. Emptiness is checked at registration time.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A tag is valid when it is non-empty and has no surrounding whitespace.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.trim() == self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = Self::new(s);
        if tag.is_valid() {
            Ok(tag)
        } else {
            Err(crate::Error::InvalidEntityType(s.to_string()))
        }
    }
}

impl From<&str> for EntityType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl AsRef<str> for EntityType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mints a provisional id for an optimistically created entity.
#[must_use]
pub fn temp_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::now_v7().simple())
}

/// Returns true if `id` was minted by [`temp_id`] with the given prefix.
#[must_use]
pub fn is_temp_id(id: &str, prefix: &str) -> bool {
    !prefix.is_empty() && id.starts_with(prefix)
}

/// Extracts a document's id, checking `_id` before `id`.
///
/// String and integer ids are accepted; empty strings count as missing.
#[must_use]
pub fn document_id(doc: &Value) -> Option<String> {
    ["_id", "id"].iter().find_map(|field| match doc.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
