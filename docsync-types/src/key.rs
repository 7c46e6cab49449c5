//! Query keys: canonical addresses for cached query results.
//!
//! A key is the ordered tuple `[root, scope, ...params]`. For entity queries
//! `root` is the entity type; for option lookups it is the source URL.
//!
//! Params are stored as canonical JSON text (object members sorted, `null`
//! members dropped), so two logically identical queries always produce equal
//! keys no matter how their filter objects were assembled. Equality, hashing
//! and ordering all derive from that canonical form.

use crate::EntityType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of query a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    List,
    Detail,
    Options,
}

impl Scope {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Scope::List => "list",
            Scope::Detail => "detail",
            Scope::Options => "options",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical address of one cached query result. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    root: String,
    scope: Scope,
    params: Vec<String>,
}

impl QueryKey {
    /// Key for "list of `entity_type` under `params`".
    ///
    /// `null` and `{}` params both address the base list `[type, list]`.
    #[must_use]
    pub fn list(entity_type: &EntityType, params: &Value) -> Self {
        let canonical = canonicalize(params);
        let params = match &canonical {
            Value::Null => Vec::new(),
            Value::Object(map) if map.is_empty() => Vec::new(),
            other => vec![other.to_string()],
        };
        Self {
            root: entity_type.as_str().to_string(),
            scope: Scope::List,
            params,
        }
    }

    /// The base list key for an entity type (no params).
    #[must_use]
    pub fn list_all(entity_type: &EntityType) -> Self {
        Self::list(entity_type, &Value::Null)
    }

    /// Key for "single `entity_type` by `id`".
    #[must_use]
    pub fn detail(entity_type: &EntityType, id: &str) -> Self {
        Self {
            root: entity_type.as_str().to_string(),
            scope: Scope::Detail,
            params: vec![Value::String(id.to_string()).to_string()],
        }
    }

    /// Key for an options lookup against `url`, filtered by `search`.
    #[must_use]
    pub fn options(url: &str, search: &str) -> Self {
        let search = search.trim();
        let params = if search.is_empty() {
            Vec::new()
        } else {
            vec![Value::String(search.to_string()).to_string()]
        };
        Self {
            root: url.to_string(),
            scope: Scope::Options,
            params,
        }
    }

    /// The first element: the entity type, or the URL for options keys.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Canonical JSON text of each param element.
    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The entity type this key belongs to, unless it is an options key.
    #[must_use]
    pub fn entity_type(&self) -> Option<EntityType> {
        match self.scope {
            Scope::Options => None,
            _ => Some(EntityType::new(self.root.as_str())),
        }
    }

    /// The id addressed by a detail key.
    #[must_use]
    pub fn detail_id(&self) -> Option<String> {
        if self.scope != Scope::Detail {
            return None;
        }
        let first = self.params.first()?;
        match serde_json::from_str::<Value>(first).ok()? {
            Value::String(id) => Some(id),
            _ => None,
        }
    }

    /// The key as a JSON tuple, e.g. `["schools","list",{"page":1}]`.
    #[must_use]
    pub fn to_parts(&self) -> Vec<Value> {
        let mut parts = Vec::with_capacity(2 + self.params.len());
        parts.push(Value::String(self.root.clone()));
        parts.push(Value::String(self.scope.as_str().to_string()));
        for param in &self.params {
            parts.push(serde_json::from_str(param).unwrap_or_else(|_| Value::String(param.clone())));
        }
        parts
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Array(self.to_parts()))
    }
}

/// Prefix matcher over query keys, used for wildcard invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyPattern {
    root: String,
    scope: Option<Scope>,
    params: Vec<String>,
    exact: bool,
}

impl KeyPattern {
    /// Every key of an entity type, whatever the scope.
    #[must_use]
    pub fn entity(entity_type: &EntityType) -> Self {
        Self {
            root: entity_type.as_str().to_string(),
            scope: None,
            params: Vec::new(),
            exact: false,
        }
    }

    /// Every list variant of an entity type (all filter/sort/page params).
    #[must_use]
    pub fn lists(entity_type: &EntityType) -> Self {
        Self {
            scope: Some(Scope::List),
            ..Self::entity(entity_type)
        }
    }

    /// Every detail key of an entity type.
    #[must_use]
    pub fn details(entity_type: &EntityType) -> Self {
        Self {
            scope: Some(Scope::Detail),
            ..Self::entity(entity_type)
        }
    }

    /// Every options key for a URL, whatever the search term.
    #[must_use]
    pub fn options(url: &str) -> Self {
        Self {
            root: url.to_string(),
            scope: Some(Scope::Options),
            params: Vec::new(),
            exact: false,
        }
    }

    /// Matches exactly one key.
    #[must_use]
    pub fn exact(key: &QueryKey) -> Self {
        Self {
            root: key.root.clone(),
            scope: Some(key.scope),
            params: key.params.clone(),
            exact: true,
        }
    }

    /// Returns true if `key` falls under this pattern.
    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        if self.root != key.root {
            return false;
        }
        if let Some(scope) = self.scope {
            if scope != key.scope {
                return false;
            }
        }
        if self.exact {
            return self.params == key.params;
        }
        key.params.starts_with(&self.params)
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}", self.root)?;
        match self.scope {
            Some(scope) => write!(f, ",{:?}", scope.as_str())?,
            None => f.write_str(",*")?,
        }
        for param in &self.params {
            write!(f, ",{param}")?;
        }
        if !self.exact {
            f.write_str(",..")?;
        }
        f.write_str("]")
    }
}

/// Rewrites a JSON value into canonical form.
///
/// Object members are sorted by name at every depth and `null` members are
/// dropped; array order is significant and preserved.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            let mut out = Map::with_capacity(sorted.len());
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Derives an entity type from an options URL: the last non-empty path
/// segment, ignoring query string and fragment.
///
/// `"/api/schools?active=true"` maps to `"schools"`.
#[must_use]
pub fn entity_type_from_url(url: &str) -> Option<EntityType> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .map(EntityType::new)
}
