//! Cached value shapes.
//!
//! Remote payloads arrive as a bare array, a collection envelope
//! (`{items, ...pagination}`), a single-entity envelope (`{data}`), or a bare
//! document. [`RawShape`] recognizes them in a fixed order: array, then
//! `items`, then `data`. `items` is checked before `data` because only an
//! explicit collection can plausibly satisfy both.

use docsync_model::Document;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Recognized shape of a raw payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawShape<'a> {
    /// A bare array of documents.
    Array(&'a [Value]),
    /// A collection envelope with an `items` array.
    Items(&'a [Value]),
    /// A `data` envelope holding an array.
    DataArray(&'a [Value]),
    /// A `data` envelope holding a single document.
    DataSingle(&'a Value),
    /// Anything else.
    Unknown,
}

impl<'a> RawShape<'a> {
    pub fn classify(raw: &'a Value) -> Self {
        if let Value::Array(items) = raw {
            return RawShape::Array(items);
        }
        if let Some(Value::Array(items)) = raw.get("items") {
            return RawShape::Items(items);
        }
        match raw.get("data") {
            Some(Value::Array(items)) => RawShape::DataArray(items),
            Some(Value::Null) | None => RawShape::Unknown,
            Some(single) => RawShape::DataSingle(single),
        }
    }

    /// The documents carried by this shape; empty for `Unknown`.
    pub fn items(&self) -> &'a [Value] {
        match *self {
            RawShape::Array(items) | RawShape::Items(items) | RawShape::DataArray(items) => items,
            RawShape::DataSingle(single) => std::slice::from_ref(single),
            RawShape::Unknown => &[],
        }
    }
}

/// Page metadata of a paginated envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Defaults for a payload without explicit pagination: one page holding
    /// every item.
    pub fn for_items(count: usize) -> Self {
        let count = count as u64;
        Self {
            total: count,
            page: 1,
            limit: count,
            total_pages: 1,
        }
    }

    /// Reads pagination from a nested `pagination` object or from flat
    /// `total`/`page`/`limit`/`totalPages` fields, defaulting missing parts.
    pub fn from_raw(raw: &Value, item_count: usize) -> Self {
        let source = raw
            .get("pagination")
            .filter(|p| p.is_object())
            .unwrap_or(raw);
        let read = |field: &str| source.get(field).and_then(Value::as_u64);

        let defaults = Self::for_items(item_count);
        let total = read("total").unwrap_or(defaults.total);
        let page = read("page").unwrap_or(defaults.page).max(1);
        let limit = read("limit").unwrap_or(defaults.limit);
        let total_pages = read("totalPages").unwrap_or_else(|| pages_for(total, limit));
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }

    /// Sets a new total and recomputes the page count.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
        self.total_pages = pages_for(total, self.limit);
    }
}

fn pages_for(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        1
    } else {
        total.div_ceil(limit)
    }
}

/// A paginated envelope `{items, pagination}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated {
    pub items: Vec<Document>,
    pub pagination: Pagination,
}

impl Paginated {
    pub fn from_items(items: Vec<Document>) -> Self {
        let pagination = Pagination::for_items(items.len());
        Self { items, pagination }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renders the envelope with both nested and derived flags
    /// (`hasMore`, `empty`).
    pub fn to_raw(&self) -> Value {
        json!({
            "items": self.items,
            "pagination": self.pagination,
            "hasMore": self.pagination.has_more(),
            "empty": self.items.is_empty(),
        })
    }
}

/// The value bound to one cache key.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Entity(Document),
    List(Vec<Document>),
    Page(Paginated),
}

impl CachedValue {
    /// Classifies a raw payload.
    pub fn from_raw(raw: Value) -> Self {
        let raw = match raw {
            Value::Array(items) => return CachedValue::List(items),
            other => other,
        };
        match RawShape::classify(&raw) {
            RawShape::Items(items) => {
                let pagination = Pagination::from_raw(&raw, items.len());
                CachedValue::Page(Paginated {
                    items: items.to_vec(),
                    pagination,
                })
            }
            RawShape::DataArray(items) => CachedValue::List(items.to_vec()),
            RawShape::DataSingle(doc) => CachedValue::Entity(doc.clone()),
            RawShape::Array(_) | RawShape::Unknown => CachedValue::Entity(raw.clone()),
        }
    }

    /// The value as a raw payload.
    pub fn to_raw(&self) -> Value {
        match self {
            CachedValue::Entity(doc) => doc.clone(),
            CachedValue::List(items) => Value::Array(items.clone()),
            CachedValue::Page(page) => page.to_raw(),
        }
    }

    /// Documents held by the value; an entity counts as one.
    pub fn items(&self) -> &[Document] {
        match self {
            CachedValue::Entity(doc) => std::slice::from_ref(doc),
            CachedValue::List(items) => items,
            CachedValue::Page(page) => &page.items,
        }
    }

    /// Mutable access to the item collection of a list or page.
    pub fn collection_mut(&mut self) -> Option<&mut Vec<Document>> {
        match self {
            CachedValue::Entity(_) => None,
            CachedValue::List(items) => Some(items),
            CachedValue::Page(page) => Some(&mut page.items),
        }
    }

    pub fn is_collection(&self) -> bool {
        !matches!(self, CachedValue::Entity(_))
    }
}
