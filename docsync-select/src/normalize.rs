//! Raw payload normalization.

use docsync_store::{Pagination, RawShape};
use serde_json::Value;

/// The candidate documents of a raw payload, in recognition order: bare
/// array, `items` array, `data` array, single `data` document. Anything else
/// yields no documents.
pub fn items(raw: &Value) -> &[Value] {
    RawShape::classify(raw).items()
}

/// Pagination of a raw payload whose valid items number `count`.
///
/// Payloads that are not collection envelopes get the single-page defaults.
pub fn pagination(raw: &Value, count: usize) -> Pagination {
    match RawShape::classify(raw) {
        RawShape::Items(_) | RawShape::DataArray(_) => Pagination::from_raw(raw, count),
        _ => Pagination::for_items(count),
    }
}
