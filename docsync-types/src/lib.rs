//! Core type definitions for docsync.
//!
//! This crate defines the fundamental, entity-agnostic types used throughout
//! the cache engine:
//! - Entity type tags and temporary (optimistic) identifiers
//! - Query keys, the canonical addresses of cached query results
//! - Mutation kinds and the tagged mutation payload
//!
//! Nothing here knows what a "school" or a "visit" looks like. Domain shapes
//! are plain JSON documents interpreted by the selector and engine crates.

mod ids;
mod key;
mod mutation;

pub use ids::{document_id, is_temp_id, temp_id, EntityType, DEFAULT_TEMP_ID_PREFIX};
pub use key::{canonicalize, entity_type_from_url, KeyPattern, QueryKey, Scope};
pub use mutation::{EntityPatch, Mutation, OperationKind};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid entity type: {0:?}")]
    InvalidEntityType(String),

    #[error("{kind} mutation has no resolvable id")]
    MissingId { kind: OperationKind },
}
