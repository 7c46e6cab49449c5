//! Error types for selector registration.

use docsync_types::EntityType;
use thiserror::Error;

/// Result type for selector operations.
pub type SelectResult<T> = Result<T, SelectError>;

#[derive(Debug, Error)]
pub enum SelectError {
    /// A selector is already registered for the entity type and the registry
    /// refuses duplicates.
    #[error("selector already registered for entity type {0}")]
    Duplicate(EntityType),

    #[error("invalid entity type: {0:?}")]
    InvalidEntityType(String),
}
