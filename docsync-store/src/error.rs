//! Error types for the cache store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The query fetcher failed to load a key.
    #[error("fetch failed for {key}: {message}")]
    Fetch { key: String, message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No fetcher is available for a key that must be loaded.
    #[error("no fetcher registered for {0}")]
    NoFetcher(String),
}

impl StoreError {
    pub fn fetch(key: &docsync_types::QueryKey, message: impl Into<String>) -> Self {
        StoreError::Fetch {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
