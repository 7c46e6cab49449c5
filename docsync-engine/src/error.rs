//! Error types for the engine layer.

use docsync_types::OperationKind;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the read path and engine wiring.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cache store or fetch failure.
    #[error("store error: {0}")]
    Store(#[from] docsync_store::StoreError),

    /// Invalid key or mutation data.
    #[error("type error: {0}")]
    Types(#[from] docsync_types::Error),

    #[error("invalid entity type: {0:?}")]
    InvalidEntityType(String),
}

/// Failure of one optimistic mutation.
///
/// By the time any of these is returned the cache has been restored to its
/// pre-mutation state (or was never touched).
#[derive(Debug, Error)]
pub enum MutationError<E> {
    /// The remote call failed; the error is passed through untouched.
    #[error("remote mutation failed: {0}")]
    Remote(E),

    /// The remote call completed but reported `success: false`.
    #[error("remote rejected mutation: {0}")]
    Rejected(String),

    /// An update or delete carried no usable id. Nothing was written.
    #[error("{kind} mutation has no resolvable id")]
    MissingId { kind: OperationKind },
}

impl<E> MutationError<E> {
    /// The remote error, if this is one.
    pub fn remote(&self) -> Option<&E> {
        match self {
            MutationError::Remote(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_remote(self) -> Option<E> {
        match self {
            MutationError::Remote(e) => Some(e),
            _ => None,
        }
    }
}
