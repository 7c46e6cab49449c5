//! Mutation handle for UI callers.
//!
//! Wraps an executor bound to one entity type with the state a form or
//! button needs to render: whether a mutation is in flight and the message of
//! the last failure.

use crate::error::MutationError;
use crate::executor::{MutationExecutor, RemoteMutator, RemoteResult};
use docsync_types::{EntityType, Mutation};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Cloneable handle issuing mutations for one entity type.
pub struct MutationHandle<R: RemoteMutator> {
    entity_type: EntityType,
    executor: Arc<MutationExecutor<R>>,
    in_flight: Arc<AtomicUsize>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl<R: RemoteMutator> Clone for MutationHandle<R> {
    fn clone(&self) -> Self {
        Self {
            entity_type: self.entity_type.clone(),
            executor: Arc::clone(&self.executor),
            in_flight: Arc::clone(&self.in_flight),
            last_error: Arc::clone(&self.last_error),
        }
    }
}

impl<R: RemoteMutator> std::fmt::Debug for MutationHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationHandle")
            .field("entity_type", &self.entity_type)
            .field("in_flight", &self.in_flight)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

// Decrements the in-flight count even if the mutation future is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn start(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<R: RemoteMutator> MutationHandle<R> {
    pub fn new(entity_type: EntityType, executor: Arc<MutationExecutor<R>>) -> Self {
        Self {
            entity_type,
            executor,
            in_flight: Arc::new(AtomicUsize::new(0)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn executor(&self) -> &Arc<MutationExecutor<R>> {
        &self.executor
    }

    /// True while any mutation issued through this handle (or its clones) is
    /// in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Message of the most recent failure; cleared when a mutation succeeds.
    pub fn error(&self) -> Option<String> {
        self.lock_error().clone()
    }

    pub fn reset(&self) {
        *self.lock_error() = None;
    }

    /// Runs the mutation and returns its outcome.
    pub async fn mutate_async(
        &self,
        mutation: Mutation,
    ) -> Result<RemoteResult, MutationError<R::Error>> {
        let _in_flight = InFlight::start(&self.in_flight);
        let outcome = self.executor.execute(&self.entity_type, mutation).await;
        *self.lock_error() = outcome.as_ref().err().map(ToString::to_string);
        outcome
    }

    pub async fn create(&self, payload: Value) -> Result<RemoteResult, MutationError<R::Error>> {
        self.mutate_async(Mutation::Create(payload)).await
    }

    pub async fn update(
        &self,
        id: impl Into<String>,
        patch: Value,
    ) -> Result<RemoteResult, MutationError<R::Error>> {
        self.mutate_async(Mutation::update(id, patch)).await
    }

    pub async fn delete(
        &self,
        id: impl Into<String>,
    ) -> Result<RemoteResult, MutationError<R::Error>> {
        self.mutate_async(Mutation::delete(id)).await
    }

    fn lock_error(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<R: RemoteMutator + 'static> MutationHandle<R> {
    /// Fire-and-forget variant of [`mutate_async`](Self::mutate_async). The
    /// outcome is observable through [`error`](Self::error).
    ///
    /// Must be called from within a tokio runtime.
    pub fn mutate(&self, mutation: Mutation) -> JoinHandle<()> {
        let handle = self.clone();
        // Count the mutation before the task is scheduled so `is_loading`
        // is true as soon as this returns.
        let in_flight = InFlight::start(&self.in_flight);
        tokio::spawn(async move {
            let _in_flight = in_flight;
            let _ = handle.mutate_async(mutation).await;
        })
    }
}
