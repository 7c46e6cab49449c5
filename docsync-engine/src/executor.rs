//! Optimistic mutation executor.
//!
//! Drives one mutation through
//! `idle → optimistic-applied → pending → {syncing → synced | rolled-back}`:
//!
//! 1. Refuse update/delete mutations without ids before touching the cache
//! 2. Wait for the entity type's queue permit
//! 3. Snapshot the affected keys and apply the speculative edit
//! 4. Call the remote
//! 5. On success discard the snapshot and invalidate; on failure restore it
//!
//! The snapshot lives in a guard while the remote call is pending. If the
//! mutation future is dropped mid-flight the guard restores the snapshot and
//! marks the restored keys stale, so an abandoned mutation never leaves
//! provisional data behind.

use crate::coordinator::{InvalidationCoordinator, InvalidationReport};
use crate::error::MutationError;
use crate::optimistic::{OptimisticCache, OptimisticContext};
use crate::queue::MutationQueue;
use async_trait::async_trait;
use docsync_types::{EntityType, KeyPattern, Mutation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Response of the remote document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// The document transport: performs a mutation against the remote store.
#[async_trait]
pub trait RemoteMutator: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn perform(
        &self,
        entity_type: &EntityType,
        mutation: &Mutation,
    ) -> Result<RemoteResult, Self::Error>;
}

/// Where the most recent mutation stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPhase {
    #[default]
    Idle,
    OptimisticApplied,
    Pending,
    /// The remote accepted the mutation; affected keys are being invalidated
    /// and refetched.
    Syncing,
    Synced,
    RolledBack,
}

/// Restores the snapshot unless disarmed.
struct RollbackGuard<'a> {
    optimistic: &'a OptimisticCache,
    context: Option<OptimisticContext>,
}

impl<'a> RollbackGuard<'a> {
    fn arm(optimistic: &'a OptimisticCache, context: OptimisticContext) -> Self {
        Self {
            optimistic,
            context: Some(context),
        }
    }

    fn commit(mut self) {
        if let Some(context) = self.context.take() {
            context.commit();
        }
    }

    fn rollback(mut self) {
        if let Some(context) = self.context.take() {
            self.optimistic.handle_mutation_error(context);
        }
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        warn!(
            "Mutation of {} abandoned in flight; restoring {} key(s)",
            context.entity_type(),
            context.len()
        );
        let keys: Vec<_> = context.keys().cloned().collect();
        self.optimistic.handle_mutation_error(context);
        let store = self.optimistic.store();
        for key in &keys {
            store.invalidate(&KeyPattern::exact(key));
        }
    }
}

/// Runs mutations optimistically against the shared cache.
pub struct MutationExecutor<R: RemoteMutator> {
    remote: Arc<R>,
    optimistic: OptimisticCache,
    coordinator: Arc<InvalidationCoordinator>,
    queue: Arc<MutationQueue>,
    phase: Mutex<MutationPhase>,
}

impl<R: RemoteMutator> MutationExecutor<R> {
    pub fn new(
        remote: Arc<R>,
        optimistic: OptimisticCache,
        coordinator: Arc<InvalidationCoordinator>,
        queue: Arc<MutationQueue>,
    ) -> Self {
        Self {
            remote,
            optimistic,
            coordinator,
            queue,
            phase: Mutex::new(MutationPhase::Idle),
        }
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn coordinator(&self) -> &Arc<InvalidationCoordinator> {
        &self.coordinator
    }

    /// Phase of the most recent mutation.
    pub fn phase(&self) -> MutationPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: MutationPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Executes `mutation` against `entity_type`.
    ///
    /// Returns the remote result on success. On failure the cache has already
    /// been restored when the error is returned.
    pub async fn execute(
        &self,
        entity_type: &EntityType,
        mutation: Mutation,
    ) -> Result<RemoteResult, MutationError<R::Error>> {
        self.execute_with_report(entity_type, mutation)
            .await
            .map(|(result, _)| result)
    }

    /// Like [`execute`](Self::execute), also returning the invalidation
    /// report of the sync step.
    pub async fn execute_with_report(
        &self,
        entity_type: &EntityType,
        mutation: Mutation,
    ) -> Result<(RemoteResult, InvalidationReport), MutationError<R::Error>> {
        let kind = mutation.kind();
        if mutation.check_ids().is_err() {
            warn!("Refusing {} of {}: no resolvable id", kind, entity_type);
            return Err(MutationError::MissingId { kind });
        }

        let _permit = self.queue.acquire(entity_type).await;

        let context = self
            .optimistic
            .prepare_context(entity_type, &mutation.affected_ids());
        let guard = RollbackGuard::arm(&self.optimistic, context);
        self.optimistic.apply_mutation(entity_type, &mutation);
        self.set_phase(MutationPhase::OptimisticApplied);
        debug!("Applied optimistic {} of {}", kind, entity_type);

        self.set_phase(MutationPhase::Pending);
        let outcome = self.remote.perform(entity_type, &mutation).await;

        match outcome {
            Ok(result) if result.success => {
                guard.commit();
                self.set_phase(MutationPhase::Syncing);
                let report = self
                    .coordinator
                    .sync(entity_type, kind, mutation.primary_id())
                    .await;
                self.set_phase(MutationPhase::Synced);
                info!("Mutation {} of {} confirmed", kind, entity_type);
                Ok((result, report))
            }
            Ok(result) => {
                guard.rollback();
                self.set_phase(MutationPhase::RolledBack);
                let message = result
                    .error
                    .unwrap_or_else(|| format!("{kind} was not accepted"));
                warn!("Mutation {} of {} rejected: {}", kind, entity_type, message);
                Err(MutationError::Rejected(message))
            }
            Err(e) => {
                guard.rollback();
                self.set_phase(MutationPhase::RolledBack);
                warn!("Mutation {} of {} failed: {}", kind, entity_type, e);
                Err(MutationError::Remote(e))
            }
        }
    }
}

impl<R: RemoteMutator> fmt::Debug for MutationExecutor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationExecutor")
            .field("phase", &self.phase())
            .field("policy", &self.queue.policy())
            .finish()
    }
}
