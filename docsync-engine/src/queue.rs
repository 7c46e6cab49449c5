//! Per-entity-type mutation ordering.

use crate::config::ConcurrencyPolicy;
use docsync_types::EntityType;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Held for the lifetime of one mutation. Dropping it lets the next queued
/// mutation of the same entity type proceed.
#[derive(Debug)]
pub struct QueuePermit {
    _guard: Option<OwnedMutexGuard<()>>,
}

/// Hands out permits according to the [`ConcurrencyPolicy`].
#[derive(Debug, Default)]
pub struct MutationQueue {
    policy: ConcurrencyPolicy,
    lanes: Mutex<HashMap<EntityType, Arc<AsyncMutex<()>>>>,
}

impl MutationQueue {
    pub fn new(policy: ConcurrencyPolicy) -> Self {
        Self {
            policy,
            lanes: Mutex::default(),
        }
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Waits for the entity type's turn under `Serialize`; returns at once
    /// under `LastWriterWins`. Waiters are served in FIFO order.
    pub async fn acquire(&self, entity_type: &EntityType) -> QueuePermit {
        match self.policy {
            ConcurrencyPolicy::LastWriterWins => QueuePermit { _guard: None },
            ConcurrencyPolicy::Serialize => {
                let lane = self.lane(entity_type);
                if lane.try_lock().is_err() {
                    debug!("Mutation of {} queued behind an in-flight one", entity_type);
                }
                QueuePermit {
                    _guard: Some(lane.lock_owned().await),
                }
            }
        }
    }

    fn lane(&self, entity_type: &EntityType) -> Arc<AsyncMutex<()>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(lanes.entry(entity_type.clone()).or_default())
    }
}
