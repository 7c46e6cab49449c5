//! Cache engine: wires the shared cache, the relation graph and the mutation
//! queue together and hands out per-entity executors and resources.

use crate::config::EngineConfig;
use crate::coordinator::InvalidationCoordinator;
use crate::error::{EngineError, EngineResult};
use crate::executor::{MutationExecutor, RemoteMutator};
use crate::hooks::MutationHandle;
use crate::optimistic::OptimisticCache;
use crate::queue::MutationQueue;
use crate::relations::RelationGraph;
use crate::resource::EntityResource;
use docsync_select::{EntitySelector, SelectorRegistry};
use docsync_store::{QueryClient, QueryFetcher};
use docsync_types::EntityType;
use std::sync::Arc;
use tracing::debug;

/// Shared state of one docsync cache.
///
/// Executors and resources created from the same engine share its cache,
/// its invalidation coordinator and its per-entity mutation queue.
#[derive(Debug, Clone)]
pub struct CacheEngine {
    config: EngineConfig,
    client: QueryClient,
    coordinator: Arc<InvalidationCoordinator>,
    queue: Arc<MutationQueue>,
}

impl CacheEngine {
    pub fn new(client: QueryClient, relations: RelationGraph, config: EngineConfig) -> Self {
        let coordinator = InvalidationCoordinator::new(client.clone(), relations)
            .with_refetch(config.refetch_on_sync);
        let queue = MutationQueue::new(config.concurrency);
        Self {
            config,
            client,
            coordinator: Arc::new(coordinator),
            queue: Arc::new(queue),
        }
    }

    /// An engine over a fresh in-memory cache with no relations.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(QueryClient::in_memory(), RelationGraph::new(), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn coordinator(&self) -> &Arc<InvalidationCoordinator> {
        &self.coordinator
    }

    pub fn optimistic(&self) -> OptimisticCache {
        OptimisticCache::new(Arc::clone(self.client.store()), self.config.optimistic.clone())
    }

    // ── Mutation side ────────────────────────────────────────────

    pub fn executor<R: RemoteMutator>(&self, remote: Arc<R>) -> MutationExecutor<R> {
        MutationExecutor::new(
            remote,
            self.optimistic(),
            Arc::clone(&self.coordinator),
            Arc::clone(&self.queue),
        )
    }

    pub fn mutations<R: RemoteMutator>(
        &self,
        entity_type: &EntityType,
        remote: Arc<R>,
    ) -> EngineResult<MutationHandle<R>> {
        if !entity_type.is_valid() {
            return Err(EngineError::InvalidEntityType(entity_type.to_string()));
        }
        Ok(MutationHandle::new(
            entity_type.clone(),
            Arc::new(self.executor(remote)),
        ))
    }

    // ── Read side ────────────────────────────────────────────────

    pub fn resource<R: RemoteMutator>(
        &self,
        selector: Arc<EntitySelector>,
        fetcher: Arc<dyn QueryFetcher>,
        remote: Arc<R>,
    ) -> EngineResult<EntityResource<R>> {
        let mutations = self.mutations(selector.entity_type(), remote)?;
        debug!("Created resource for {}", selector.entity_type());
        Ok(EntityResource::new(
            selector,
            self.client.clone(),
            fetcher,
            mutations,
        ))
    }

    /// Like [`resource`](Self::resource), looking the selector up in
    /// `registry` (a permissive one is created for unknown types).
    pub fn resource_for<R: RemoteMutator>(
        &self,
        registry: &SelectorRegistry,
        entity_type: &EntityType,
        fetcher: Arc<dyn QueryFetcher>,
        remote: Arc<R>,
    ) -> EngineResult<EntityResource<R>> {
        if !entity_type.is_valid() {
            return Err(EngineError::InvalidEntityType(entity_type.to_string()));
        }
        self.resource(registry.get_or_default(entity_type), fetcher, remote)
    }
}
