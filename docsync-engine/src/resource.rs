//! Per-entity read and mutation surface.

use crate::error::EngineResult;
use crate::executor::RemoteMutator;
use crate::hooks::MutationHandle;
use docsync_model::Document;
use docsync_select::EntitySelector;
use docsync_store::{Paginated, QueryClient, QueryFetcher, QueryObserver};
use docsync_types::{EntityType, QueryKey};
use serde_json::Value;
use std::sync::Arc;

/// Everything a screen needs for one entity type: selector-projected reads
/// through the shared cache and an optimistic mutation handle.
pub struct EntityResource<R: RemoteMutator> {
    selector: Arc<EntitySelector>,
    client: QueryClient,
    fetcher: Arc<dyn QueryFetcher>,
    mutations: MutationHandle<R>,
}

impl<R: RemoteMutator> Clone for EntityResource<R> {
    fn clone(&self) -> Self {
        Self {
            selector: Arc::clone(&self.selector),
            client: self.client.clone(),
            fetcher: Arc::clone(&self.fetcher),
            mutations: self.mutations.clone(),
        }
    }
}

impl<R: RemoteMutator> EntityResource<R> {
    pub fn new(
        selector: Arc<EntitySelector>,
        client: QueryClient,
        fetcher: Arc<dyn QueryFetcher>,
        mutations: MutationHandle<R>,
    ) -> Self {
        Self {
            selector,
            client,
            fetcher,
            mutations,
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        self.selector.entity_type()
    }

    pub fn selector(&self) -> &Arc<EntitySelector> {
        &self.selector
    }

    pub fn list_key(&self, params: &Value) -> QueryKey {
        QueryKey::list(self.entity_type(), params)
    }

    pub fn detail_key(&self, id: &str) -> QueryKey {
        QueryKey::detail(self.entity_type(), id)
    }

    /// Validated, paginated list under `params`, read through the cache.
    pub async fn list(&self, params: &Value) -> EngineResult<Paginated> {
        let key = self.list_key(params);
        let value = self.client.fetch_query(&key, self.fetcher.as_ref()).await?;
        Ok(self.selector.paginated(&value.to_raw()))
    }

    /// The entity `id`, read through the cache; `None` when the payload holds
    /// no valid document.
    pub async fn by_id(&self, id: &str) -> EngineResult<Option<Document>> {
        let key = self.detail_key(id);
        let value = self.client.fetch_query(&key, self.fetcher.as_ref()).await?;
        Ok(self.selector.detail_cached(&value))
    }

    /// Keeps the list under `params` refetched after invalidation for as long
    /// as the observer lives.
    pub fn observe_list(&self, params: &Value) -> QueryObserver {
        self.client
            .observe(self.list_key(params), Arc::clone(&self.fetcher))
    }

    pub fn observe_detail(&self, id: &str) -> QueryObserver {
        self.client
            .observe(self.detail_key(id), Arc::clone(&self.fetcher))
    }

    pub fn mutations(&self) -> &MutationHandle<R> {
        &self.mutations
    }
}
