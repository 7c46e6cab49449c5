//! Read-through query client.
//!
//! [`QueryClient`] wraps a [`CacheStore`] with the read path the UI layer
//! uses: cached reads that fall through to a [`QueryFetcher`] when a key is
//! missing or stale, plus a table of observed queries so that invalidated keys
//! someone is still looking at can be refetched right away.

use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::store::CacheStore;
use crate::value::CachedValue;
use async_trait::async_trait;
use chrono::Utc;
use docsync_types::{KeyPattern, QueryKey};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, warn};

/// Read-path configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Age after which a cached entry is refetched on read. `None` means
    /// entries only go stale through invalidation.
    #[serde(default)]
    pub stale_time_ms: Option<u64>,
}

impl QueryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_time_ms(mut self, ms: u64) -> Self {
        self.stale_time_ms = Some(ms);
        self
    }
}

/// Loads the raw payload for a query key from the remote store.
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch(&self, key: &QueryKey) -> StoreResult<Value>;
}

/// Outcome of a refetch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefetchReport {
    pub refetched: Vec<QueryKey>,
    /// Keys whose refetch failed, with the error message. They stay stale.
    pub failed: Vec<(QueryKey, String)>,
    /// Keys written while their refetch was in flight; the fetched payload
    /// was dropped in favour of the newer write.
    pub superseded: Vec<QueryKey>,
}

impl RefetchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
struct ObserverTable {
    next_id: u64,
    observers: HashMap<u64, (QueryKey, Arc<dyn QueryFetcher>)>,
}

fn lock_table(table: &Mutex<ObserverTable>) -> MutexGuard<'_, ObserverTable> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Registration of an active query. Dropping it stops refetch-on-invalidate
/// for its key (once no other observer holds the same key).
pub struct QueryObserver {
    id: u64,
    key: QueryKey,
    table: Weak<Mutex<ObserverTable>>,
    store: Arc<dyn CacheStore>,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// The currently cached value of the observed key.
    pub fn current(&self) -> Option<CachedValue> {
        self.store.get(&self.key)
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            lock_table(&table).observers.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for QueryObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish()
    }
}

/// Shared handle to the query cache. Cheap to clone.
#[derive(Clone)]
pub struct QueryClient {
    store: Arc<dyn CacheStore>,
    config: QueryConfig,
    observers: Arc<Mutex<ObserverTable>>,
}

impl QueryClient {
    pub fn new(store: Arc<dyn CacheStore>, config: QueryConfig) -> Self {
        Self {
            store,
            config,
            observers: Arc::default(),
        }
    }

    /// A client over a fresh [`MemoryStore`] with default configuration.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), QueryConfig::default())
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn get_query_data(&self, key: &QueryKey) -> Option<CachedValue> {
        self.store.get(key)
    }

    pub fn set_query_data(&self, key: QueryKey, value: CachedValue) {
        self.store.set(key, value);
    }

    pub fn remove_query_data(&self, key: &QueryKey) -> Option<CachedValue> {
        self.store.remove(key)
    }

    /// True if the key is cached, not invalidated, and younger than the
    /// configured stale time.
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        let Some(entry) = self.store.entry(key) else {
            return false;
        };
        if entry.stale {
            return false;
        }
        match self.config.stale_time_ms {
            None => true,
            Some(ms) => {
                let age = Utc::now().signed_duration_since(entry.updated_at);
                age.num_milliseconds() <= i64::try_from(ms).unwrap_or(i64::MAX)
            }
        }
    }

    /// Returns the cached value when fresh; otherwise fetches, stores and
    /// returns the new value.
    ///
    /// If the key is written while the fetch is in flight, the fetched payload
    /// is discarded and the current cached value is returned instead.
    pub async fn fetch_query(
        &self,
        key: &QueryKey,
        fetcher: &dyn QueryFetcher,
    ) -> StoreResult<CachedValue> {
        if self.is_fresh(key) {
            if let Some(value) = self.store.get(key) {
                return Ok(value);
            }
        }
        debug!("Fetching {}", key);
        let revision = self.store.revision(key);
        let raw = fetcher.fetch(key).await?;
        let value = CachedValue::from_raw(raw);
        if self.store.set_if_revision(key.clone(), value.clone(), revision) {
            return Ok(value);
        }
        debug!("Discarding fetch of {}: written while in flight", key);
        Ok(self.store.get(key).unwrap_or(value))
    }

    /// Registers `key` as actively observed, to be refetched whenever it is
    /// invalidated.
    pub fn observe(&self, key: QueryKey, fetcher: Arc<dyn QueryFetcher>) -> QueryObserver {
        let id = {
            let mut table = lock_table(&self.observers);
            let id = table.next_id;
            table.next_id += 1;
            table.observers.insert(id, (key.clone(), fetcher));
            id
        };
        QueryObserver {
            id,
            key,
            table: Arc::downgrade(&self.observers),
            store: Arc::clone(&self.store),
        }
    }

    pub fn is_observed(&self, key: &QueryKey) -> bool {
        lock_table(&self.observers)
            .observers
            .values()
            .any(|(observed, _)| observed == key)
    }

    /// Distinct observed keys, sorted.
    pub fn observed_keys(&self) -> Vec<QueryKey> {
        self.observed_fetchers().into_keys().collect()
    }

    /// Marks matching keys stale; see [`CacheStore::invalidate`].
    pub fn invalidate_queries(&self, pattern: &KeyPattern) -> Vec<QueryKey> {
        self.store.invalidate(pattern)
    }

    /// Refetches every observed key matching any of `patterns`.
    ///
    /// Fetches run concurrently. A failed fetch is logged and reported; its
    /// key keeps its stale value.
    pub async fn refetch_queries(&self, patterns: &[KeyPattern]) -> RefetchReport {
        let targets: Vec<(QueryKey, Arc<dyn QueryFetcher>)> = self
            .observed_fetchers()
            .into_iter()
            .filter(|(key, _)| patterns.iter().any(|pattern| pattern.matches(key)))
            .collect();

        let results = join_all(targets.into_iter().map(|(key, fetcher)| async move {
            let revision = self.store.revision(&key);
            let result = fetcher.fetch(&key).await;
            (key, revision, result)
        }))
        .await;

        let mut report = RefetchReport::default();
        for (key, revision, result) in results {
            match result {
                Ok(raw) => {
                    if self
                        .store
                        .set_if_revision(key.clone(), CachedValue::from_raw(raw), revision)
                    {
                        report.refetched.push(key);
                    } else {
                        debug!("Discarding refetch of {}: written while in flight", key);
                        report.superseded.push(key);
                    }
                }
                Err(e) => {
                    warn!("Refetch of {} failed, leaving it stale: {}", key, e);
                    report.failed.push((key, e.to_string()));
                }
            }
        }
        debug!(
            "Refetched {} observed key(s), {} failed, {} superseded",
            report.refetched.len(),
            report.failed.len(),
            report.superseded.len()
        );
        report
    }

    // One fetcher per distinct key; the earliest registration wins.
    fn observed_fetchers(&self) -> BTreeMap<QueryKey, Arc<dyn QueryFetcher>> {
        let table = lock_table(&self.observers);
        let mut ids: Vec<&u64> = table.observers.keys().collect();
        ids.sort();
        let mut out = BTreeMap::new();
        for id in ids {
            if let Some((key, fetcher)) = table.observers.get(id) {
                out.entry(key.clone()).or_insert_with(|| Arc::clone(fetcher));
            }
        }
        out
    }
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("config", &self.config)
            .field("entries", &self.store.len())
            .finish()
    }
}
