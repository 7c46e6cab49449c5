//! The cache store contract.

use crate::value::CachedValue;
use chrono::{DateTime, Utc};
use docsync_types::{KeyPattern, QueryKey};
use std::fmt;
use std::sync::Arc;

/// One cached query result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub updated_at: DateTime<Utc>,
    /// Set by invalidation; cleared by the next `set`.
    pub stale: bool,
}

impl CacheEntry {
    pub fn fresh(value: CachedValue) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
            stale: false,
        }
    }
}

/// A change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated { key: QueryKey },
    Invalidated { key: QueryKey },
    Removed { key: QueryKey },
}

impl CacheEvent {
    pub fn key(&self) -> &QueryKey {
        match self {
            CacheEvent::Updated { key }
            | CacheEvent::Invalidated { key }
            | CacheEvent::Removed { key } => key,
        }
    }
}

/// Subscriber callback. Invoked after the store has released its locks.
pub type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Handle returned by [`CacheStore::subscribe`].
///
/// The listener stays registered until the handle is dropped or
/// [`unsubscribe`](Subscription::unsubscribe) is called.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Keyed cache of query results, shared between read consumers and the
/// mutation engine.
///
/// All methods are synchronous and must not block for long: they run inside
/// async tasks and from `Drop` during rollback.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &QueryKey) -> Option<CachedValue>;

    /// Value plus freshness metadata.
    fn entry(&self, key: &QueryKey) -> Option<CacheEntry>;

    /// Stores a fresh value and notifies subscribers.
    fn set(&self, key: QueryKey, value: CachedValue);

    /// Writes `entry` verbatim, keeping its `stale` flag and `updated_at`.
    fn set_entry(&self, key: QueryKey, entry: CacheEntry);

    /// Stores a fresh value only if the key's revision is still `revision`.
    /// Returns whether the write happened.
    fn set_if_revision(&self, key: QueryKey, value: CachedValue, revision: u64) -> bool;

    /// Write counter of `key`. Every set, removal and invalidation touching
    /// the key bumps it; it survives removal. `0` if the key was never
    /// written.
    fn revision(&self, key: &QueryKey) -> u64;

    /// Bumps the revision of `key` without changing its entry, so results
    /// of fetches already in flight for it are discarded.
    fn supersede(&self, key: &QueryKey);

    /// Removes a key; returns the previous value.
    fn remove(&self, key: &QueryKey) -> Option<CachedValue>;

    /// Marks every matching key stale and returns the keys, sorted.
    fn invalidate(&self, pattern: &KeyPattern) -> Vec<QueryKey>;

    /// Currently cached keys matching `pattern`, sorted.
    fn keys_matching(&self, pattern: &KeyPattern) -> Vec<QueryKey>;

    /// Registers `listener` for events on keys matching `pattern`.
    fn subscribe(&self, pattern: KeyPattern, listener: Listener) -> Subscription;

    fn len(&self) -> usize;

    fn clear(&self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the key is cached and marked stale.
    fn is_stale(&self, key: &QueryKey) -> bool {
        self.entry(key).is_some_and(|entry| entry.stale)
    }

    /// Subscribes to a single key.
    fn subscribe_key(&self, key: &QueryKey, listener: Listener) -> Subscription {
        self.subscribe(KeyPattern::exact(key), listener)
    }
}
