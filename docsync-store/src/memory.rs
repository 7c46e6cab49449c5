//! In-memory [`CacheStore`] implementation.

use crate::store::{CacheEntry, CacheEvent, CacheStore, Listener, Subscription};
use crate::value::CachedValue;
use docsync_types::{KeyPattern, QueryKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Default)]
struct Slots {
    entries: HashMap<QueryKey, CacheEntry>,
    // Kept across removal so a set-then-remove still changes the revision.
    revisions: HashMap<QueryKey, u64>,
}

impl Slots {
    fn revision(&self, key: &QueryKey) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &QueryKey) {
        *self.revisions.entry(key.clone()).or_default() += 1;
    }
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    listeners: HashMap<u64, (KeyPattern, Listener)>,
}

/// Process-local cache backed by a `HashMap`.
///
/// Poisoned locks are recovered rather than propagated: a panicking listener
/// must not take the whole cache down with it.
#[derive(Default)]
pub struct MemoryStore {
    slots: RwLock<Slots>,
    listeners: Arc<Mutex<ListenerTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(|e| e.into_inner())
    }

    fn listener_table(table: &Mutex<ListenerTable>) -> MutexGuard<'_, ListenerTable> {
        table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, events: &[CacheEvent]) {
        if events.is_empty() {
            return;
        }
        // Snapshot the listeners so callbacks may subscribe or unsubscribe.
        let targets: Vec<(KeyPattern, Listener)> = Self::listener_table(&self.listeners)
            .listeners
            .values()
            .cloned()
            .collect();
        for event in events {
            for (pattern, listener) in &targets {
                if pattern.matches(event.key()) {
                    listener(event);
                }
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        Self::listener_table(&self.listeners).listeners.len()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.read().entries.get(key).map(|entry| entry.value.clone())
    }

    fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.read().entries.get(key).cloned()
    }

    fn set(&self, key: QueryKey, value: CachedValue) {
        self.set_entry(key, CacheEntry::fresh(value));
    }

    fn set_entry(&self, key: QueryKey, entry: CacheEntry) {
        {
            let mut slots = self.write();
            slots.bump(&key);
            slots.entries.insert(key.clone(), entry);
        }
        self.notify(&[CacheEvent::Updated { key }]);
    }

    fn set_if_revision(&self, key: QueryKey, value: CachedValue, revision: u64) -> bool {
        {
            let mut slots = self.write();
            if slots.revision(&key) != revision {
                return false;
            }
            slots.bump(&key);
            slots.entries.insert(key.clone(), CacheEntry::fresh(value));
        }
        self.notify(&[CacheEvent::Updated { key }]);
        true
    }

    fn revision(&self, key: &QueryKey) -> u64 {
        self.read().revision(key)
    }

    fn supersede(&self, key: &QueryKey) {
        self.write().bump(key);
    }

    fn remove(&self, key: &QueryKey) -> Option<CachedValue> {
        let previous = {
            let mut slots = self.write();
            slots.bump(key);
            slots.entries.remove(key).map(|entry| entry.value)
        };
        if previous.is_some() {
            self.notify(&[CacheEvent::Removed { key: key.clone() }]);
        }
        previous
    }

    fn invalidate(&self, pattern: &KeyPattern) -> Vec<QueryKey> {
        let mut keys = {
            let mut slots = self.write();
            let mut keys = Vec::new();
            for (key, entry) in slots.entries.iter_mut() {
                if pattern.matches(key) {
                    entry.stale = true;
                    keys.push(key.clone());
                }
            }
            for key in &keys {
                slots.bump(key);
            }
            keys
        };
        keys.sort();
        debug!("Invalidated {} key(s) matching {}", keys.len(), pattern);

        let events: Vec<CacheEvent> = keys
            .iter()
            .map(|key| CacheEvent::Invalidated { key: key.clone() })
            .collect();
        self.notify(&events);
        keys
    }

    fn keys_matching(&self, pattern: &KeyPattern) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .read()
            .entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn subscribe(&self, pattern: KeyPattern, listener: Listener) -> Subscription {
        let id = {
            let mut table = Self::listener_table(&self.listeners);
            let id = table.next_id;
            table.next_id += 1;
            table.listeners.insert(id, (pattern, listener));
            id
        };
        let table = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(table) = table.upgrade() {
                Self::listener_table(&table).listeners.remove(&id);
            }
        })
    }

    fn len(&self) -> usize {
        self.read().entries.len()
    }

    fn clear(&self) {
        let removed: Vec<QueryKey> = {
            let mut slots = self.write();
            let removed: Vec<QueryKey> = slots.entries.drain().map(|(key, _)| key).collect();
            for key in &removed {
                slots.bump(key);
            }
            removed
        };
        let events: Vec<CacheEvent> = removed
            .into_iter()
            .map(|key| CacheEvent::Removed { key })
            .collect();
        self.notify(&events);
    }
}
