//! Optimistic cache edits and their rollback.
//!
//! Before a mutation touches the cache, [`OptimisticCache::prepare_context`]
//! snapshots every key the edit may change: all cached list variants of the
//! entity type plus the detail key of each addressed id. The speculative edit
//! is then applied in place. If the remote call fails,
//! [`OptimisticCache::handle_mutation_error`] writes the snapshot back
//! verbatim; keys that were absent at snapshot time are removed again.
//!
//! Snapshotting a key also supersedes it in the store, so a fetch already in
//! flight for that key cannot land on top of the speculative edit.
//!
//! Lists that are not cached are never created here: there is nothing on
//! screen to update, and the next read fetches the authoritative state.

use crate::config::OptimisticConfig;
use chrono::{SecondsFormat, Utc};
use docsync_model::{Document, DocumentExt};
use docsync_store::{CacheEntry, CacheStore, CachedValue};
use docsync_types::{temp_id, EntityPatch, EntityType, KeyPattern, Mutation, QueryKey};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Snapshot of the cache keys one mutation may touch.
///
/// Consumed exactly once: either [`commit`](OptimisticContext::commit)ted
/// after the remote call succeeds or handed to
/// [`OptimisticCache::handle_mutation_error`].
#[must_use = "an optimistic context must be committed or rolled back"]
#[derive(Debug, PartialEq)]
pub struct OptimisticContext {
    entity_type: EntityType,
    snapshot: BTreeMap<QueryKey, Option<CacheEntry>>,
}

impl OptimisticContext {
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Snapshotted keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.snapshot.keys()
    }

    /// The captured value of `key`: `Some(None)` if it was captured as absent,
    /// `None` if it was not captured at all.
    pub fn captured(&self, key: &QueryKey) -> Option<Option<&CachedValue>> {
        self.snapshot
            .get(key)
            .map(|entry| entry.as_ref().map(|entry| &entry.value))
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Discards the snapshot; the optimistic state stays until invalidation
    /// replaces it.
    pub fn commit(self) {
        debug!(
            "Committed optimistic context for {} ({} key(s))",
            self.entity_type,
            self.snapshot.len()
        );
    }
}

/// Applies speculative edits to a cache store.
#[derive(Clone)]
pub struct OptimisticCache {
    store: Arc<dyn CacheStore>,
    config: OptimisticConfig,
}

impl OptimisticCache {
    pub fn new(store: Arc<dyn CacheStore>, config: OptimisticConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &OptimisticConfig {
        &self.config
    }

    // ── Snapshot & rollback ──────────────────────────────────────

    /// Captures every cached list of `entity_type` and the detail key of
    /// each id, and supersedes fetches in flight for them. Cached entries
    /// are left untouched.
    pub fn prepare_context(&self, entity_type: &EntityType, ids: &[&str]) -> OptimisticContext {
        let mut snapshot = BTreeMap::new();
        for key in self.store.keys_matching(&KeyPattern::lists(entity_type)) {
            let entry = self.store.entry(&key);
            snapshot.insert(key, entry);
        }
        for id in ids {
            let key = QueryKey::detail(entity_type, id);
            let entry = self.store.entry(&key);
            snapshot.insert(key, entry);
        }
        for key in snapshot.keys() {
            self.store.supersede(key);
        }
        OptimisticContext {
            entity_type: entity_type.clone(),
            snapshot,
        }
    }

    /// Restores every captured key. This is the only rollback path.
    pub fn handle_mutation_error(&self, context: OptimisticContext) {
        let restored = context.snapshot.len();
        for (key, entry) in context.snapshot {
            match entry {
                Some(mut entry) => {
                    // An invalidation that landed meanwhile still applies.
                    entry.stale |= self.store.is_stale(&key);
                    self.store.set_entry(key, entry);
                }
                None => {
                    self.store.remove(&key);
                }
            }
        }
        debug!(
            "Rolled back {} key(s) for {}",
            restored, context.entity_type
        );
    }

    // ── Single-entity edits ──────────────────────────────────────

    /// Prepends a provisional entity to every cached list and returns it.
    ///
    /// The entity gets a temporary id in both `_id` and `id` unless the
    /// payload already carries one.
    pub fn optimistic_create(&self, entity_type: &EntityType, payload: &Value) -> Document {
        let provisional = self.provisional(payload);
        for key in self.store.keys_matching(&KeyPattern::lists(entity_type)) {
            self.edit(&key, |value| {
                if let Some(items) = value.collection_mut() {
                    items.insert(0, provisional.clone());
                }
                if let CachedValue::Page(page) = value {
                    let total = page.pagination.total.saturating_add(1);
                    page.pagination.set_total(total);
                }
            });
        }
        debug!(
            "Optimistically created {} {}",
            entity_type,
            provisional.doc_id().unwrap_or_default()
        );
        provisional
    }

    /// Shallow-merges `patch` into the detail entry and matching list items.
    pub fn optimistic_update(&self, entity_type: &EntityType, id: &str, patch: &Value) {
        let patch = self.stamped_patch(patch);
        let detail = QueryKey::detail(entity_type, id);
        self.edit(&detail, |value| match value {
            CachedValue::Entity(doc) => doc.merge_patch(&patch),
            other => merge_matching(other, id, &patch),
        });
        for key in self.store.keys_matching(&KeyPattern::lists(entity_type)) {
            self.edit(&key, |value| merge_matching(value, id, &patch));
        }
        debug!("Optimistically updated {} {}", entity_type, id);
    }

    /// Removes the entity from every cached list and drops its detail entry.
    pub fn optimistic_delete(&self, entity_type: &EntityType, id: &str) {
        for key in self.store.keys_matching(&KeyPattern::lists(entity_type)) {
            self.edit(&key, |value| {
                let removed = match value.collection_mut() {
                    Some(items) => {
                        let before = items.len();
                        items.retain(|doc| !doc.has_id(id));
                        before - items.len()
                    }
                    None => 0,
                };
                if let CachedValue::Page(page) = value {
                    if removed > 0 {
                        let total = page.pagination.total.saturating_sub(removed as u64);
                        page.pagination.set_total(total);
                    }
                }
            });
        }
        self.store.remove(&QueryKey::detail(entity_type, id));
        debug!("Optimistically deleted {} {}", entity_type, id);
    }

    // ── Bulk edits ───────────────────────────────────────────────

    /// Creates every payload; the provisional entities end up at the top of
    /// each list in payload order.
    pub fn optimistic_bulk_create(&self, entity_type: &EntityType, payloads: &[Value]) -> Vec<Document> {
        let mut created: Vec<Document> = payloads
            .iter()
            .rev()
            .map(|payload| self.optimistic_create(entity_type, payload))
            .collect();
        created.reverse();
        created
    }

    pub fn optimistic_bulk_update(&self, entity_type: &EntityType, patches: &[EntityPatch]) {
        for p in patches {
            self.optimistic_update(entity_type, &p.id, &p.patch);
        }
    }

    pub fn optimistic_bulk_delete(&self, entity_type: &EntityType, ids: &[String]) {
        for id in ids {
            self.optimistic_delete(entity_type, id);
        }
    }

    /// Applies the speculative edit matching `mutation`.
    pub fn apply_mutation(&self, entity_type: &EntityType, mutation: &Mutation) {
        match mutation {
            Mutation::Create(payload) => {
                self.optimistic_create(entity_type, payload);
            }
            Mutation::Update { id, patch } => self.optimistic_update(entity_type, id, patch),
            Mutation::Delete { id } => self.optimistic_delete(entity_type, id),
            Mutation::BulkCreate(payloads) => {
                self.optimistic_bulk_create(entity_type, payloads);
            }
            Mutation::BulkUpdate(patches) => self.optimistic_bulk_update(entity_type, patches),
            Mutation::BulkDelete(ids) => self.optimistic_bulk_delete(entity_type, ids),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn edit(&self, key: &QueryKey, f: impl FnOnce(&mut CachedValue)) {
        if let Some(mut entry) = self.store.entry(key) {
            f(&mut entry.value);
            self.store.set_entry(key.clone(), entry);
        }
    }

    fn provisional(&self, payload: &Value) -> Document {
        let mut doc = match payload {
            Value::Object(_) => payload.clone(),
            _ => Value::Object(Default::default()),
        };
        if let Some(obj) = doc.as_object_mut() {
            if docsync_types::document_id(payload).is_none() {
                let id = temp_id(&self.config.temp_id_prefix);
                obj.insert("_id".into(), Value::String(id.clone()));
                obj.insert("id".into(), Value::String(id));
            }
            if self.config.stamp_timestamps {
                let now = Value::String(now_rfc3339());
                obj.entry("createdAt").or_insert_with(|| now.clone());
                obj.entry("updatedAt").or_insert(now);
            }
        }
        doc
    }

    fn stamped_patch(&self, patch: &Value) -> Value {
        let mut patch = patch.clone();
        if self.config.stamp_timestamps {
            if let Some(obj) = patch.as_object_mut() {
                obj.insert("updatedAt".into(), Value::String(now_rfc3339()));
            }
        }
        patch
    }
}

impl fmt::Debug for OptimisticCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticCache")
            .field("config", &self.config)
            .finish()
    }
}

fn merge_matching(value: &mut CachedValue, id: &str, patch: &Value) {
    if let Some(items) = value.collection_mut() {
        for doc in items.iter_mut().filter(|doc| doc.has_id(id)) {
            doc.merge_patch(patch);
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
