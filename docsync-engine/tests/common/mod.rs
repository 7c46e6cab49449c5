//! Shared test helpers for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docsync_engine::{RemoteMutator, RemoteResult};
use docsync_store::{CacheStore, CachedValue, Paginated, Pagination, QueryFetcher, StoreResult};
use docsync_types::{EntityType, Mutation, QueryKey};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn widgets() -> EntityType {
    EntityType::new("widgets")
}

pub fn gadgets() -> EntityType {
    EntityType::new("gadgets")
}

/// A paginated list of widgets `w1..=wn` with `total` items server-side.
pub fn widget_page(n: usize, total: u64, limit: u64) -> CachedValue {
    let items = (1..=n)
        .map(|i| json!({"_id": format!("w{i}"), "name": format!("Widget {i}")}))
        .collect();
    let mut pagination = Pagination::for_items(n);
    pagination.limit = limit;
    pagination.set_total(total);
    CachedValue::Page(Paginated { items, pagination })
}

/// Every cached key with its value, sorted by key.
pub fn dump(store: &dyn CacheStore) -> Vec<(QueryKey, CachedValue)> {
    store
        .keys_matching(&docsync_types::KeyPattern::entity(&widgets()))
        .into_iter()
        .chain(store.keys_matching(&docsync_types::KeyPattern::entity(&gadgets())))
        .filter_map(|key| store.get(&key).map(|value| (key, value)))
        .collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Remote ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("backend unavailable: {0}")]
pub struct BackendError(pub String);

/// What the next remote call does.
pub enum Step {
    Succeed,
    Reject(&'static str),
    Fail(&'static str),
    /// Never completes.
    Hang,
    /// Waits for the notify, then succeeds.
    Gate(Arc<Notify>),
    /// Waits for the notify, then fails.
    GateFail(Arc<Notify>, &'static str),
}

/// Remote whose calls follow a script; unscripted calls succeed.
#[derive(Default)]
pub struct ScriptedRemote {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<(EntityType, Mutation)>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<(EntityType, Mutation)> {
        self.calls.lock().unwrap().clone()
    }

    /// `start:<kind>` / `end:<kind>` entries in call order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteMutator for ScriptedRemote {
    type Error = BackendError;

    async fn perform(
        &self,
        entity_type: &EntityType,
        mutation: &Mutation,
    ) -> Result<RemoteResult, BackendError> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Succeed);
        self.calls
            .lock()
            .unwrap()
            .push((entity_type.clone(), mutation.clone()));
        let label = mutation.primary_id().unwrap_or(mutation.kind().as_str()).to_string();
        self.log.lock().unwrap().push(format!("start:{label}"));

        let result = match step {
            Step::Succeed => Ok(RemoteResult::ok(json!({"ok": true}))),
            Step::Reject(msg) => Ok(RemoteResult::rejected(msg)),
            Step::Fail(msg) => Err(BackendError(msg.to_string())),
            Step::Hang => std::future::pending().await,
            Step::Gate(notify) => {
                notify.notified().await;
                Ok(RemoteResult::ok(Value::Null))
            }
            Step::GateFail(notify, msg) => {
                notify.notified().await;
                Err(BackendError(msg.to_string()))
            }
        };
        self.log.lock().unwrap().push(format!("end:{label}"));
        result
    }
}

// ── Fetcher ──────────────────────────────────────────────────────

/// Serves a fixed payload per key and counts calls.
#[derive(Default)]
pub struct StaticFetcher {
    payloads: Mutex<Vec<(QueryKey, Value)>>,
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with(mut self, key: QueryKey, payload: Value) -> Self {
        self.payloads.get_mut().unwrap().push((key, payload));
        self
    }

    pub fn set(&self, key: QueryKey, payload: Value) {
        let mut payloads = self.payloads.lock().unwrap();
        payloads.retain(|(k, _)| k != &key);
        payloads.push((key, payload));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryFetcher for StaticFetcher {
    async fn fetch(&self, key: &QueryKey) -> StoreResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let payloads = self.payloads.lock().unwrap();
        Ok(payloads
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| json!([])))
    }
}

/// Blocks every fetch until the gate opens, then serves `payload`.
pub struct GatedFetcher {
    gate: Arc<Notify>,
    payload: Value,
    calls: AtomicUsize,
}

impl GatedFetcher {
    pub fn new(gate: Arc<Notify>, payload: Value) -> Self {
        Self {
            gate,
            payload,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryFetcher for GatedFetcher {
    async fn fetch(&self, _key: &QueryKey) -> StoreResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(self.payload.clone())
    }
}
