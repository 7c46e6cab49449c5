mod common;

use common::{
    dump, init_tracing, widget_page, widgets, BackendError, GatedFetcher, ScriptedRemote,
    StaticFetcher, Step,
};
use docsync_engine::{
    CacheEngine, ConcurrencyPolicy, EngineConfig, MutationError, MutationExecutor, MutationPhase,
    RemoteMutator, RemoteResult,
};
use docsync_model::DocumentExt;
use docsync_store::{CacheStore, CachedValue};
use docsync_types::{
    is_temp_id, EntityPatch, EntityType, KeyPattern, Mutation, QueryKey, DEFAULT_TEMP_ID_PREFIX,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn engine(policy: ConcurrencyPolicy) -> CacheEngine {
    init_tracing();
    let engine = CacheEngine::in_memory(EngineConfig::default().with_concurrency(policy));
    let store = engine.client().store();
    store.set(QueryKey::list_all(&widgets()), widget_page(3, 3, 10));
    store.set(
        QueryKey::detail(&widgets(), "w2"),
        CachedValue::Entity(json!({"_id": "w2", "name": "Widget 2"})),
    );
    engine
}

fn base_names(engine: &CacheEngine) -> Vec<String> {
    engine
        .client()
        .get_query_data(&QueryKey::list_all(&widgets()))
        .map(|value| {
            value
                .items()
                .iter()
                .map(|doc| doc["name"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

async fn wait_for_phase<R: RemoteMutator>(
    executor: &MutationExecutor<R>,
    phase: MutationPhase,
) {
    for _ in 0..200 {
        if executor.phase() == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("executor never reached {phase:?}");
}

// ── Success ──────────────────────────────────────────────────────

#[tokio::test]
async fn success_keeps_optimistic_state_and_invalidates() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let remote = ScriptedRemote::new([Step::Succeed]);
    let executor = engine.executor(remote.clone());

    let (result, report) = executor
        .execute_with_report(&widgets(), Mutation::update("w2", json!({"name": "Renamed"})))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(executor.phase(), MutationPhase::Synced);
    assert_eq!(base_names(&engine), vec!["Widget 1", "Renamed", "Widget 3"]);
    let store = engine.client().store();
    assert!(store.is_stale(&QueryKey::list_all(&widgets())));
    assert!(store.is_stale(&QueryKey::detail(&widgets(), "w2")));
    assert_eq!(report.invalidated.len(), 2);
    assert_eq!(remote.calls().len(), 1);
}

#[tokio::test]
async fn success_refetches_observed_list() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let list = QueryKey::list_all(&widgets());
    let fetcher = Arc::new(
        StaticFetcher::default().with(list.clone(), json!({"items": [{"_id": "srv", "name": "Server"}]})),
    );
    let _observer = engine.client().observe(list.clone(), fetcher.clone());
    let executor = engine.executor(ScriptedRemote::new([]));

    executor
        .execute(&widgets(), Mutation::Create(json!({"name": "Mine"})))
        .await
        .unwrap();

    // The server's view replaces the optimistic one.
    assert_eq!(base_names(&engine), vec!["Server"]);
    assert!(!engine.client().store().is_stale(&list));
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn syncing_phase_lasts_until_observed_refetch_lands() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let list = QueryKey::list_all(&widgets());
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(GatedFetcher::new(
        gate.clone(),
        json!({"items": [{"_id": "srv", "name": "Server"}]}),
    ));
    let _observer = engine.client().observe(list.clone(), fetcher.clone());
    let executor = Arc::new(engine.executor(ScriptedRemote::new([])));

    let task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            executor
                .execute(&widgets(), Mutation::update("w1", json!({"name": "Mine"})))
                .await
        })
    };
    wait_for_phase(&executor, MutationPhase::Syncing).await;
    assert!(engine.client().store().is_stale(&list));
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(base_names(&engine), vec!["Mine", "Widget 2", "Widget 3"]);

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert_eq!(executor.phase(), MutationPhase::Synced);
    assert_eq!(base_names(&engine), vec!["Server"]);
}

// ── Failure & rollback ───────────────────────────────────────────

#[tokio::test]
async fn remote_error_rolls_back_and_passes_error_through() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let before = dump(engine.client().store().as_ref());
    let executor = engine.executor(ScriptedRemote::new([Step::Fail("disk full")]));

    let err = executor
        .execute(&widgets(), Mutation::delete("w2"))
        .await
        .unwrap_err();

    assert_eq!(err.into_remote(), Some(BackendError("disk full".into())));
    assert_eq!(executor.phase(), MutationPhase::RolledBack);
    assert_eq!(dump(engine.client().store().as_ref()), before);
    assert!(!engine.client().store().is_stale(&QueryKey::list_all(&widgets())));
}

#[tokio::test]
async fn rejection_rolls_back_with_message() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let before = dump(engine.client().store().as_ref());
    let executor = engine.executor(ScriptedRemote::new([Step::Reject("name taken")]));

    let err = executor
        .execute(&widgets(), Mutation::Create(json!({"name": "Dup"})))
        .await
        .unwrap_err();

    assert!(matches!(err, MutationError::Rejected(ref msg) if msg == "name taken"));
    assert_eq!(err.to_string(), "remote rejected mutation: name taken");
    assert_eq!(dump(engine.client().store().as_ref()), before);
}

#[tokio::test]
async fn bulk_failure_rolls_back_as_a_unit() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let before = dump(engine.client().store().as_ref());
    let executor = engine.executor(ScriptedRemote::new([Step::Fail("timeout")]));

    let result = executor
        .execute(
            &widgets(),
            Mutation::BulkUpdate(vec![
                EntityPatch::new("w1", json!({"name": "A"})),
                EntityPatch::new("w2", json!({"name": "B"})),
                EntityPatch::new("w3", json!({"name": "C"})),
            ]),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(dump(engine.client().store().as_ref()), before);
}

#[tokio::test]
async fn missing_id_never_touches_cache_or_remote() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let before = dump(engine.client().store().as_ref());
    let remote = ScriptedRemote::new([]);
    let executor = engine.executor(remote.clone());

    for mutation in [
        Mutation::update("", json!({"name": "x"})),
        Mutation::delete("   "),
        Mutation::BulkDelete(Vec::new()),
    ] {
        let kind = mutation.kind();
        let err = executor.execute(&widgets(), mutation).await.unwrap_err();
        assert!(matches!(err, MutationError::MissingId { kind: k } if k == kind));
    }

    assert!(remote.calls().is_empty());
    assert_eq!(executor.phase(), MutationPhase::Idle);
    assert_eq!(dump(engine.client().store().as_ref()), before);
}

#[tokio::test]
async fn rollback_keeps_invalidated_list_stale() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let list = QueryKey::list_all(&widgets());
    engine.client().invalidate_queries(&KeyPattern::lists(&widgets()));
    let before = engine.client().store().entry(&list);
    let executor = engine.executor(ScriptedRemote::new([Step::Fail("offline")]));

    executor
        .execute(&widgets(), Mutation::delete("w2"))
        .await
        .unwrap_err();

    let store = engine.client().store();
    assert_eq!(store.entry(&list), before);
    assert!(store.is_stale(&list));

    let fetcher = StaticFetcher::default()
        .with(list.clone(), json!({"items": [{"_id": "srv", "name": "Server"}]}));
    let value = engine.client().fetch_query(&list, &fetcher).await.unwrap();
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(value.items().len(), 1);
    assert_eq!(base_names(&engine), vec!["Server"]);
}

#[tokio::test]
async fn fetch_in_flight_does_not_land_over_optimistic_edit() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let list = QueryKey::list_all(&widgets());
    engine.client().invalidate_queries(&KeyPattern::lists(&widgets()));

    let fetch_gate = Arc::new(Notify::new());
    let fetcher = Arc::new(GatedFetcher::new(
        fetch_gate.clone(),
        json!({"items": [{"_id": "old", "name": "Before create"}]}),
    ));
    let read = {
        let client = engine.client().clone();
        let fetcher = Arc::clone(&fetcher);
        let list = list.clone();
        tokio::spawn(async move { client.fetch_query(&list, fetcher.as_ref()).await })
    };
    for _ in 0..200 {
        if fetcher.call_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fetcher.call_count(), 1);

    let remote_gate = Arc::new(Notify::new());
    let executor = Arc::new(engine.executor(ScriptedRemote::new([Step::GateFail(
        remote_gate.clone(),
        "offline",
    )])));
    let mutation = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            executor
                .execute(&widgets(), Mutation::Create(json!({"name": "Draft"})))
                .await
        })
    };
    wait_for_phase(&executor, MutationPhase::Pending).await;
    let optimistic = vec!["Draft", "Widget 1", "Widget 2", "Widget 3"];
    assert_eq!(base_names(&engine), optimistic);

    // The read finishes while the mutation is pending; its payload is dropped.
    fetch_gate.notify_one();
    let value = read.await.unwrap().unwrap();
    assert_eq!(value.items().len(), 4);
    assert_eq!(base_names(&engine), optimistic);
    let cached = engine.client().get_query_data(&list).unwrap();
    let first = cached.items()[0]["_id"].as_str().unwrap().to_string();
    assert!(is_temp_id(&first, DEFAULT_TEMP_ID_PREFIX));

    remote_gate.notify_one();
    mutation.await.unwrap().unwrap_err();
    assert_eq!(base_names(&engine), vec!["Widget 1", "Widget 2", "Widget 3"]);
    assert!(engine.client().store().is_stale(&list));

    let refetch = StaticFetcher::default().with(list.clone(), json!({"items": []}));
    engine.client().fetch_query(&list, &refetch).await.unwrap();
    assert_eq!(refetch.call_count(), 1);
}

// ── Cancellation ─────────────────────────────────────────────────

#[tokio::test]
async fn dropped_mutation_restores_snapshot_and_marks_stale() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let before = dump(engine.client().store().as_ref());
    let executor = Arc::new(engine.executor(ScriptedRemote::new([Step::Hang])));

    let task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            executor
                .execute(&widgets(), Mutation::delete("w2"))
                .await
        })
    };
    wait_for_phase(&executor, MutationPhase::Pending).await;
    assert_eq!(base_names(&engine), vec!["Widget 1", "Widget 3"]);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    let store = engine.client().store();
    assert_eq!(dump(store.as_ref()), before);
    assert!(store.is_stale(&QueryKey::list_all(&widgets())));
    assert!(store.is_stale(&QueryKey::detail(&widgets(), "w2")));
}

// ── Concurrency policies ─────────────────────────────────────────

#[tokio::test]
async fn serialize_policy_runs_same_type_mutations_in_order() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let gate = Arc::new(Notify::new());
    let remote = ScriptedRemote::new([Step::Gate(gate.clone()), Step::Succeed]);
    let executor = Arc::new(engine.executor(remote.clone()));

    let first = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            executor
                .execute(&widgets(), Mutation::update("w1", json!({"name": "first"})))
                .await
        })
    };
    wait_for_phase(&executor, MutationPhase::Pending).await;

    let second = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            executor
                .execute(&widgets(), Mutation::update("w3", json!({"name": "second"})))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    // The second mutation is queued: not applied, not sent.
    assert_eq!(remote.calls().len(), 1);
    assert_eq!(base_names(&engine), vec!["first", "Widget 2", "Widget 3"]);

    gate.notify_one();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(remote.log(), vec!["start:w1", "end:w1", "start:w3", "end:w3"]);
}

#[tokio::test]
async fn last_writer_wins_rollback_discards_concurrent_edit() {
    let engine = engine(ConcurrencyPolicy::LastWriterWins);
    let gate = Arc::new(Notify::new());
    let remote = ScriptedRemote::new([Step::GateFail(gate.clone(), "conflict"), Step::Succeed]);
    let executor = Arc::new(engine.executor(remote.clone()));

    let first = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            executor
                .execute(&widgets(), Mutation::update("w1", json!({"name": "first"})))
                .await
        })
    };
    wait_for_phase(&executor, MutationPhase::Pending).await;

    // Overlaps the pending first mutation and completes before it.
    executor
        .execute(&widgets(), Mutation::update("w3", json!({"name": "second"})))
        .await
        .unwrap();
    assert_eq!(base_names(&engine), vec!["first", "Widget 2", "second"]);

    gate.notify_one();
    let err = first.await.unwrap().unwrap_err();
    assert!(matches!(err, MutationError::Remote(_)));

    // The first rollback restored its own snapshot, erasing the second edit.
    // The second sync's invalidation survives, so the next read refetches.
    assert_eq!(base_names(&engine), vec!["Widget 1", "Widget 2", "Widget 3"]);
    assert!(engine
        .client()
        .store()
        .is_stale(&QueryKey::list_all(&widgets())));
    assert_eq!(remote.log(), vec!["start:w1", "start:w3", "end:w3", "end:w1"]);
}

#[tokio::test]
async fn different_entity_types_do_not_queue() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let gate = Arc::new(Notify::new());
    let remote = ScriptedRemote::new([Step::Gate(gate.clone()), Step::Succeed]);
    let executor = Arc::new(engine.executor(remote.clone()));

    let first = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            executor
                .execute(&widgets(), Mutation::Create(json!({"name": "held"})))
                .await
        })
    };
    wait_for_phase(&executor, MutationPhase::Pending).await;

    executor
        .execute(&common::gadgets(), Mutation::Create(json!({"name": "free"})))
        .await
        .unwrap();

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(remote.calls().len(), 2);
}

// ── Remote result ────────────────────────────────────────────────

#[test]
fn remote_result_wire_shape() {
    let ok: RemoteResult = serde_json::from_value(json!({"success": true})).unwrap();
    assert_eq!(ok, RemoteResult { success: true, data: None, error: None });
    assert_eq!(
        serde_json::to_value(RemoteResult::rejected("nope")).unwrap(),
        json!({"success": false, "error": "nope"})
    );
}

struct Silent;

#[async_trait::async_trait]
impl RemoteMutator for Silent {
    type Error = BackendError;

    async fn perform(&self, _: &EntityType, _: &Mutation) -> Result<RemoteResult, BackendError> {
        Ok(RemoteResult::default())
    }
}

#[tokio::test]
async fn rejection_without_message_names_the_operation() {
    let engine = engine(ConcurrencyPolicy::Serialize);
    let executor = engine.executor(Arc::new(Silent));

    let err = executor
        .execute(&widgets(), Mutation::Create(json!({"name": "temp"})))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "remote rejected mutation: create was not accepted");
    let list = engine.client().get_query_data(&QueryKey::list_all(&widgets())).unwrap();
    assert!(list.items().iter().all(|doc| doc.doc_id().is_some_and(|id| id.starts_with('w'))));
}
