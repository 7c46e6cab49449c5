mod common;

use common::{gadgets, widgets, StaticFetcher};
use docsync_engine::{invalidation_set, InvalidationCoordinator, RelationGraph};
use docsync_store::{CacheStore, CachedValue, QueryClient};
use docsync_types::{EntityType, KeyPattern, OperationKind, QueryKey};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn visits() -> EntityType {
    EntityType::new("visits")
}

fn relations() -> RelationGraph {
    RelationGraph::new()
        .with_relation("widgets", "gadgets")
        .with_relation("gadgets", "visits")
}

// ── RelationGraph ────────────────────────────────────────────────

#[test]
fn closure_is_transitive() {
    let graph = relations();
    assert_eq!(graph.related(&widgets()), vec![gadgets()]);
    assert_eq!(
        graph.closure(&widgets()).into_iter().collect::<Vec<_>>(),
        vec![gadgets(), visits()]
    );
    assert!(graph.closure(&visits()).is_empty());
}

#[test]
fn cycles_terminate_and_exclude_self() {
    let graph = relations().with_relation("visits", "widgets");
    let closure = graph.closure(&widgets());
    assert_eq!(closure.len(), 2);
    assert!(!closure.contains(&widgets()));
}

#[test]
fn self_edges_are_ignored() {
    let graph = RelationGraph::new().with_relation("widgets", "widgets");
    assert!(graph.is_empty());
}

#[test]
fn graph_deserializes_from_adjacency_map() {
    let graph: RelationGraph =
        serde_json::from_value(json!({"widgets": ["gadgets"], "gadgets": ["visits"]})).unwrap();
    assert_eq!(graph, relations());
}

// ── invalidation_set ─────────────────────────────────────────────

#[test]
fn update_invalidates_lists_detail_and_related_lists() {
    let set = invalidation_set(&relations(), &widgets(), OperationKind::Update, Some("w1"));
    let mut expected = vec![
        KeyPattern::lists(&widgets()),
        KeyPattern::exact(&QueryKey::detail(&widgets(), "w1")),
        KeyPattern::lists(&gadgets()),
        KeyPattern::lists(&visits()),
    ];
    expected.sort();
    assert_eq!(set, expected);
}

#[test]
fn create_without_id_skips_detail() {
    let set = invalidation_set(&RelationGraph::new(), &widgets(), OperationKind::Create, None);
    assert_eq!(set, vec![KeyPattern::lists(&widgets())]);
}

#[test]
fn bulk_kinds_invalidate_every_detail() {
    let set = invalidation_set(&RelationGraph::new(), &widgets(), OperationKind::BulkDelete, Some("w1"));
    let mut expected = vec![KeyPattern::lists(&widgets()), KeyPattern::details(&widgets())];
    expected.sort();
    assert_eq!(set, expected);
}

#[test]
fn invalidation_set_is_deterministic() {
    let graph = relations().with_relation("widgets", "visits");
    let a = invalidation_set(&graph, &widgets(), OperationKind::Delete, Some("w1"));
    let b = invalidation_set(&graph, &widgets(), OperationKind::Delete, Some("w1"));
    assert_eq!(a, b);
    let mut deduped = a.clone();
    deduped.dedup();
    assert_eq!(a, deduped);
}

// ── sync ─────────────────────────────────────────────────────────

fn seeded_client() -> QueryClient {
    let client = QueryClient::in_memory();
    for key in [
        QueryKey::list_all(&widgets()),
        QueryKey::list(&widgets(), &json!({"page": 2})),
        QueryKey::detail(&widgets(), "w1"),
        QueryKey::detail(&widgets(), "w2"),
        QueryKey::list_all(&gadgets()),
        QueryKey::detail(&gadgets(), "g1"),
    ] {
        client.set_query_data(key, CachedValue::List(Vec::new()));
    }
    client
}

#[tokio::test]
async fn sync_marks_set_stale_and_nothing_else() {
    let client = seeded_client();
    let coordinator = InvalidationCoordinator::new(client.clone(), relations());

    let report = coordinator.sync(&widgets(), OperationKind::Update, Some("w1")).await;

    let store = client.store();
    assert!(store.is_stale(&QueryKey::list_all(&widgets())));
    assert!(store.is_stale(&QueryKey::list(&widgets(), &json!({"page": 2}))));
    assert!(store.is_stale(&QueryKey::detail(&widgets(), "w1")));
    assert!(store.is_stale(&QueryKey::list_all(&gadgets())));
    assert!(!store.is_stale(&QueryKey::detail(&widgets(), "w2")));
    assert!(!store.is_stale(&QueryKey::detail(&gadgets(), "g1")));
    assert_eq!(report.invalidated.len(), 4);
    assert!(report.refetch.refetched.is_empty());
}

#[tokio::test]
async fn sync_refetches_observed_queries() {
    let client = seeded_client();
    let list = QueryKey::list_all(&widgets());
    let fetcher = Arc::new(StaticFetcher::default().with(list.clone(), json!([{"_id": "w1"}])));
    let _observer = client.observe(list.clone(), fetcher.clone());
    let coordinator = InvalidationCoordinator::new(client.clone(), RelationGraph::new());

    let report = coordinator.sync(&widgets(), OperationKind::Create, None).await;

    assert_eq!(report.refetch.refetched, vec![list.clone()]);
    assert!(!client.store().is_stale(&list));
    assert_eq!(
        client.get_query_data(&list),
        Some(CachedValue::List(vec![json!({"_id": "w1"})]))
    );
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn sync_without_refetch_leaves_observed_stale() {
    let client = seeded_client();
    let list = QueryKey::list_all(&widgets());
    let fetcher = Arc::new(StaticFetcher::default());
    let _observer = client.observe(list.clone(), fetcher.clone());
    let coordinator =
        InvalidationCoordinator::new(client.clone(), RelationGraph::new()).with_refetch(false);

    coordinator.sync(&widgets(), OperationKind::Create, None).await;

    assert!(client.store().is_stale(&list));
    assert_eq!(fetcher.call_count(), 0);
}
