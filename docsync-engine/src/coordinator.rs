//! Cache invalidation after confirmed mutations.
//!
//! A confirmed mutation never patches the server response into the cache.
//! Instead every list that could show the mutated entity is invalidated as a
//! whole, along with the entity's detail key and the lists of related types.
//! Observed queries in that set are refetched immediately; everything else
//! refetches on its next read.

use crate::relations::RelationGraph;
use docsync_store::{QueryClient, RefetchReport};
use docsync_types::{EntityType, KeyPattern, OperationKind, QueryKey};
use tracing::{debug, info};

/// Patterns to invalidate after a `kind` mutation of `entity_type`.
///
/// Deterministic: the result is sorted and de-duplicated.
pub fn invalidation_set(
    relations: &RelationGraph,
    entity_type: &EntityType,
    kind: OperationKind,
    id: Option<&str>,
) -> Vec<KeyPattern> {
    let mut patterns = vec![KeyPattern::lists(entity_type)];
    if kind.is_bulk() {
        patterns.push(KeyPattern::details(entity_type));
    } else if let Some(id) = id {
        patterns.push(KeyPattern::exact(&QueryKey::detail(entity_type, id)));
    }
    for related in relations.closure(entity_type) {
        patterns.push(KeyPattern::lists(&related));
    }
    patterns.sort();
    patterns.dedup();
    patterns
}

/// Outcome of one [`InvalidationCoordinator::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub patterns: Vec<KeyPattern>,
    /// Cached keys marked stale, sorted.
    pub invalidated: Vec<QueryKey>,
    pub refetch: RefetchReport,
}

/// Invalidates and refetches after confirmed mutations.
#[derive(Debug, Clone)]
pub struct InvalidationCoordinator {
    client: QueryClient,
    relations: RelationGraph,
    refetch: bool,
}

impl InvalidationCoordinator {
    pub fn new(client: QueryClient, relations: RelationGraph) -> Self {
        Self {
            client,
            relations,
            refetch: true,
        }
    }

    /// Enables or disables the refetch of observed queries.
    pub fn with_refetch(mut self, enabled: bool) -> Self {
        self.refetch = enabled;
        self
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn relations(&self) -> &RelationGraph {
        &self.relations
    }

    /// Marks the invalidation set stale and refetches observed queries in it.
    ///
    /// Refetch failures are reported, not raised: the keys stay stale and the
    /// next read retries.
    pub async fn sync(
        &self,
        entity_type: &EntityType,
        kind: OperationKind,
        id: Option<&str>,
    ) -> InvalidationReport {
        let patterns = invalidation_set(&self.relations, entity_type, kind, id);
        let mut invalidated = Vec::new();
        for pattern in &patterns {
            invalidated.extend(self.client.invalidate_queries(pattern));
        }
        invalidated.sort();
        invalidated.dedup();

        let refetch = if self.refetch {
            self.client.refetch_queries(&patterns).await
        } else {
            RefetchReport::default()
        };

        info!(
            "Synced {} {}: {} key(s) invalidated, {} refetched, {} failed, {} superseded",
            kind,
            entity_type,
            invalidated.len(),
            refetch.refetched.len(),
            refetch.failed.len(),
            refetch.superseded.len()
        );
        debug!(
            "Invalidation set: {}",
            patterns
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        );

        InvalidationReport {
            patterns,
            invalidated,
            refetch,
        }
    }
}
