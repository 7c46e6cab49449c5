//! Static relations between entity types.
//!
//! An edge `a → b` means a mutation of `a` can change what lists of `b` show
//! (a visit embeds its school's name, so mutating schools affects visit
//! lists). Edges are directed; cycles are allowed.

use docsync_types::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Adjacency list of entity type relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationGraph {
    edges: BTreeMap<EntityType, BTreeSet<EntityType>>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `from → to` edges. Self-edges are ignored.
    pub fn relate<I>(&mut self, from: &EntityType, to: I)
    where
        I: IntoIterator<Item = EntityType>,
    {
        let targets = self.edges.entry(from.clone()).or_default();
        targets.extend(to.into_iter().filter(|t| t != from));
    }

    pub fn with_relation(mut self, from: impl Into<EntityType>, to: impl Into<EntityType>) -> Self {
        self.relate(&from.into(), [to.into()]);
        self
    }

    /// Direct neighbours of `entity_type`.
    pub fn related(&self, entity_type: &EntityType) -> Vec<EntityType> {
        self.edges
            .get(entity_type)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every type reachable from `entity_type`, excluding itself.
    pub fn closure(&self, entity_type: &EntityType) -> BTreeSet<EntityType> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![entity_type.clone()];
        while let Some(current) = stack.pop() {
            if let Some(targets) = self.edges.get(&current) {
                for target in targets {
                    if target != entity_type && seen.insert(target.clone()) {
                        stack.push(target.clone());
                    }
                }
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.edges.values().all(BTreeSet::is_empty)
    }
}
