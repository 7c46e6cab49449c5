//! Engine configuration.

use docsync_types::DEFAULT_TEMP_ID_PREFIX;
use serde::{Deserialize, Serialize};

/// How mutations against the same entity type interact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// One mutation per entity type at a time; later ones wait their turn.
    #[default]
    Serialize,
    /// Mutations overlap freely. A rollback restores the snapshot its own
    /// mutation took, which can discard a concurrent mutation's optimistic
    /// edit until the next refetch.
    LastWriterWins,
}

/// Settings for speculative cache edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimisticConfig {
    /// Prefix of provisional ids given to optimistically created entities.
    pub temp_id_prefix: String,
    /// Stamp `createdAt`/`updatedAt` on optimistic creates and updates.
    pub stamp_timestamps: bool,
}

impl Default for OptimisticConfig {
    fn default() -> Self {
        Self {
            temp_id_prefix: DEFAULT_TEMP_ID_PREFIX.to_string(),
            stamp_timestamps: false,
        }
    }
}

/// Configuration for the cache engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub concurrency: ConcurrencyPolicy,
    pub optimistic: OptimisticConfig,
    /// Refetch observed queries after a successful mutation's invalidation.
    pub refetch_on_sync: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyPolicy::default(),
            optimistic: OptimisticConfig::default(),
            refetch_on_sync: true,
        }
    }
}

impl EngineConfig {
    pub fn with_concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency = policy;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.optimistic.stamp_timestamps = enabled;
        self
    }

    pub fn with_temp_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.optimistic.temp_id_prefix = prefix.into();
        self
    }

    pub fn with_refetch_on_sync(mut self, enabled: bool) -> Self {
        self.refetch_on_sync = enabled;
        self
    }
}
