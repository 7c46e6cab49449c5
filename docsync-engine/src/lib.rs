//! Optimistic mutation and cache synchronization engine for docsync.
//!
//! Mutations are applied to the local cache before the remote store confirms
//! them, then reconciled: confirmed mutations invalidate (and refetch) every
//! query that could show the mutated entity; failed ones restore the exact
//! pre-mutation snapshot.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Optimistic**: snapshot, speculative create/update/delete, rollback
//! - **Relations**: static graph of entity types whose lists embed each other
//! - **Coordinator**: computes the invalidation set and refetches observed
//!   queries
//! - **Queue**: per-entity-type ordering of concurrent mutations
//! - **Executor**: drives one mutation through its phases
//! - **Hooks / Resource**: the surface UI code calls
//!
//! ## Mutation lifecycle
//!
//! 1. **Check**: update/delete mutations must carry ids
//! 2. **Snapshot**: capture every cached list and addressed detail key
//! 3. **Apply**: edit the cache speculatively
//! 4. **Remote**: perform the mutation against the document store
//! 5. **Reconcile**: invalidate + refetch on success, restore on failure
//!
//! # Example
//!
//! ```
//! use docsync_engine::{CacheEngine, EngineConfig, RelationGraph};
//! use docsync_store::QueryClient;
//!
//! let relations = RelationGraph::new().with_relation("schools", "visits");
//! let engine = CacheEngine::new(QueryClient::in_memory(), relations, EngineConfig::default());
//! assert!(engine.config().refetch_on_sync);
//! ```

mod config;
mod coordinator;
mod engine;
mod error;
mod executor;
mod hooks;
mod optimistic;
mod queue;
mod relations;
mod resource;

pub use config::{ConcurrencyPolicy, EngineConfig, OptimisticConfig};
pub use coordinator::{invalidation_set, InvalidationCoordinator, InvalidationReport};
pub use engine::CacheEngine;
pub use error::{EngineError, EngineResult, MutationError};
pub use executor::{MutationExecutor, MutationPhase, RemoteMutator, RemoteResult};
pub use hooks::MutationHandle;
pub use optimistic::{OptimisticCache, OptimisticContext};
pub use queue::{MutationQueue, QueuePermit};
pub use relations::RelationGraph;
pub use resource::EntityResource;
