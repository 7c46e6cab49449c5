//! In-memory query cache for docsync.
//!
//! Provides the process-wide cache that read hooks and the mutation engine
//! share.
//!
//! # Architecture
//!
//! - [`CachedValue`] classifies raw payloads as a single entity, a list, or a
//!   paginated envelope
//! - [`CacheStore`] is the store contract (`get`/`set`/`invalidate`/`subscribe`);
//!   [`MemoryStore`] is the default implementation
//! - [`QueryClient`] layers read-through fetching, observed queries and
//!   refetch-after-invalidation on top of any store
//!
//! Store critical sections are synchronous and short so that rollback can run
//! from `Drop` without an executor.

mod client;
mod error;
mod memory;
mod store;
mod value;

pub use client::{QueryClient, QueryConfig, QueryFetcher, QueryObserver, RefetchReport};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{CacheEntry, CacheEvent, CacheStore, Listener, Subscription};
pub use value::{CachedValue, Paginated, Pagination, RawShape};
