//! Offline caching layer: strategy dispatch over versioned partitions.
//!
//! This module decides, per request, how the network and the local cache
//! cooperate:
//! - Classifies each request as cache-first, network-first,
//!   stale-while-revalidate or pass-through
//! - Keeps two versioned partitions (app shell and API data) in one store
//! - Coalesces identical concurrent fetches into a single network call
//! - Precaches the shell on install, prunes old generations on activate

mod dispatcher;
mod flight;
mod key;
mod lifecycle;
mod routes;
mod storage;
mod traits;

pub use dispatcher::{Dispatched, Dispatcher};
pub use key::CacheKey;
pub use lifecycle::{GenerationNames, Lifecycle};
pub use routes::{RouteTable, Strategy};
pub use storage::{NoopPartitions, SqlitePartitions};
pub use traits::{CacheEvent, CachedResponse, Partition, PartitionStore, ResponseSource};

#[cfg(test)]
pub use storage::MemoryPartitions;
