//! Core traits and types for the cache partitions.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use color_eyre::Result;

use super::key::CacheKey;
use crate::fetch::Response;

/// A cached response plus the moment it was stored.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The response as it came off the network.
  pub response: Response,
  /// When the entry was written.
  pub stored_at: DateTime<Utc>,
}

/// Indicates where a dispatched response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Fresh data from network
  Network,
  /// Served from a cache partition
  Cache,
  /// Network unavailable, serving cached data as a fallback
  Offline,
}

/// Notifications published by the cache layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// A fetch (foreground or background revalidation) wrote a fresh response.
  PartitionUpdated { partition: String, url: String },
  /// An obsolete partition was dropped during activation.
  PartitionRemoved { partition: String },
}

/// Trait for partition storage backends.
///
/// A partition is a named bucket of request/response pairs. One backend
/// holds every partition; the partition name scopes each operation.
pub trait PartitionStore: Send + Sync {
  /// Look up a cached response by key.
  fn get(&self, partition: &str, key: &CacheKey) -> Result<Option<CachedResponse>>;

  /// Store a response, replacing any previous entry for the same key.
  fn put(&self, partition: &str, key: &CacheKey, response: &Response) -> Result<()>;

  /// Delete a partition and everything in it. Returns whether it existed.
  fn remove_partition(&self, partition: &str) -> Result<bool>;

  /// Names of all partitions that currently hold at least one entry.
  fn partition_names(&self) -> Result<Vec<String>>;

  /// Number of entries in a partition.
  fn entry_count(&self, partition: &str) -> Result<u64>;
}

/// A handle binding a shared storage backend to one partition name.
#[derive(Clone)]
pub struct Partition {
  store: Arc<dyn PartitionStore>,
  name: String,
}

impl Partition {
  pub fn new(store: Arc<dyn PartitionStore>, name: impl Into<String>) -> Self {
    Self {
      store,
      name: name.into(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>> {
    self.store.get(&self.name, key)
  }

  pub fn put(&self, key: &CacheKey, response: &Response) -> Result<()> {
    self.store.put(&self.name, key, response)
  }

  pub fn entry_count(&self) -> Result<u64> {
    self.store.entry_count(&self.name)
  }
}
