//! Partition storage backends.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::key::CacheKey;
use super::traits::{CachedResponse, PartitionStore};
use crate::fetch::Response;

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopPartitions;

impl PartitionStore for NoopPartitions {
  fn get(&self, _partition: &str, _key: &CacheKey) -> Result<Option<CachedResponse>> {
    Ok(None) // Always miss
  }

  fn put(&self, _partition: &str, _key: &CacheKey, _response: &Response) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove_partition(&self, _partition: &str) -> Result<bool> {
    Ok(false)
  }

  fn partition_names(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn entry_count(&self, _partition: &str) -> Result<u64> {
    Ok(0)
  }
}

/// SQLite-based partition store.
pub struct SqlitePartitions {
  conn: Mutex<Connection>,
}

impl SqlitePartitions {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  /// Open the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("hidaya").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Request/response pairs, scoped by partition name.
-- Method and url are kept alongside the hash for inspection with the
-- sqlite3 shell; lookups only ever use (partition, key_hash).
CREATE TABLE IF NOT EXISTS cache_entry (
    partition TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (partition, key_hash)
);

CREATE INDEX IF NOT EXISTS idx_cache_entry_partition ON cache_entry(partition);
"#;

impl PartitionStore for SqlitePartitions {
  fn get(&self, partition: &str, key: &CacheKey) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, content_type, body, stored_at FROM cache_entry
         WHERE partition = ? AND key_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare cache lookup: {}", e))?;

    let row: Option<(u16, Option<String>, Vec<u8>, String)> = stmt
      .query_row(params![partition, key.digest()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .ok();

    match row {
      Some((status, content_type, body, stored_at_str)) => {
        let stored_at = parse_datetime(&stored_at_str)?;
        Ok(Some(CachedResponse {
          response: Response {
            status,
            content_type,
            body,
          },
          stored_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, partition: &str, key: &CacheKey, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entry (partition, key_hash, method, url, status, content_type, body, stored_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          partition,
          key.digest(),
          key.method().as_str(),
          key.url(),
          response.status,
          response.content_type,
          response.body,
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn remove_partition(&self, partition: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let removed = conn
      .execute(
        "DELETE FROM cache_entry WHERE partition = ?",
        params![partition],
      )
      .map_err(|e| eyre!("Failed to remove partition: {}", e))?;

    Ok(removed > 0)
  }

  fn partition_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT partition FROM cache_entry ORDER BY partition")
      .map_err(|e| eyre!("Failed to prepare partition listing: {}", e))?;

    let names: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list partitions: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn entry_count(&self, partition: &str) -> Result<u64> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entry WHERE partition = ?",
        params![partition],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count cache entries: {}", e))?;

    Ok(count as u64)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

/// In-memory partition store for tests.
#[cfg(test)]
pub struct MemoryPartitions {
  entries: Mutex<std::collections::HashMap<String, std::collections::HashMap<String, CachedResponse>>>,
}

#[cfg(test)]
impl MemoryPartitions {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(std::collections::HashMap::new()),
    }
  }
}

#[cfg(test)]
impl PartitionStore for MemoryPartitions {
  fn get(&self, partition: &str, key: &CacheKey) -> Result<Option<CachedResponse>> {
    let entries = self.entries.lock().unwrap();
    Ok(
      entries
        .get(partition)
        .and_then(|p| p.get(key.digest()))
        .cloned(),
    )
  }

  fn put(&self, partition: &str, key: &CacheKey, response: &Response) -> Result<()> {
    let mut entries = self.entries.lock().unwrap();
    entries.entry(partition.to_string()).or_default().insert(
      key.digest().to_string(),
      CachedResponse {
        response: response.clone(),
        stored_at: Utc::now(),
      },
    );
    Ok(())
  }

  fn remove_partition(&self, partition: &str) -> Result<bool> {
    let mut entries = self.entries.lock().unwrap();
    Ok(entries.remove(partition).is_some())
  }

  fn partition_names(&self) -> Result<Vec<String>> {
    let entries = self.entries.lock().unwrap();
    let mut names: Vec<String> = entries
      .iter()
      .filter(|(_, p)| !p.is_empty())
      .map(|(name, _)| name.clone())
      .collect();
    names.sort();
    Ok(names)
  }

  fn entry_count(&self, partition: &str) -> Result<u64> {
    let entries = self.entries.lock().unwrap();
    Ok(entries.get(partition).map_or(0, |p| p.len() as u64))
  }
}
