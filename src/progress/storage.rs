//! Key-value storage backends for progress data.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for progress storage backends. Plain string key-value; the store
/// layers JSON maps and counters on top.
pub trait ProgressStorage: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;
  fn put(&self, key: &str, value: &str) -> Result<()>;
  /// Delete a key outright. Clearing operations persist empty
  /// values instead of removing keys.
  #[allow(dead_code)]
  fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-based progress storage.
pub struct SqliteProgress {
  conn: Mutex<Connection>,
}

impl SqliteProgress {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create progress directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  /// Open the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open progress database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("hidaya").join("progress.db"))
  }

  /// Run database migrations for the progress table.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(PROGRESS_SCHEMA)
      .map_err(|e| eyre!("Failed to run progress migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the progress table.
const PROGRESS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS progress_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl ProgressStorage for SqliteProgress {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT value FROM progress_kv WHERE key = ?")
      .map_err(|e| eyre!("Failed to prepare progress lookup: {}", e))?;

    let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).ok();

    Ok(value)
  }

  fn put(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO progress_kv (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store progress value: {}", e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM progress_kv WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove progress value: {}", e))?;

    Ok(())
  }
}

/// In-memory progress storage for tests.
#[cfg(test)]
pub struct MemoryProgress {
  values: Mutex<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryProgress {
  pub fn new() -> Self {
    Self {
      values: Mutex::new(std::collections::HashMap::new()),
    }
  }
}

#[cfg(test)]
impl ProgressStorage for MemoryProgress {
  fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.values.lock().unwrap().get(key).cloned())
  }

  fn put(&self, key: &str, value: &str) -> Result<()> {
    self
      .values
      .lock()
      .unwrap()
      .insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.values.lock().unwrap().remove(key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteProgress::open_at(&dir.path().join("progress.db")).unwrap();

    assert!(storage.get("masbaha_total").unwrap().is_none());

    storage.put("masbaha_total", "42").unwrap();
    assert_eq!(storage.get("masbaha_total").unwrap().as_deref(), Some("42"));

    storage.put("masbaha_total", "43").unwrap();
    assert_eq!(storage.get("masbaha_total").unwrap().as_deref(), Some("43"));
  }

  #[test]
  fn test_sqlite_remove() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteProgress::open_at(&dir.path().join("progress.db")).unwrap();

    storage.put("lang", "en").unwrap();
    storage.remove("lang").unwrap();
    assert!(storage.get("lang").unwrap().is_none());

    // Removing an absent key is fine.
    storage.remove("lang").unwrap();
  }

  #[test]
  fn test_sqlite_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.db");

    {
      let storage = SqliteProgress::open_at(&path).unwrap();
      storage.put("morning_counts", r#"{"7":3}"#).unwrap();
    }

    let storage = SqliteProgress::open_at(&path).unwrap();
    assert_eq!(
      storage.get("morning_counts").unwrap().as_deref(),
      Some(r#"{"7":3}"#)
    );
  }
}
