//! Devotional progress: per-category counters, completion flags and the
//! masbaha tally.
//!
//! State is a handful of key-value entries: a JSON integer map and a JSON
//! boolean map per category, bare integer strings for the tally counters.
//! Unreadable stored data is discarded with a warning and treated as no
//! progress; a corrupt entry must never brick the feature. Writes happen
//! only for accepted mutations, so a saturated counter leaves the stored
//! state untouched.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use super::storage::ProgressStorage;
use super::tally::{milestone_for, Milestone, Tally, TallyTap};
use crate::bus::{EventBus, Subscription};

const LIFETIME_TOTAL_KEY: &str = "masbaha_total";
const SESSION_COUNT_KEY: &str = "masbaha_count";
const LANG_KEY: &str = "lang";

const EVENT_CAPACITY: usize = 64;

/// Outcome of one increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemProgress {
  pub value: u32,
  /// True only on the call that reached the target.
  pub just_completed: bool,
}

/// Everything stored for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryProgress {
  pub counts: HashMap<u32, u32>,
  pub completed: HashMap<u32, bool>,
}

/// Notifications published on accepted mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
  ItemIncremented {
    category: String,
    item: u32,
    value: u32,
    just_completed: bool,
  },
  CategoryReset {
    category: String,
  },
  TallyTapped {
    session: u64,
    total: u64,
    milestone: Option<Milestone>,
  },
  TallyReset,
}

pub struct ProgressStore<S: ProgressStorage> {
  storage: S,
  events: EventBus<ProgressEvent>,
}

impl<S: ProgressStorage> ProgressStore<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage,
      events: EventBus::new(EVENT_CAPACITY),
    }
  }

  /// Subscribe to progress notifications.
  #[allow(dead_code)]
  pub fn subscribe(&self) -> Subscription<ProgressEvent> {
    self.events.subscribe()
  }

  /// Bump one item's counter, saturating at `target`.
  ///
  /// The call that reaches the target latches the completion flag. Calls
  /// past the target change nothing and write nothing.
  pub fn increment(&mut self, category: &str, item: u32, target: u32) -> Result<ItemProgress> {
    let counts_key = counts_key(category);
    let mut counts: HashMap<u32, u32> = self.load_map(&counts_key)?;
    let current = counts.get(&item).copied().unwrap_or(0);

    if current >= target {
      return Ok(ItemProgress {
        value: current,
        just_completed: false,
      });
    }

    let value = current + 1;
    counts.insert(item, value);
    self.store_map(&counts_key, &counts)?;

    let just_completed = value == target;
    if just_completed {
      let completed_key = completed_key(category);
      let mut completed: HashMap<u32, bool> = self.load_map(&completed_key)?;
      completed.insert(item, true);
      self.store_map(&completed_key, &completed)?;
    }

    self.events.publish(ProgressEvent::ItemIncremented {
      category: category.to_string(),
      item,
      value,
      just_completed,
    });

    Ok(ItemProgress {
      value,
      just_completed,
    })
  }

  /// Clear a category's counters and completion flags. The lifetime tally
  /// total is not a category and is never touched by this.
  pub fn reset(&mut self, category: &str) -> Result<()> {
    self.store_map::<u32>(&counts_key(category), &HashMap::new())?;
    self.store_map::<bool>(&completed_key(category), &HashMap::new())?;

    self.events.publish(ProgressEvent::CategoryReset {
      category: category.to_string(),
    });

    Ok(())
  }

  pub fn load(&self, category: &str) -> Result<CategoryProgress> {
    Ok(CategoryProgress {
      counts: self.load_map(&counts_key(category))?,
      completed: self.load_map(&completed_key(category))?,
    })
  }

  /// Lifetime dhikr count. Append-only; survives every reset.
  pub fn lifetime_total(&self) -> Result<u64> {
    self.load_counter(LIFETIME_TOTAL_KEY)
  }

  pub fn increment_lifetime_total(&mut self) -> Result<u64> {
    let total = self.load_counter(LIFETIME_TOTAL_KEY)? + 1;
    self.storage.put(LIFETIME_TOTAL_KEY, &total.to_string())?;
    Ok(total)
  }

  /// One tap on the masbaha: bumps the session counter and the lifetime
  /// total, and reports any milestone the session counter just hit.
  pub fn tally_tap(&mut self) -> Result<TallyTap> {
    let session = self.load_counter(SESSION_COUNT_KEY)? + 1;
    self.storage.put(SESSION_COUNT_KEY, &session.to_string())?;
    let total = self.increment_lifetime_total()?;
    let milestone = milestone_for(session);

    self.events.publish(ProgressEvent::TallyTapped {
      session,
      total,
      milestone,
    });

    Ok(TallyTap {
      session,
      total,
      milestone,
    })
  }

  /// Zero the session counter. The lifetime total only ever grows.
  pub fn tally_reset(&mut self) -> Result<()> {
    self.storage.put(SESSION_COUNT_KEY, "0")?;
    self.events.publish(ProgressEvent::TallyReset);
    Ok(())
  }

  pub fn tally(&self) -> Result<Tally> {
    Ok(Tally {
      session: self.load_counter(SESSION_COUNT_KEY)?,
      total: self.lifetime_total()?,
    })
  }

  /// The stored language preference, if any.
  pub fn language(&self) -> Result<Option<String>> {
    self.storage.get(LANG_KEY)
  }

  fn load_map<V: DeserializeOwned>(&self, key: &str) -> Result<HashMap<u32, V>> {
    let Some(raw) = self.storage.get(key)? else {
      return Ok(HashMap::new());
    };

    match serde_json::from_str(&raw) {
      Ok(map) => Ok(map),
      Err(e) => {
        warn!(key, error = %e, "discarding unreadable progress data");
        Ok(HashMap::new())
      }
    }
  }

  fn store_map<V: Serialize>(&self, key: &str, map: &HashMap<u32, V>) -> Result<()> {
    let raw = serde_json::to_string(map)
      .map_err(|e| eyre!("Failed to serialize progress for {}: {}", key, e))?;
    self.storage.put(key, &raw)
  }

  fn load_counter(&self, key: &str) -> Result<u64> {
    let Some(raw) = self.storage.get(key)? else {
      return Ok(0);
    };

    match raw.trim().parse() {
      Ok(n) => Ok(n),
      Err(_) => {
        warn!(key, value = %raw, "discarding unreadable counter");
        Ok(0)
      }
    }
  }
}

fn counts_key(category: &str) -> String {
  format!("{}_counts", category)
}

fn completed_key(category: &str) -> String {
  format!("{}_completed", category)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::progress::storage::{MemoryProgress, SqliteProgress};

  fn memory_store() -> ProgressStore<MemoryProgress> {
    ProgressStore::new(MemoryProgress::new())
  }

  #[test]
  fn test_increment_saturates_at_target() {
    let mut store = memory_store();

    let expected = [
      ItemProgress { value: 1, just_completed: false },
      ItemProgress { value: 2, just_completed: false },
      ItemProgress { value: 3, just_completed: true },
    ];
    for want in expected {
      assert_eq!(store.increment("morning", 7, 3).unwrap(), want);
    }

    // Past the target: value pinned, no new completion, nothing written.
    assert_eq!(
      store.increment("morning", 7, 3).unwrap(),
      ItemProgress { value: 3, just_completed: false }
    );

    let progress = store.load("morning").unwrap();
    assert_eq!(progress.counts.get(&7), Some(&3));
    assert_eq!(progress.completed.get(&7), Some(&true));
  }

  #[test]
  fn test_items_count_independently() {
    let mut store = memory_store();

    store.increment("morning", 1, 3).unwrap();
    store.increment("morning", 1, 3).unwrap();
    store.increment("morning", 2, 1).unwrap();

    let progress = store.load("morning").unwrap();
    assert_eq!(progress.counts.get(&1), Some(&2));
    assert_eq!(progress.counts.get(&2), Some(&1));
    assert_eq!(progress.completed.get(&1), None);
    assert_eq!(progress.completed.get(&2), Some(&true));
  }

  #[test]
  fn test_reset_clears_category_only() {
    let mut store = memory_store();

    store.increment("morning", 7, 3).unwrap();
    store.increment("evening", 2, 5).unwrap();
    store.tally_tap().unwrap();
    store.tally_tap().unwrap();

    store.reset("morning").unwrap();

    assert_eq!(store.load("morning").unwrap(), CategoryProgress::default());
    assert_eq!(store.load("evening").unwrap().counts.get(&2), Some(&1));
    assert_eq!(store.lifetime_total().unwrap(), 2);
  }

  #[test]
  fn test_state_round_trips_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.db");

    let before = {
      let mut store = ProgressStore::new(SqliteProgress::open_at(&path).unwrap());
      store.increment("morning", 7, 3).unwrap();
      store.increment("morning", 7, 3).unwrap();
      store.increment("morning", 9, 1).unwrap();
      store.increment("evening", 1, 3).unwrap();
      store.reset("evening").unwrap();
      store.tally_tap().unwrap();
      store.tally_tap().unwrap();
      store.tally_reset().unwrap();
      store.tally_tap().unwrap();
      (
        store.load("morning").unwrap(),
        store.load("evening").unwrap(),
        store.tally().unwrap(),
      )
    };

    let store = ProgressStore::new(SqliteProgress::open_at(&path).unwrap());
    assert_eq!(store.load("morning").unwrap(), before.0);
    assert_eq!(store.load("evening").unwrap(), before.1);
    assert_eq!(store.tally().unwrap(), before.2);
    assert_eq!(store.tally().unwrap(), Tally { session: 1, total: 3 });
  }

  #[test]
  fn test_corrupt_maps_yield_empty_progress() {
    let storage = MemoryProgress::new();
    storage.put("morning_counts", "{not json").unwrap();
    storage.put("morning_completed", "[1,2,3]").unwrap();

    let mut store = ProgressStore::new(storage);
    assert_eq!(store.load("morning").unwrap(), CategoryProgress::default());

    // The next accepted increment starts from zero and overwrites the
    // corrupt entry.
    let progress = store.increment("morning", 7, 3).unwrap();
    assert_eq!(progress, ItemProgress { value: 1, just_completed: false });
    assert_eq!(store.load("morning").unwrap().counts.get(&7), Some(&1));
  }

  #[test]
  fn test_corrupt_counter_defaults_to_zero() {
    let storage = MemoryProgress::new();
    storage.put("masbaha_total", "not a number").unwrap();

    let mut store = ProgressStore::new(storage);
    assert_eq!(store.lifetime_total().unwrap(), 0);

    let tap = store.tally_tap().unwrap();
    assert_eq!(tap.total, 1);
  }

  #[test]
  fn test_one_hundred_taps() {
    let mut store = memory_store();

    let mut fired = Vec::new();
    for _ in 0..100 {
      let tap = store.tally_tap().unwrap();
      if let Some(milestone) = tap.milestone {
        fired.push((tap.session, milestone));
      }
    }

    assert_eq!(store.tally().unwrap(), Tally { session: 100, total: 100 });
    assert_eq!(
      fired,
      vec![
        (33, Milestone::ThirtyThree),
        (66, Milestone::ThirtyThree),
        (99, Milestone::ThirtyThree),
        (100, Milestone::Hundred),
      ]
    );
  }

  #[test]
  fn test_thousandth_tap_fires_milestone() {
    let storage = MemoryProgress::new();
    storage.put("masbaha_count", "999").unwrap();
    storage.put("masbaha_total", "5999").unwrap();

    let mut store = ProgressStore::new(storage);
    let tap = store.tally_tap().unwrap();

    assert_eq!(tap.session, 1000);
    assert_eq!(tap.total, 6000);
    assert_eq!(tap.milestone, Some(Milestone::Thousand));
  }

  #[test]
  fn test_tally_reset_preserves_lifetime_total() {
    let mut store = memory_store();

    for _ in 0..5 {
      store.tally_tap().unwrap();
    }
    store.tally_reset().unwrap();
    assert_eq!(store.tally().unwrap(), Tally { session: 0, total: 5 });

    let tap = store.tally_tap().unwrap();
    assert_eq!(tap.session, 1);
    assert_eq!(tap.total, 6);
  }

  #[test]
  fn test_language_preference() {
    let storage = MemoryProgress::new();
    storage.put("lang", "ar").unwrap();

    let store = ProgressStore::new(storage);
    assert_eq!(store.language().unwrap().as_deref(), Some("ar"));
  }

  #[tokio::test]
  async fn test_mutations_publish_events() {
    let mut store = memory_store();
    let mut sub = store.subscribe();

    store.increment("morning", 7, 1).unwrap();
    store.reset("morning").unwrap();
    store.tally_tap().unwrap();

    assert_eq!(
      sub.next().await.unwrap(),
      ProgressEvent::ItemIncremented {
        category: "morning".to_string(),
        item: 7,
        value: 1,
        just_completed: true,
      }
    );
    assert_eq!(
      sub.next().await.unwrap(),
      ProgressEvent::CategoryReset {
        category: "morning".to_string(),
      }
    );
    assert_eq!(
      sub.next().await.unwrap(),
      ProgressEvent::TallyTapped {
        session: 1,
        total: 1,
        milestone: None,
      }
    );
  }

  #[test]
  fn test_saturated_increment_writes_nothing() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStorage {
      inner: MemoryProgress,
      puts: Arc<AtomicUsize>,
    }

    impl ProgressStorage for CountingStorage {
      fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
      }

      fn put(&self, key: &str, value: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value)
      }

      fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
      }
    }

    let puts = Arc::new(AtomicUsize::new(0));
    let mut store = ProgressStore::new(CountingStorage {
      inner: MemoryProgress::new(),
      puts: puts.clone(),
    });

    store.increment("morning", 7, 1).unwrap();
    let writes_after_first = puts.load(Ordering::SeqCst);

    // Saturated: the stored state must not be touched at all.
    store.increment("morning", 7, 1).unwrap();
    assert_eq!(puts.load(Ordering::SeqCst), writes_after_first);
    assert_eq!(store.load("morning").unwrap().counts.get(&7), Some(&1));
  }
}
