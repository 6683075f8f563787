//! Single-flight coalescing of identical in-flight fetches.
//!
//! Concurrent dispatches that miss the cache for the same key would each
//! hit the network. The flight group collapses them: the first caller
//! becomes the leader and drives the real fetch, everyone else awaits a
//! shared handle to the same future. Exactly one caller is told it led,
//! so exactly one caller writes the cache afterwards.

use color_eyre::{eyre::eyre, Result};
use futures::future::{FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::fetch::{FetchError, FetchFuture, Response};

type SharedFetch = Shared<FetchFuture>;

pub struct FlightGroup {
  inflight: Mutex<HashMap<String, SharedFetch>>,
}

impl FlightGroup {
  pub fn new() -> Self {
    Self {
      inflight: Mutex::new(HashMap::new()),
    }
  }

  /// Run `fetch` for `key`, joining an existing flight when one is up.
  ///
  /// Returns the fetch outcome and whether this caller was the leader.
  /// The closure is only invoked for the leader.
  pub async fn run<F>(&self, key: &str, fetch: F) -> Result<(Result<Response, FetchError>, bool)>
  where
    F: FnOnce() -> FetchFuture,
  {
    let (shared, leader) = {
      let mut inflight = self
        .inflight
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;

      match inflight.get(key) {
        Some(existing) => (existing.clone(), false),
        None => {
          let shared = fetch().shared();
          inflight.insert(key.to_string(), shared.clone());
          (shared, true)
        }
      }
    };

    let result = shared.clone().await;

    // Every finisher tries to retire the flight, not just the leader. If
    // the leader was cancelled mid-await, a follower still cleans up; the
    // pointer check keeps us from removing a newer flight for the key.
    {
      let mut inflight = self
        .inflight
        .lock()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;

      if let Some(current) = inflight.get(key) {
        if current.ptr_eq(&shared) {
          inflight.remove(key);
        }
      }
    }

    Ok((result, leader))
  }

  /// Number of flights currently in the air.
  #[cfg(test)]
  pub fn inflight_count(&self) -> usize {
    self.inflight.lock().map(|m| m.len()).unwrap_or(0)
  }
}
