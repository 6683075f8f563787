//! Install and activate: partition provisioning for one cache generation.
//!
//! A generation is a pair of partition names derived from the configured
//! slug and version, e.g. `hidaya-cache-v2` / `hidaya-data-v2`. Install
//! precaches the app shell into the shell partition; activate prunes every
//! partition that does not belong to the current generation.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::key::CacheKey;
use super::traits::{CacheEvent, PartitionStore};
use crate::bus::EventBus;
use crate::fetch::{Fetch, Method, Request};

/// The two partition names of the current cache generation.
#[derive(Debug, Clone)]
pub struct GenerationNames {
  pub shell: String,
  pub data: String,
}

pub struct Lifecycle {
  store: Arc<dyn PartitionStore>,
  fetcher: Arc<dyn Fetch>,
  events: EventBus<CacheEvent>,
  names: GenerationNames,
  shell_origin: Option<Url>,
  precache: Vec<String>,
}

impl Lifecycle {
  pub fn new(
    store: Arc<dyn PartitionStore>,
    fetcher: Arc<dyn Fetch>,
    events: EventBus<CacheEvent>,
    names: GenerationNames,
    shell_origin: Option<Url>,
    precache: Vec<String>,
  ) -> Self {
    Self {
      store,
      fetcher,
      events,
      names,
      shell_origin,
      precache,
    }
  }

  /// Fetch every precache entry and write the lot into the shell
  /// partition. All-or-nothing: one failed or non-2xx entry abandons the
  /// install with zero writes. Returns the number of entries written.
  pub async fn install(&self) -> Result<usize> {
    let urls: Vec<String> = self
      .precache
      .iter()
      .map(|entry| self.resolve(entry))
      .collect::<Result<_>>()?;

    let results = join_all(
      urls
        .iter()
        .map(|url| self.fetcher.fetch(Request::get(url.clone()))),
    )
    .await;

    let mut staged = Vec::with_capacity(urls.len());
    for (url, result) in urls.iter().zip(results) {
      let response = result.map_err(|e| eyre!("Failed to precache {}: {}", url, e))?;
      if !response.is_success() {
        return Err(eyre!("Failed to precache {}: HTTP {}", url, response.status));
      }
      staged.push((url, response));
    }

    for (url, response) in &staged {
      let key = CacheKey::new(Method::Get, url);
      self.store.put(&self.names.shell, &key, response)?;
      self.events.publish(CacheEvent::PartitionUpdated {
        partition: self.names.shell.clone(),
        url: (*url).clone(),
      });
    }

    info!(
      entries = staged.len(),
      partition = %self.names.shell,
      "precache installed"
    );

    Ok(staged.len())
  }

  /// Drop every partition that is not part of the current generation.
  /// Returns the pruned names.
  pub fn activate(&self) -> Result<Vec<String>> {
    let mut pruned = Vec::new();

    for name in self.store.partition_names()? {
      if name == self.names.shell || name == self.names.data {
        continue;
      }
      if self.store.remove_partition(&name)? {
        info!(partition = %name, "pruned obsolete partition");
        self.events.publish(CacheEvent::PartitionRemoved {
          partition: name.clone(),
        });
        pruned.push(name);
      }
    }

    Ok(pruned)
  }

  /// Resolve a precache entry to an absolute URL. Relative entries need a
  /// configured shell origin.
  fn resolve(&self, entry: &str) -> Result<String> {
    if entry.starts_with("http://") || entry.starts_with("https://") {
      return Ok(entry.to_string());
    }

    let origin = self
      .shell_origin
      .as_ref()
      .ok_or_else(|| eyre!("Relative precache entry '{}' requires a shell origin", entry))?;

    let url = origin
      .join(entry)
      .map_err(|e| eyre!("Invalid precache entry '{}': {}", entry, e))?;

    Ok(url.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::MemoryPartitions;
  use crate::fetch::{FakeFetch, Response};

  fn names() -> GenerationNames {
    GenerationNames {
      shell: "hidaya-cache-v2".to_string(),
      data: "hidaya-data-v2".to_string(),
    }
  }

  fn lifecycle(
    store: Arc<dyn PartitionStore>,
    fetch: Arc<FakeFetch>,
    precache: Vec<&str>,
  ) -> (Lifecycle, EventBus<CacheEvent>) {
    let events = EventBus::new(16);
    let lifecycle = Lifecycle::new(
      store,
      fetch,
      events.clone(),
      names(),
      Some(Url::parse("https://hidaya.app").unwrap()),
      precache.into_iter().map(String::from).collect(),
    );
    (lifecycle, events)
  }

  #[tokio::test]
  async fn test_install_precaches_every_entry() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitions::new());
    let fetch = Arc::new(FakeFetch::new());
    fetch.reply("https://hidaya.app/", 200, "<html>");
    fetch.reply("https://hidaya.app/index.html", 200, "<html>");
    fetch.reply("https://cdn.tailwindcss.com/", 200, "tailwind");

    let (lifecycle, _) = lifecycle(
      store.clone(),
      fetch,
      vec!["/", "/index.html", "https://cdn.tailwindcss.com/"],
    );

    assert_eq!(lifecycle.install().await.unwrap(), 3);
    assert_eq!(store.entry_count("hidaya-cache-v2").unwrap(), 3);

    let key = CacheKey::new(Method::Get, "https://hidaya.app/index.html");
    let cached = store.get("hidaya-cache-v2", &key).unwrap().unwrap();
    assert_eq!(cached.response.body, b"<html>");
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing_on_network_failure() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitions::new());
    let fetch = Arc::new(FakeFetch::new());
    fetch.reply("https://hidaya.app/", 200, "<html>");
    fetch.fail("https://hidaya.app/index.html", "connection reset");

    let (lifecycle, _) = lifecycle(store.clone(), fetch, vec!["/", "/index.html"]);

    assert!(lifecycle.install().await.is_err());
    assert_eq!(store.entry_count("hidaya-cache-v2").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_install_rejects_non_success_entries() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitions::new());
    let fetch = Arc::new(FakeFetch::new());
    fetch.reply("https://hidaya.app/", 200, "<html>");
    fetch.reply("https://hidaya.app/missing.html", 404, "not found");

    let (lifecycle, _) = lifecycle(store.clone(), fetch, vec!["/", "/missing.html"]);

    let err = lifecycle.install().await.unwrap_err();
    assert!(err.to_string().contains("HTTP 404"));
    assert_eq!(store.entry_count("hidaya-cache-v2").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_install_without_origin_rejects_relative_entries() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitions::new());
    let events = EventBus::new(16);
    let lifecycle = Lifecycle::new(
      store,
      Arc::new(FakeFetch::new()),
      events,
      names(),
      None,
      vec!["/index.html".to_string()],
    );

    assert!(lifecycle.install().await.is_err());
  }

  #[tokio::test]
  async fn test_activate_prunes_stale_generations() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitions::new());
    let key = CacheKey::new(Method::Get, "https://hidaya.app/");
    let response = Response::new(200, "x");
    for partition in [
      "hidaya-cache-v1",
      "hidaya-data-v1",
      "hidaya-cache-v2",
      "hidaya-data-v2",
    ] {
      store.put(partition, &key, &response).unwrap();
    }

    let (lifecycle, events) = lifecycle(store.clone(), Arc::new(FakeFetch::new()), vec![]);
    let mut sub = events.subscribe();

    let pruned = lifecycle.activate().unwrap();
    assert_eq!(pruned, vec!["hidaya-cache-v1", "hidaya-data-v1"]);
    assert_eq!(
      store.partition_names().unwrap(),
      vec!["hidaya-cache-v2", "hidaya-data-v2"]
    );

    for expected in ["hidaya-cache-v1", "hidaya-data-v1"] {
      let event = sub.next().await.unwrap();
      assert_eq!(
        event,
        CacheEvent::PartitionRemoved {
          partition: expected.to_string(),
        }
      );
    }
  }

  #[tokio::test]
  async fn test_activate_with_clean_store_prunes_nothing() {
    let store: Arc<dyn PartitionStore> = Arc::new(MemoryPartitions::new());
    let key = CacheKey::new(Method::Get, "https://hidaya.app/");
    store.put("hidaya-cache-v2", &key, &Response::new(200, "x")).unwrap();

    let (lifecycle, _) = lifecycle(store.clone(), Arc::new(FakeFetch::new()), vec![]);
    assert!(lifecycle.activate().unwrap().is_empty());
    assert_eq!(store.partition_names().unwrap(), vec!["hidaya-cache-v2"]);
  }
}
