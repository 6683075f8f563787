//! Strategy execution over the two cache partitions.
//!
//! Every content request goes through [`Dispatcher::dispatch`]. The route
//! table picks a strategy, the flight group collapses duplicate fetches,
//! and successful responses are written through to the owning partition.
//! Cache write failures are logged and swallowed; a bad disk never takes
//! down a request that already has a response.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use super::flight::FlightGroup;
use super::key::CacheKey;
use super::routes::{PartitionKind, RouteTable, Strategy};
use super::traits::{CacheEvent, Partition, ResponseSource};
use crate::bus::{EventBus, Subscription};
use crate::fetch::{Fetch, FetchError, Request, Response};

const EVENT_CAPACITY: usize = 64;

/// A dispatched response plus where it came from.
#[derive(Debug, Clone)]
pub struct Dispatched {
  pub response: Response,
  pub source: ResponseSource,
}

pub struct Dispatcher {
  routes: RouteTable,
  shell: Partition,
  data: Partition,
  fetcher: Arc<dyn Fetch>,
  flight: Arc<FlightGroup>,
  events: EventBus<CacheEvent>,
}

impl Dispatcher {
  pub fn new(
    routes: RouteTable,
    shell: Partition,
    data: Partition,
    fetcher: Arc<dyn Fetch>,
  ) -> Self {
    Self {
      routes,
      shell,
      data,
      fetcher,
      flight: Arc::new(FlightGroup::new()),
      events: EventBus::new(EVENT_CAPACITY),
    }
  }

  /// Subscribe to cache notifications. Dropping the subscription
  /// unsubscribes.
  pub fn subscribe(&self) -> Subscription<CacheEvent> {
    self.events.subscribe()
  }

  /// A handle to the bus this dispatcher publishes on, so the lifecycle
  /// can emit its events to the same subscribers.
  pub fn event_bus(&self) -> EventBus<CacheEvent> {
    self.events.clone()
  }

  /// The shell partition handle.
  #[allow(dead_code)]
  pub fn shell(&self) -> &Partition {
    &self.shell
  }

  /// The data partition handle.
  #[allow(dead_code)]
  pub fn data(&self) -> &Partition {
    &self.data
  }

  /// Route a request through its caching strategy.
  pub async fn dispatch(&self, request: Request) -> Result<Dispatched> {
    let route = self.routes.classify(&request);

    let partition = match route.partition {
      Some(PartitionKind::Shell) => self.shell.clone(),
      Some(PartitionKind::Data) => self.data.clone(),
      None => return self.pass_through(request).await,
    };

    let key = CacheKey::for_request(&request);

    match route.strategy {
      Strategy::CacheFirst => self.cache_first(key, request, partition).await,
      Strategy::NetworkFirst => self.network_first(key, request, partition).await,
      Strategy::StaleWhileRevalidate => {
        self.stale_while_revalidate(key, request, partition).await
      }
      Strategy::PassThrough => self.pass_through(request).await,
    }
  }

  /// Straight to the network: no cache read, no cache write, no
  /// coalescing.
  async fn pass_through(&self, request: Request) -> Result<Dispatched> {
    let response = self
      .fetcher
      .fetch(request)
      .await
      .map_err(FetchError::into_report)?;

    Ok(Dispatched {
      response,
      source: ResponseSource::Network,
    })
  }

  async fn cache_first(
    &self,
    key: CacheKey,
    request: Request,
    partition: Partition,
  ) -> Result<Dispatched> {
    if let Some(cached) = partition.get(&key)? {
      debug!(url = %request.url, partition = partition.name(), "cache hit");
      return Ok(Dispatched {
        response: cached.response,
        source: ResponseSource::Cache,
      });
    }

    let (result, leader) = self.coalesced_fetch(&key, &request).await?;
    let response = result.map_err(FetchError::into_report)?;

    if leader {
      store_success(&partition, &self.events, &key, &response);
    }

    Ok(Dispatched {
      response,
      source: ResponseSource::Network,
    })
  }

  async fn network_first(
    &self,
    key: CacheKey,
    request: Request,
    partition: Partition,
  ) -> Result<Dispatched> {
    let (result, leader) = self.coalesced_fetch(&key, &request).await?;

    match result {
      Ok(response) => {
        if leader {
          store_success(&partition, &self.events, &key, &response);
        }
        Ok(Dispatched {
          response,
          source: ResponseSource::Network,
        })
      }
      Err(e) => {
        // Only transport failures fall back; a resolved non-2xx response
        // is returned to the caller above.
        if let Some(cached) = partition.get(&key)? {
          warn!(
            url = %request.url,
            error = %e,
            stored_at = %cached.stored_at,
            "network failed, serving cached copy"
          );
          Ok(Dispatched {
            response: cached.response,
            source: ResponseSource::Offline,
          })
        } else {
          Err(e.into_report())
        }
      }
    }
  }

  async fn stale_while_revalidate(
    &self,
    key: CacheKey,
    request: Request,
    partition: Partition,
  ) -> Result<Dispatched> {
    if let Some(cached) = partition.get(&key)? {
      debug!(url = %request.url, partition = partition.name(), "serving stale, revalidating");
      self.spawn_revalidate(key, request, partition);
      return Ok(Dispatched {
        response: cached.response,
        source: ResponseSource::Cache,
      });
    }

    // First sight of this URL: block on the network.
    let (result, leader) = self.coalesced_fetch(&key, &request).await?;
    let response = result.map_err(FetchError::into_report)?;

    if leader {
      store_success(&partition, &self.events, &key, &response);
    }

    Ok(Dispatched {
      response,
      source: ResponseSource::Network,
    })
  }

  async fn coalesced_fetch(
    &self,
    key: &CacheKey,
    request: &Request,
  ) -> Result<(Result<Response, FetchError>, bool)> {
    let fetcher = self.fetcher.clone();
    let request = request.clone();
    self
      .flight
      .run(key.digest(), move || fetcher.fetch(request))
      .await
  }

  /// Refresh a cached entry in the background. Failures are logged and
  /// dropped; the caller already has a response.
  fn spawn_revalidate(&self, key: CacheKey, request: Request, partition: Partition) {
    let fetcher = self.fetcher.clone();
    let flight = self.flight.clone();
    let events = self.events.clone();

    tokio::spawn(async move {
      let outcome = flight
        .run(key.digest(), move || fetcher.fetch(request))
        .await;

      let (result, leader) = match outcome {
        Ok(pair) => pair,
        Err(e) => {
          warn!(error = %e, "revalidation flight failed");
          return;
        }
      };

      match result {
        Ok(response) => {
          if leader {
            store_success(&partition, &events, &key, &response);
          }
        }
        Err(e) => debug!(url = key.url(), error = %e, "background revalidation failed"),
      }
    });
  }
}

/// Write-through for successful responses. Non-2xx responses are returned
/// to callers but never cached; a failed write never fails the request.
fn store_success(
  partition: &Partition,
  events: &EventBus<CacheEvent>,
  key: &CacheKey,
  response: &Response,
) {
  if !response.is_success() {
    return;
  }

  match partition.put(key, response) {
    Ok(()) => events.publish(CacheEvent::PartitionUpdated {
      partition: partition.name().to_string(),
      url: key.url().to_string(),
    }),
    Err(e) => warn!(url = key.url(), error = %e, "Failed to cache response"),
  }
}
