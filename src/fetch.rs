//! Network backend behind the cache dispatcher.
//!
//! The dispatcher never talks to the network directly; it goes through the
//! [`Fetch`] trait so tests can substitute scripted backends. The real
//! implementation wraps a shared `reqwest` client.

use std::future::Future;
use std::pin::Pin;

use color_eyre::{eyre::eyre, Result};

/// Request method. Only the verbs the content APIs actually use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
    }
  }
}

/// An outgoing request as the dispatcher sees it.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: String,
  /// JSON body for POST requests.
  pub body: Option<Vec<u8>>,
}

impl Request {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: Method::Get,
      url: url.into(),
      body: None,
    }
  }

  pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
    Self {
      method: Method::Post,
      url: url.into(),
      body: Some(body),
    }
  }
}

/// A response as stored in and served from the cache partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl Response {
  /// Response with the given status and no content type.
  #[allow(dead_code)]
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      content_type: None,
      body: body.into(),
    }
  }

  /// 2xx check. Non-2xx responses are returned to callers but never cached.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Network failure. Offline, DNS and timeout are indistinguishable here;
/// the message is whatever the transport reported. Clone-able so one
/// failure can fan out to every coalesced waiter.
#[derive(Debug, Clone)]
pub struct FetchError(pub String);

impl std::fmt::Display for FetchError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl std::error::Error for FetchError {}

impl FetchError {
  pub fn into_report(self) -> color_eyre::Report {
    eyre!("network fetch failed: {}", self.0)
  }
}

/// A boxed future resolving to a network result.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Response, FetchError>> + Send>>;

/// The seam between the dispatcher and the network.
pub trait Fetch: Send + Sync {
  fn fetch(&self, request: Request) -> FetchFuture;
}

/// reqwest-backed implementation used by the running application.
pub struct HttpFetch {
  client: reqwest::Client,
}

impl HttpFetch {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("hidaya/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Fetch for HttpFetch {
  fn fetch(&self, request: Request) -> FetchFuture {
    let client = self.client.clone();

    Box::pin(async move {
      let builder = match request.method {
        Method::Get => client.get(&request.url),
        Method::Post => {
          let mut b = client.post(&request.url);
          if let Some(body) = request.body {
            b = b
              .header(reqwest::header::CONTENT_TYPE, "application/json")
              .body(body);
          }
          b
        }
      };

      let response = builder
        .send()
        .await
        .map_err(|e| FetchError(e.to_string()))?;

      let status = response.status().as_u16();
      let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

      let body = response
        .bytes()
        .await
        .map_err(|e| FetchError(e.to_string()))?
        .to_vec();

      Ok(Response {
        status,
        content_type,
        body,
      })
    })
  }
}

/// Scripted backend for tests: per-URL plans plus call counting, so tests
/// can assert exactly how many network fetches a strategy performed.
#[cfg(test)]
pub struct FakeFetch {
  plans: std::sync::Mutex<std::collections::HashMap<String, FakePlan>>,
  calls: std::sync::Mutex<std::collections::HashMap<String, u32>>,
}

#[cfg(test)]
#[derive(Clone)]
pub enum FakePlan {
  /// Resolve immediately with this response.
  Reply(Response),
  /// Resolve with this response after a delay.
  ReplyAfter(std::time::Duration, Response),
  /// Fail with a network error.
  Fail(String),
  /// Never resolve.
  Hang,
}

#[cfg(test)]
impl FakeFetch {
  pub fn new() -> Self {
    Self {
      plans: std::sync::Mutex::new(std::collections::HashMap::new()),
      calls: std::sync::Mutex::new(std::collections::HashMap::new()),
    }
  }

  pub fn plan(&self, url: &str, plan: FakePlan) {
    self.plans.lock().unwrap().insert(url.to_string(), plan);
  }

  pub fn reply(&self, url: &str, status: u16, body: &str) {
    self.plan(url, FakePlan::Reply(Response::new(status, body)));
  }

  pub fn fail(&self, url: &str, message: &str) {
    self.plan(url, FakePlan::Fail(message.to_string()));
  }

  pub fn hang(&self, url: &str) {
    self.plan(url, FakePlan::Hang);
  }

  /// How many fetches were issued for this URL (issued, not resolved).
  pub fn calls(&self, url: &str) -> u32 {
    *self.calls.lock().unwrap().get(url).unwrap_or(&0)
  }
}

#[cfg(test)]
impl Fetch for FakeFetch {
  fn fetch(&self, request: Request) -> FetchFuture {
    let plan = self.plans.lock().unwrap().get(&request.url).cloned();
    *self
      .calls
      .lock()
      .unwrap()
      .entry(request.url.clone())
      .or_insert(0) += 1;

    Box::pin(async move {
      match plan {
        Some(FakePlan::Reply(response)) => Ok(response),
        Some(FakePlan::ReplyAfter(delay, response)) => {
          tokio::time::sleep(delay).await;
          Ok(response)
        }
        Some(FakePlan::Fail(message)) => Err(FetchError(message)),
        Some(FakePlan::Hang) => futures::future::pending().await,
        None => Err(FetchError(format!("no fake plan for {}", request.url))),
      }
    })
  }
}
