//! Cache entry keys.
//!
//! A key is the request method plus the absolute URL, digested to a stable
//! fixed-length hex string for storage. URLs are normalized first so that
//! logically-equivalent requests whose query parameters merely arrive in a
//! different order collapse to a single cache entry. The raw URL travels
//! alongside the digest for the network leg and for debugging columns.

use sha2::{Digest, Sha256};
use url::Url;

use crate::fetch::{Method, Request};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
  method: Method,
  url: String,
  digest: String,
}

impl CacheKey {
  pub fn new(method: Method, url: &str) -> Self {
    let normalized = normalize_url(url);

    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    let digest = hex::encode(hasher.finalize());

    Self {
      method,
      url: url.to_string(),
      digest,
    }
  }

  pub fn for_request(request: &Request) -> Self {
    Self::new(request.method, &request.url)
  }

  pub fn method(&self) -> Method {
    self.method
  }

  /// The raw URL as issued, not the normalized form.
  pub fn url(&self) -> &str {
    &self.url
  }

  /// Stable hex digest used as the storage key.
  pub fn digest(&self) -> &str {
    &self.digest
  }
}

/// Sort query pairs and drop fragments. Unparseable input is keyed as-is;
/// such requests never reach a caching strategy anyway.
fn normalize_url(raw: &str) -> String {
  let Ok(mut url) = Url::parse(raw) else {
    return raw.to_string();
  };

  url.set_fragment(None);

  let mut pairs: Vec<(String, String)> = url
    .query_pairs()
    .map(|(k, v)| (k.into_owned(), v.into_owned()))
    .collect();

  if pairs.is_empty() {
    // Strip a bare trailing '?'.
    url.set_query(None);
    return url.to_string();
  }

  pairs.sort();
  url
    .query_pairs_mut()
    .clear()
    .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

  url.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_query_order_does_not_matter() {
    let a = CacheKey::new(Method::Get, "https://api.aladhan.com/v1/timings?latitude=21.4&longitude=39.8&method=4");
    let b = CacheKey::new(Method::Get, "https://api.aladhan.com/v1/timings?method=4&latitude=21.4&longitude=39.8");
    assert_eq!(a.digest(), b.digest());
  }

  #[test]
  fn test_different_query_values_differ() {
    let a = CacheKey::new(Method::Get, "https://api.quran.com/api/v4/chapters?language=en");
    let b = CacheKey::new(Method::Get, "https://api.quran.com/api/v4/chapters?language=ar");
    assert_ne!(a.digest(), b.digest());
  }

  #[test]
  fn test_method_is_part_of_the_key() {
    let get = CacheKey::new(Method::Get, "https://example.com/a");
    let post = CacheKey::new(Method::Post, "https://example.com/a");
    assert_ne!(get.digest(), post.digest());
  }

  #[test]
  fn test_fragment_is_ignored() {
    let a = CacheKey::new(Method::Get, "https://example.com/page#top");
    let b = CacheKey::new(Method::Get, "https://example.com/page");
    assert_eq!(a.digest(), b.digest());
  }

  #[test]
  fn test_unparseable_url_still_keys() {
    let key = CacheKey::new(Method::Get, "not a url");
    assert_eq!(key.url(), "not a url");
    assert_eq!(key.digest().len(), 64);
  }

  #[test]
  fn test_raw_url_preserved() {
    let raw = "https://api.aladhan.com/v1/timings?method=4&latitude=21.4";
    let key = CacheKey::new(Method::Get, raw);
    assert_eq!(key.url(), raw);
  }
}
