//! Request classification.
//!
//! Every intercepted request maps to exactly one caching strategy. Rules
//! are evaluated in a fixed priority order, first match wins:
//!
//! 1. devotional-content API hosts -> stale-while-revalidate, data partition
//! 2. third-party library/font/CDN hosts -> cache-first, shell partition
//! 3. shell-origin document/code/style paths -> configurable (network-first
//!    by default), shell partition
//! 4. everything else -> pass-through
//!
//! Non-GET methods and non-HTTP(S) schemes are never cached and always
//! classify as pass-through.

use url::Url;

use crate::fetch::{Method, Request};

/// How the dispatcher serves a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Serve from cache; fetch and store only on a miss.
  CacheFirst,
  /// Fetch first; fall back to cache when the network fails.
  NetworkFirst,
  /// Serve from cache immediately and refresh it in the background.
  StaleWhileRevalidate,
  /// Straight to the network, no cache involvement.
  PassThrough,
}

/// Which named partition a strategy reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
  Shell,
  Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub strategy: Strategy,
  pub partition: Option<PartitionKind>,
}

impl Route {
  pub const PASS_THROUGH: Route = Route {
    strategy: Strategy::PassThrough,
    partition: None,
  };
}

/// Ordered classification rules.
pub struct RouteTable {
  api_hosts: Vec<String>,
  asset_hosts: Vec<String>,
  shell_origin: Option<Url>,
  shell_strategy: Strategy,
}

impl RouteTable {
  pub fn new(
    api_hosts: Vec<String>,
    asset_hosts: Vec<String>,
    shell_origin: Option<Url>,
    shell_strategy: Strategy,
  ) -> Self {
    Self {
      api_hosts,
      asset_hosts,
      shell_origin,
      shell_strategy,
    }
  }

  pub fn classify(&self, request: &Request) -> Route {
    if request.method != Method::Get {
      return Route::PASS_THROUGH;
    }

    let Ok(url) = Url::parse(&request.url) else {
      return Route::PASS_THROUGH;
    };

    if url.scheme() != "http" && url.scheme() != "https" {
      return Route::PASS_THROUGH;
    }

    let host = url.host_str().unwrap_or("");

    if self.api_hosts.iter().any(|h| host_matches(host, h)) {
      return Route {
        strategy: Strategy::StaleWhileRevalidate,
        partition: Some(PartitionKind::Data),
      };
    }

    if self.asset_hosts.iter().any(|h| host_matches(host, h)) {
      return Route {
        strategy: Strategy::CacheFirst,
        partition: Some(PartitionKind::Shell),
      };
    }

    if let Some(origin) = &self.shell_origin {
      if same_origin(&url, origin) && is_shell_path(url.path()) {
        return Route {
          strategy: self.shell_strategy,
          partition: Some(PartitionKind::Shell),
        };
      }
    }

    Route::PASS_THROUGH
  }
}

/// Exact host or a subdomain of it.
fn host_matches(host: &str, rule: &str) -> bool {
  host == rule
    || (host.len() > rule.len()
      && host.ends_with(rule)
      && host.as_bytes()[host.len() - rule.len() - 1] == b'.')
}

fn same_origin(url: &Url, origin: &Url) -> bool {
  url.scheme() == origin.scheme()
    && url.host_str() == origin.host_str()
    && url.port_or_known_default() == origin.port_or_known_default()
}

/// Document, code, style and manifest paths that make up the app shell.
const SHELL_EXTENSIONS: &[&str] = &["html", "js", "css", "json", "wasm"];

fn is_shell_path(path: &str) -> bool {
  if path == "/" {
    return true;
  }
  match path.rsplit_once('.') {
    Some((_, ext)) => SHELL_EXTENSIONS.contains(&ext),
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn table() -> RouteTable {
    RouteTable::new(
      vec![
        "api.quran.com".to_string(),
        "api.aladhan.com".to_string(),
        "quranenc.com".to_string(),
      ],
      vec![
        "esm.sh".to_string(),
        "cdn.tailwindcss.com".to_string(),
        "fonts.googleapis.com".to_string(),
        "fonts.gstatic.com".to_string(),
        "unpkg.com".to_string(),
      ],
      Some(Url::parse("https://hidaya.app").unwrap()),
      Strategy::NetworkFirst,
    )
  }

  fn get(url: &str) -> Request {
    Request::get(url)
  }

  #[test]
  fn test_api_host_is_stale_while_revalidate() {
    let route = table().classify(&get("https://api.aladhan.com/v1/timings?latitude=1&longitude=2"));
    assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);
    assert_eq!(route.partition, Some(PartitionKind::Data));
  }

  #[test]
  fn test_api_subdomain_matches() {
    let route = table().classify(&get("https://quranenc.com/api/v1/translation/sura/english_saheeh/1"));
    assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);

    let route = table().classify(&get("https://www.quranenc.com/api/v1/translation/sura/english_saheeh/1"));
    assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);
  }

  #[test]
  fn test_host_suffix_without_dot_does_not_match() {
    // "notquranenc.com" must not match the "quranenc.com" rule.
    let route = table().classify(&get("https://notquranenc.com/api"));
    assert_eq!(route, Route::PASS_THROUGH);
  }

  #[test]
  fn test_asset_host_is_cache_first() {
    let route = table().classify(&get("https://fonts.googleapis.com/css2?family=Amiri"));
    assert_eq!(route.strategy, Strategy::CacheFirst);
    assert_eq!(route.partition, Some(PartitionKind::Shell));

    let route = table().classify(&get("https://unpkg.com/leaflet@1.9.4/dist/leaflet.css"));
    assert_eq!(route.strategy, Strategy::CacheFirst);
  }

  #[test]
  fn test_api_rule_wins_over_asset_rule() {
    let table = RouteTable::new(
      vec!["both.example".to_string()],
      vec!["both.example".to_string()],
      None,
      Strategy::NetworkFirst,
    );
    let route = table.classify(&get("https://both.example/x"));
    assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);
  }

  #[test]
  fn test_shell_paths_use_shell_strategy() {
    let t = table();
    for url in [
      "https://hidaya.app/",
      "https://hidaya.app/index.html",
      "https://hidaya.app/assets/app.js",
      "https://hidaya.app/styles.min.css",
      "https://hidaya.app/manifest.json",
    ] {
      let route = t.classify(&get(url));
      assert_eq!(route.strategy, Strategy::NetworkFirst, "{}", url);
      assert_eq!(route.partition, Some(PartitionKind::Shell), "{}", url);
    }
  }

  #[test]
  fn test_shell_strategy_is_configurable() {
    let t = RouteTable::new(
      Vec::new(),
      Vec::new(),
      Some(Url::parse("https://hidaya.app").unwrap()),
      Strategy::StaleWhileRevalidate,
    );
    let route = t.classify(&get("https://hidaya.app/index.html"));
    assert_eq!(route.strategy, Strategy::StaleWhileRevalidate);
  }

  #[test]
  fn test_foreign_origin_shell_path_passes_through() {
    let route = table().classify(&get("https://other.example/index.html"));
    assert_eq!(route, Route::PASS_THROUGH);
  }

  #[test]
  fn test_same_origin_non_shell_path_passes_through() {
    let route = table().classify(&get("https://hidaya.app/media/recitation.mp3"));
    assert_eq!(route, Route::PASS_THROUGH);

    let route = table().classify(&get("https://hidaya.app/about"));
    assert_eq!(route, Route::PASS_THROUGH);
  }

  #[test]
  fn test_post_is_never_cached() {
    let request = Request::post("https://api.aladhan.com/v1/timings", Vec::new());
    assert_eq!(table().classify(&request), Route::PASS_THROUGH);
  }

  #[test]
  fn test_non_http_scheme_passes_through() {
    let route = table().classify(&get("data:text/plain,hello"));
    assert_eq!(route, Route::PASS_THROUGH);
  }

  #[test]
  fn test_unmatched_request_passes_through() {
    let route = table().classify(&get("https://nominatim.openstreetmap.org/search?q=mecca"));
    assert_eq!(route, Route::PASS_THROUGH);
  }
}
