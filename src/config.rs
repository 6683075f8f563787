use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration. Every field has a default, so running with
/// no config file at all works.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub cache: CacheConfig,
  pub content: ContentConfig,
  pub assistant: AssistantConfig,
  pub location: LocationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Disable to run with no persistent cache at all.
  pub enabled: bool,
  /// Partition name prefix.
  pub slug: String,
  /// Cache generation. Bumping it obsoletes existing partitions on the
  /// next activate.
  pub generation: u32,
  /// Origin the app shell is served from.
  pub shell_origin: Option<String>,
  /// Strategy for shell-origin requests.
  pub shell_strategy: ShellStrategy,
  /// Assets written into the shell partition by `offline install`.
  pub precache: Vec<String>,
  /// Hosts cached stale-while-revalidate into the data partition.
  pub api_hosts: Vec<String>,
  /// Hosts cached cache-first into the shell partition.
  pub asset_hosts: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      slug: "hidaya".to_string(),
      generation: 2,
      shell_origin: Some("https://hidaya.app".to_string()),
      shell_strategy: ShellStrategy::NetworkFirst,
      precache: vec![
        "/".to_string(),
        "/index.html".to_string(),
        "/manifest.json".to_string(),
        "https://cdn.tailwindcss.com".to_string(),
        "https://fonts.googleapis.com/css2?family=Amiri:wght@400;700&display=swap".to_string(),
        "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css".to_string(),
      ],
      api_hosts: vec![
        "api.quran.com".to_string(),
        "api.aladhan.com".to_string(),
        "quranenc.com".to_string(),
      ],
      asset_hosts: vec![
        "esm.sh".to_string(),
        "cdn.tailwindcss.com".to_string(),
        "fonts.googleapis.com".to_string(),
        "fonts.gstatic.com".to_string(),
        "unpkg.com".to_string(),
      ],
    }
  }
}

impl CacheConfig {
  pub fn shell_partition(&self) -> String {
    format!("{}-cache-v{}", self.slug, self.generation)
  }

  pub fn data_partition(&self) -> String {
    format!("{}-data-v{}", self.slug, self.generation)
  }
}

/// Strategy for shell-origin requests. The data partition is always
/// stale-while-revalidate; only the shell side is configurable.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ShellStrategy {
  /// Always try the network, fall back to cache when offline.
  #[default]
  NetworkFirst,
  /// Serve cached immediately and refresh in the background.
  StaleWhileRevalidate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
  /// Prayer times API.
  pub aladhan_base: String,
  /// Quran text and chapter metadata API.
  pub quran_base: String,
  /// Translation API.
  pub quranenc_base: String,
  /// Reverse geocoding API.
  pub geocode_base: String,
  /// Free-form place search API.
  pub nominatim_base: String,
  /// Default content language when no preference is stored.
  pub language: String,
}

impl Default for ContentConfig {
  fn default() -> Self {
    Self {
      aladhan_base: "https://api.aladhan.com".to_string(),
      quran_base: "https://api.quran.com".to_string(),
      quranenc_base: "https://quranenc.com".to_string(),
      geocode_base: "https://api.bigdatacloud.net".to_string(),
      nominatim_base: "https://nominatim.openstreetmap.org".to_string(),
      language: "ar".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
  pub base: String,
  pub model: String,
}

impl Default for AssistantConfig {
  fn default() -> Self {
    Self {
      base: "https://generativelanguage.googleapis.com".to_string(),
      model: "gemini-2.5-flash".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
  pub latitude: f64,
  pub longitude: f64,
  /// Aladhan calculation method (4 = Umm al-Qura).
  pub method: u8,
}

impl Default for LocationConfig {
  fn default() -> Self {
    // Mecca
    Self {
      latitude: 21.4225,
      longitude: 39.8262,
      method: 4,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hidaya.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hidaya/config.yaml
  /// 4. ~/.config/hidaya/config.yaml
  ///
  /// No file anywhere means defaults.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("hidaya.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hidaya").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the assistant API key from environment variables.
  ///
  /// Checks HIDAYA_AI_KEY first, then GEMINI_API_KEY as fallback.
  pub fn assistant_key() -> Result<String> {
    std::env::var("HIDAYA_AI_KEY")
      .or_else(|_| std::env::var("GEMINI_API_KEY"))
      .map_err(|_| {
        eyre!(
          "Assistant API key not found. Set HIDAYA_AI_KEY or GEMINI_API_KEY environment variable."
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert!(config.cache.enabled);
    assert_eq!(config.cache.shell_partition(), "hidaya-cache-v2");
    assert_eq!(config.cache.data_partition(), "hidaya-data-v2");
    assert_eq!(config.cache.shell_strategy, ShellStrategy::NetworkFirst);
    assert_eq!(config.content.language, "ar");
    assert_eq!(config.location.method, 4);
    assert_eq!(config.assistant.model, "gemini-2.5-flash");
  }

  #[test]
  fn test_partial_yaml_keeps_defaults_elsewhere() {
    let config: Config = serde_yaml::from_str(
      r#"
cache:
  generation: 3
  shell_strategy: stale-while-revalidate
content:
  language: en
"#,
    )
    .unwrap();

    assert_eq!(config.cache.generation, 3);
    assert_eq!(config.cache.shell_partition(), "hidaya-cache-v3");
    assert_eq!(
      config.cache.shell_strategy,
      ShellStrategy::StaleWhileRevalidate
    );
    assert_eq!(config.content.language, "en");
    // Untouched sections keep their defaults.
    assert_eq!(config.cache.slug, "hidaya");
    assert_eq!(config.location.method, 4);
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hidaya.yaml");
    std::fs::write(&path, "location:\n  latitude: 30.0\n  longitude: 31.2\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.location.latitude, 30.0);
    assert_eq!(config.location.longitude, 31.2);
    // Defaulted.
    assert_eq!(config.location.method, 4);
  }

  #[test]
  fn test_load_missing_explicit_path_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    assert!(Config::load(Some(&missing)).is_err());
  }
}
