use crate::cache::{Dispatcher, ResponseSource};
use crate::config::{AssistantConfig, Config, ContentConfig};
use crate::content::api_types::{
  ApiChaptersResponse, ApiGenerateContentResponse, ApiPlace, ApiReverseGeocode,
  ApiTimingsResponse, ApiTranslationResponse, ApiVersesResponse,
};
use crate::content::types::{Chapter, Place, PrayerDay, TranslatedVerse, Verse};
use crate::fetch::Request;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const VERSES_PER_PAGE: u32 = 50;

/// Client for the upstream content APIs.
///
/// Every request goes through the cache dispatcher, so routed hosts keep
/// answering from cache when the network is gone.
pub struct ContentClient {
  dispatcher: Arc<Dispatcher>,
  content: ContentConfig,
  assistant: AssistantConfig,
}

impl ContentClient {
  pub fn new(dispatcher: Arc<Dispatcher>, config: &Config) -> Self {
    Self {
      dispatcher,
      content: config.content.clone(),
      assistant: config.assistant.clone(),
    }
  }

  /// Get prayer times for a coordinate
  pub async fn timings(&self, latitude: f64, longitude: f64, method: u8) -> Result<PrayerDay> {
    let url = format!(
      "{}/v1/timings?latitude={}&longitude={}&method={}",
      self.content.aladhan_base, latitude, longitude, method
    );
    let response: ApiTimingsResponse = self.get_json(url, "prayer times").await?;
    Ok(response.into_day())
  }

  /// Get metadata for all chapters
  pub async fn chapters(&self, language: &str) -> Result<Vec<Chapter>> {
    let url = format!(
      "{}/api/v4/chapters?language={}",
      self.content.quran_base, language
    );
    let response: ApiChaptersResponse = self.get_json(url, "chapters").await?;
    Ok(response.chapters.into_iter().map(Chapter::from).collect())
  }

  /// Get a chapter's verses in the Uthmani script
  pub async fn verses(&self, chapter: u32) -> Result<Vec<Verse>> {
    let mut all_verses = Vec::new();
    let mut page = 1u32;

    loop {
      let url = format!(
        "{}/api/v4/verses/by_chapter/{}?fields=text_uthmani&per_page={}&page={}",
        self.content.quran_base, chapter, VERSES_PER_PAGE, page
      );
      let response: ApiVersesResponse = self.get_json(url, "verses").await?;
      all_verses.extend(response.verses.into_iter().map(Verse::from));

      match response.pagination.next_page {
        Some(next) => page = next,
        None => break,
      }
    }

    Ok(all_verses)
  }

  /// Get a chapter's translation
  pub async fn translation(&self, key: &str, chapter: u32) -> Result<Vec<TranslatedVerse>> {
    let url = format!(
      "{}/api/v1/translation/sura/{}/{}",
      self.content.quranenc_base, key, chapter
    );
    let response: ApiTranslationResponse = self.get_json(url, "translation").await?;
    Ok(
      response
        .result
        .into_iter()
        .map(TranslatedVerse::from)
        .collect(),
    )
  }

  /// Resolve a coordinate to a human-readable place name
  pub async fn reverse_geocode(
    &self,
    latitude: f64,
    longitude: f64,
    language: &str,
  ) -> Result<String> {
    let url = format!(
      "{}/data/reverse-geocode-client?latitude={}&longitude={}&localityLanguage={}",
      self.content.geocode_base, latitude, longitude, language
    );
    let response: ApiReverseGeocode = self.get_json(url, "reverse geocode").await?;
    Ok(response.place_name())
  }

  /// Search for a place by free-form name
  pub async fn search_place(&self, query: &str, language: &str) -> Result<Place> {
    let mut url = Url::parse(&format!("{}/search", self.content.nominatim_base))
      .map_err(|e| eyre!("Failed to build place search URL: {}", e))?;
    url
      .query_pairs_mut()
      .append_pair("q", query)
      .append_pair("format", "json")
      .append_pair("limit", "1")
      .append_pair("accept-language", language);

    let places: Vec<ApiPlace> = self.get_json(String::from(url), "place search").await?;
    places
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("No results for place '{}'", query))?
      .into_place()
  }

  /// Ask the assistant a question
  pub async fn ask(&self, question: &str, language: &str) -> Result<String> {
    let key = Config::assistant_key()?;
    let url = format!(
      "{}/v1beta/models/{}:generateContent?key={}",
      self.assistant.base, self.assistant.model, key
    );

    let body = serde_json::json!({
      "contents": [{"parts": [{"text": question}]}],
      "systemInstruction": {"parts": [{"text": system_instruction(language)}]}
    });
    let body =
      serde_json::to_vec(&body).map_err(|e| eyre!("Failed to encode assistant request: {}", e))?;

    // POST requests route as pass-through; the keyed URL never reaches disk.
    let dispatched = self.dispatcher.dispatch(Request::post(url, body)).await?;
    if !dispatched.response.is_success() {
      return Err(eyre!(
        "Failed to ask assistant: HTTP {}",
        dispatched.response.status
      ));
    }

    let response: ApiGenerateContentResponse = serde_json::from_slice(&dispatched.response.body)
      .map_err(|e| eyre!("Failed to parse assistant response: {}", e))?;
    response
      .into_answer()
      .ok_or_else(|| eyre!("Assistant returned no answer"))
  }

  async fn get_json<T: DeserializeOwned>(&self, url: String, what: &str) -> Result<T> {
    let dispatched = self.dispatcher.dispatch(Request::get(url)).await?;
    if dispatched.source == ResponseSource::Offline {
      debug!(resource = what, "network unreachable, using the cached copy");
    }
    if !dispatched.response.is_success() {
      return Err(eyre!(
        "Failed to fetch {}: HTTP {}",
        what,
        dispatched.response.status
      ));
    }
    serde_json::from_slice(&dispatched.response.body)
      .map_err(|e| eyre!("Failed to parse {}: {}", what, e))
  }
}

/// System prompt for the assistant, phrased for the user's content language
fn system_instruction(language: &str) -> String {
  let reply_language = if language.starts_with("ar") {
    "Arabic"
  } else {
    "English"
  };
  format!(
    "You are a knowledgeable and respectful Islamic assistant. Answer questions \
     about Islam based on the Quran and authentic Sunnah, citing sources where \
     possible. Politely decline questions unrelated to Islam. Reply in {}.",
    reply_language
  )
}
