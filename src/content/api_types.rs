//! Serde-deserializable types matching upstream API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;

use super::types::{Chapter, Place, PrayerDay, PrayerTimes, TranslatedVerse, Verse};

// ============================================================================
// Aladhan timings endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTimingsResponse {
  pub data: ApiTimingsData,
}

#[derive(Debug, Deserialize)]
pub struct ApiTimingsData {
  pub timings: ApiTimings,
  pub date: ApiDate,
}

/// Aladhan capitalizes timing keys after the prayer names.
#[derive(Debug, Deserialize)]
pub struct ApiTimings {
  #[serde(rename = "Fajr")]
  pub fajr: String,
  #[serde(rename = "Sunrise")]
  pub sunrise: String,
  #[serde(rename = "Dhuhr")]
  pub dhuhr: String,
  #[serde(rename = "Asr")]
  pub asr: String,
  #[serde(rename = "Sunset")]
  pub sunset: String,
  #[serde(rename = "Maghrib")]
  pub maghrib: String,
  #[serde(rename = "Isha")]
  pub isha: String,
  #[serde(rename = "Imsak")]
  pub imsak: String,
  #[serde(rename = "Midnight")]
  pub midnight: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiDate {
  pub readable: String,
  pub hijri: ApiHijriDate,
}

#[derive(Debug, Deserialize)]
pub struct ApiHijriDate {
  /// Numeric "DD-MM-YYYY" form, used when the month object is missing.
  pub date: String,
  #[serde(default)]
  pub day: String,
  pub month: Option<ApiHijriMonth>,
  #[serde(default)]
  pub year: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiHijriMonth {
  pub ar: String,
}

// ============================================================================
// Quran.com chapters endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiChaptersResponse {
  pub chapters: Vec<ApiChapter>,
}

#[derive(Debug, Deserialize)]
pub struct ApiChapter {
  pub id: u32,
  pub name_arabic: String,
  pub name_simple: String,
  pub verses_count: u32,
  #[serde(default)]
  pub revelation_place: String,
  pub translated_name: ApiTranslatedName,
}

#[derive(Debug, Deserialize)]
pub struct ApiTranslatedName {
  pub name: String,
}

// ============================================================================
// Quran.com verses endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiVersesResponse {
  pub verses: Vec<ApiVerse>,
  pub pagination: ApiPagination,
}

#[derive(Debug, Deserialize)]
pub struct ApiVerse {
  pub verse_key: String,
  #[serde(default)]
  pub text_uthmani: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPagination {
  pub next_page: Option<u32>,
}

// ============================================================================
// QuranEnc translation endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiTranslationResponse {
  pub result: Vec<ApiTranslatedAyah>,
}

/// QuranEnc sends verse numbers as strings.
#[derive(Debug, Deserialize)]
pub struct ApiTranslatedAyah {
  pub aya: String,
  pub translation: String,
}

// ============================================================================
// BigDataCloud reverse geocode endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiReverseGeocode {
  #[serde(default)]
  pub city: String,
  #[serde(default)]
  pub locality: String,
  #[serde(rename = "principalSubdivision", default)]
  pub principal_subdivision: String,
  #[serde(rename = "countryName", default)]
  pub country_name: String,
}

// ============================================================================
// Nominatim place search endpoint response
// ============================================================================

/// Nominatim returns a bare JSON array of these.
#[derive(Debug, Deserialize)]
pub struct ApiPlace {
  pub lat: String,
  pub lon: String,
  pub display_name: String,
}

// ============================================================================
// Gemini generateContent endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiGenerateContentResponse {
  #[serde(default)]
  pub candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCandidate {
  pub content: Option<ApiCandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCandidateContent {
  #[serde(default)]
  pub parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPart {
  #[serde(default)]
  pub text: String,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiTimingsResponse {
  pub fn into_day(self) -> PrayerDay {
    let hijri = &self.data.date.hijri;
    let hijri_date = match &hijri.month {
      Some(month) => format!("{} {} {}", hijri.day, month.ar, hijri.year),
      None => hijri.date.clone(),
    };
    PrayerDay {
      readable_date: self.data.date.readable,
      hijri_date,
      times: self.data.timings.into(),
    }
  }
}

impl From<ApiTimings> for PrayerTimes {
  fn from(api: ApiTimings) -> Self {
    PrayerTimes {
      fajr: api.fajr,
      sunrise: api.sunrise,
      dhuhr: api.dhuhr,
      asr: api.asr,
      sunset: api.sunset,
      maghrib: api.maghrib,
      isha: api.isha,
      imsak: api.imsak,
      midnight: api.midnight,
    }
  }
}

impl From<ApiChapter> for Chapter {
  fn from(api: ApiChapter) -> Self {
    Chapter {
      id: api.id,
      name_arabic: api.name_arabic,
      name_simple: api.name_simple,
      translated_name: api.translated_name.name,
      verses_count: api.verses_count,
      revelation_place: api.revelation_place,
    }
  }
}

impl From<ApiVerse> for Verse {
  fn from(api: ApiVerse) -> Self {
    Verse {
      key: api.verse_key,
      text: api.text_uthmani,
    }
  }
}

impl From<ApiTranslatedAyah> for TranslatedVerse {
  fn from(api: ApiTranslatedAyah) -> Self {
    TranslatedVerse {
      aya: api.aya.parse().unwrap_or(0),
      text: api.translation,
    }
  }
}

impl ApiReverseGeocode {
  /// Human-readable place name, preferring the most specific field present.
  pub fn place_name(&self) -> String {
    let local = [&self.city, &self.locality, &self.principal_subdivision]
      .into_iter()
      .find(|s| !s.is_empty());
    match (local, self.country_name.is_empty()) {
      (Some(local), false) => format!("{}, {}", local, self.country_name),
      (Some(local), true) => local.clone(),
      (None, false) => self.country_name.clone(),
      (None, true) => "Unknown location".to_string(),
    }
  }
}

impl ApiPlace {
  pub fn into_place(self) -> Result<Place> {
    let latitude = self
      .lat
      .parse()
      .map_err(|e| eyre!("Failed to parse place latitude '{}': {}", self.lat, e))?;
    let longitude = self
      .lon
      .parse()
      .map_err(|e| eyre!("Failed to parse place longitude '{}': {}", self.lon, e))?;
    Ok(Place {
      name: self.display_name,
      latitude,
      longitude,
    })
  }
}

impl ApiGenerateContentResponse {
  /// Join the first candidate's text parts, or None when the model
  /// returned nothing usable.
  pub fn into_answer(self) -> Option<String> {
    let text = self
      .candidates
      .into_iter()
      .next()?
      .content?
      .parts
      .into_iter()
      .map(|p| p.text)
      .filter(|t| !t.is_empty())
      .collect::<Vec<_>>()
      .join("\n");
    if text.is_empty() {
      None
    } else {
      Some(text)
    }
  }
}
