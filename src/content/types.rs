/// Prayer times for a single day
#[derive(Debug, Clone)]
pub struct PrayerDay {
  pub readable_date: String,
  pub hijri_date: String,
  pub times: PrayerTimes,
}

/// The day's prayer and daylight times, as formatted clock strings
#[derive(Debug, Clone)]
pub struct PrayerTimes {
  pub fajr: String,
  pub sunrise: String,
  pub dhuhr: String,
  pub asr: String,
  pub sunset: String,
  pub maghrib: String,
  pub isha: String,
  pub imsak: String,
  pub midnight: String,
}

/// Chapter (surah) metadata for list views
#[derive(Debug, Clone)]
pub struct Chapter {
  pub id: u32,
  pub name_arabic: String,
  pub name_simple: String,
  pub translated_name: String,
  pub verses_count: u32,
  pub revelation_place: String, // "makkah" or "madinah"
}

/// A single verse in the Uthmani script
#[derive(Debug, Clone)]
pub struct Verse {
  pub key: String, // "chapter:verse", e.g. "2:255"
  pub text: String,
}

/// A translated verse
#[derive(Debug, Clone)]
pub struct TranslatedVerse {
  pub aya: u32,
  pub text: String,
}

/// A geocoded place
#[derive(Debug, Clone)]
pub struct Place {
  pub name: String,
  pub latitude: f64,
  pub longitude: f64,
}
