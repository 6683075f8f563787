//! Upstream content APIs: prayer times, Quran text and chapter metadata,
//! translations, geocoding and the assistant.
//!
//! Wire types live in `api_types`, domain types in `types`, and the client
//! funnels every request through the cache dispatcher.

mod api_types;
mod client;
mod types;

pub use client::ContentClient;
pub use types::{Chapter, Place, PrayerDay, PrayerTimes, TranslatedVerse, Verse};
