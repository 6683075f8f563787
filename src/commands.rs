//! Command-line command definitions

use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Show today's prayer times
  #[command(visible_alias = "t")]
  Timings(TimingsArgs),
  /// List the chapters of the Quran
  Chapters,
  /// Read a chapter, optionally with a translation
  #[command(visible_alias = "r")]
  Read(ReadArgs),
  /// Track adhkar repetitions by category
  #[command(subcommand)]
  Adhkar(AdhkarCommand),
  /// Digital tasbih counter
  #[command(subcommand)]
  Tasbih(TasbihCommand),
  /// Ask the assistant a question about Islam
  Ask(AskArgs),
  /// Manage the offline cache
  #[command(subcommand)]
  Offline(OfflineCommand),
}

#[derive(Debug, Args)]
pub struct TimingsArgs {
  /// Place name to look up instead of the configured coordinates
  #[arg(long, conflicts_with_all = ["lat", "lon"])]
  pub city: Option<String>,

  /// Latitude, overriding the configured location
  #[arg(long, requires = "lon")]
  pub lat: Option<f64>,

  /// Longitude, overriding the configured location
  #[arg(long, requires = "lat")]
  pub lon: Option<f64>,

  /// Calculation method (see aladhan.com methods; 4 = Umm al-Qura)
  #[arg(long)]
  pub method: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
  /// Chapter number (1-114)
  pub chapter: u32,

  /// Translation key, e.g. "english_saheeh"
  #[arg(long)]
  pub translation: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum AdhkarCommand {
  /// Record one repetition of an item
  Tap(AdhkarTapArgs),
  /// Show recorded progress for a category
  Status {
    /// Category name, e.g. "morning" or "evening"
    category: String,
  },
  /// Clear a category's progress
  Reset {
    /// Category name, e.g. "morning" or "evening"
    category: String,
  },
}

#[derive(Debug, Args)]
pub struct AdhkarTapArgs {
  /// Category name, e.g. "morning" or "evening"
  pub category: String,

  /// Item id within the category
  pub id: u32,

  /// Repetitions required to complete the item
  #[arg(long, default_value_t = 1)]
  pub target: u32,
}

#[derive(Debug, Subcommand)]
pub enum TasbihCommand {
  /// Count a recitation
  Tap {
    /// Number of taps to record at once
    #[arg(long, default_value_t = 1)]
    times: u32,
  },
  /// Show the session and lifetime counts
  Status,
  /// Reset the session counter (the lifetime total is kept)
  Reset,
}

#[derive(Debug, Args)]
pub struct AskArgs {
  /// The question, in Arabic or English
  #[arg(required = true)]
  pub question: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum OfflineCommand {
  /// Precache the app shell and prune obsolete cache generations
  Install,
  /// Show cache partitions and their entry counts
  Status,
}
