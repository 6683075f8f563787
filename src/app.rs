use crate::bus::Subscription;
use crate::cache::{
  CacheEvent, Dispatcher, GenerationNames, Lifecycle, NoopPartitions, Partition, PartitionStore,
  RouteTable, SqlitePartitions, Strategy,
};
use crate::commands::{
  AdhkarCommand, AskArgs, Command, OfflineCommand, ReadArgs, TasbihCommand, TimingsArgs,
};
use crate::config::{Config, ShellStrategy};
use crate::content::ContentClient;
use crate::fetch::HttpFetch;
use crate::progress::{Milestone, ProgressStore, SqliteProgress};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// How long a command lingers after printing its answer, giving a
/// background revalidation a chance to land before the process exits.
const REVALIDATION_GRACE: Duration = Duration::from_millis(1500);

/// Wires configuration into the cache, content and progress layers and
/// executes one command.
pub struct App {
  config: Config,
  store: Arc<dyn PartitionStore>,
  dispatcher: Arc<Dispatcher>,
  lifecycle: Lifecycle,
  client: ContentClient,
  progress: ProgressStore<SqliteProgress>,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let store: Arc<dyn PartitionStore> = if config.cache.enabled {
      Arc::new(SqlitePartitions::open()?)
    } else {
      Arc::new(NoopPartitions)
    };

    let shell_origin = match &config.cache.shell_origin {
      Some(raw) => {
        Some(Url::parse(raw).map_err(|e| eyre!("Invalid shell origin '{}': {}", raw, e))?)
      }
      None => None,
    };
    let shell_strategy = match config.cache.shell_strategy {
      ShellStrategy::NetworkFirst => Strategy::NetworkFirst,
      ShellStrategy::StaleWhileRevalidate => Strategy::StaleWhileRevalidate,
    };

    let routes = RouteTable::new(
      config.cache.api_hosts.clone(),
      config.cache.asset_hosts.clone(),
      shell_origin.clone(),
      shell_strategy,
    );

    let fetcher = Arc::new(HttpFetch::new()?);
    let dispatcher = Arc::new(Dispatcher::new(
      routes,
      Partition::new(store.clone(), config.cache.shell_partition()),
      Partition::new(store.clone(), config.cache.data_partition()),
      fetcher.clone(),
    ));

    let lifecycle = Lifecycle::new(
      store.clone(),
      fetcher,
      dispatcher.event_bus(),
      GenerationNames {
        shell: config.cache.shell_partition(),
        data: config.cache.data_partition(),
      },
      shell_origin,
      config.cache.precache.clone(),
    );

    let client = ContentClient::new(dispatcher.clone(), &config);
    let progress = ProgressStore::new(SqliteProgress::open()?);

    Ok(Self {
      config,
      store,
      dispatcher,
      lifecycle,
      client,
      progress,
    })
  }

  pub async fn run(&mut self, command: Command) -> Result<()> {
    match command {
      Command::Timings(args) => self.show_timings(args).await,
      Command::Chapters => self.list_chapters().await,
      Command::Read(args) => self.read_chapter(args).await,
      Command::Adhkar(command) => self.run_adhkar(command),
      Command::Tasbih(command) => self.run_tasbih(command),
      Command::Ask(args) => self.ask(args).await,
      Command::Offline(command) => self.run_offline(command).await,
    }
  }

  async fn show_timings(&self, args: TimingsArgs) -> Result<()> {
    let mut events = self.dispatcher.subscribe();
    let language = self.content_language()?;
    let method = args.method.unwrap_or(self.config.location.method);

    let (latitude, longitude, place) = if let Some(city) = &args.city {
      let place = self.client.search_place(city, &language).await?;
      (place.latitude, place.longitude, place.name)
    } else {
      let latitude = args.lat.unwrap_or(self.config.location.latitude);
      let longitude = args.lon.unwrap_or(self.config.location.longitude);
      let place = match self.client.reverse_geocode(latitude, longitude, &language).await {
        Ok(name) => name,
        Err(e) => {
          warn!(error = %e, "reverse geocode failed");
          format!("{}, {}", latitude, longitude)
        }
      };
      (latitude, longitude, place)
    };

    let day = self.client.timings(latitude, longitude, method).await?;

    println!("Prayer times for {}", place);
    println!("{} ({})", day.readable_date, day.hijri_date);
    println!();
    println!("  Fajr      {}", day.times.fajr);
    println!("  Sunrise   {}", day.times.sunrise);
    println!("  Dhuhr     {}", day.times.dhuhr);
    println!("  Asr       {}", day.times.asr);
    println!("  Maghrib   {}", day.times.maghrib);
    println!("  Isha      {}", day.times.isha);
    println!();
    println!("  Imsak     {}", day.times.imsak);
    println!("  Sunset    {}", day.times.sunset);
    println!("  Midnight  {}", day.times.midnight);

    self.finish_revalidation(&mut events).await;
    Ok(())
  }

  async fn list_chapters(&self) -> Result<()> {
    let mut events = self.dispatcher.subscribe();
    let language = self.content_language()?;
    let chapters = self.client.chapters(&language).await?;

    for chapter in &chapters {
      println!(
        "{:>3}  {}  {} ({}) [{}] - {} verses",
        chapter.id,
        chapter.name_arabic,
        chapter.name_simple,
        chapter.translated_name,
        chapter.revelation_place,
        chapter.verses_count
      );
    }

    self.finish_revalidation(&mut events).await;
    Ok(())
  }

  async fn read_chapter(&self, args: ReadArgs) -> Result<()> {
    if args.chapter < 1 || args.chapter > 114 {
      return Err(eyre!("Chapter must be between 1 and 114"));
    }

    let mut events = self.dispatcher.subscribe();
    let verses = self.client.verses(args.chapter).await?;

    match &args.translation {
      Some(key) => {
        let translated = self.client.translation(key, args.chapter).await?;
        let by_aya: HashMap<u32, &str> = translated
          .iter()
          .map(|verse| (verse.aya, verse.text.as_str()))
          .collect();

        for verse in &verses {
          println!("{}  {}", verse.key, verse.text);
          if let Some(text) = verse_number(&verse.key).and_then(|aya| by_aya.get(&aya)) {
            println!("    {}", text);
          }
          println!();
        }
      }
      None => {
        for verse in &verses {
          println!("{}  {}", verse.key, verse.text);
        }
      }
    }

    self.finish_revalidation(&mut events).await;
    Ok(())
  }

  fn run_adhkar(&mut self, command: AdhkarCommand) -> Result<()> {
    match command {
      AdhkarCommand::Tap(args) => {
        let progress = self.progress.increment(&args.category, args.id, args.target)?;
        if progress.just_completed {
          println!(
            "{} item {} completed ({}/{})",
            args.category, args.id, progress.value, args.target
          );
        } else {
          println!(
            "{} item {}: {}/{}",
            args.category, args.id, progress.value, args.target
          );
        }
        Ok(())
      }
      AdhkarCommand::Status { category } => {
        let progress = self.progress.load(&category)?;
        if progress.counts.is_empty() {
          println!("No progress recorded for {}", category);
          return Ok(());
        }

        let mut items: Vec<_> = progress.counts.iter().collect();
        items.sort();
        for (id, count) in items {
          let done = progress.completed.get(id).copied().unwrap_or(false);
          let marker = if done { " (completed)" } else { "" };
          println!("  item {}: {}{}", id, count, marker);
        }
        Ok(())
      }
      AdhkarCommand::Reset { category } => {
        self.progress.reset(&category)?;
        println!("Progress for {} cleared", category);
        Ok(())
      }
    }
  }

  fn run_tasbih(&mut self, command: TasbihCommand) -> Result<()> {
    match command {
      TasbihCommand::Tap { times } => {
        for _ in 0..times {
          let tap = self.progress.tally_tap()?;
          if let Some(milestone) = tap.milestone {
            println!("{}", milestone_message(milestone));
          }
        }
        let tally = self.progress.tally()?;
        println!("Session: {}  Lifetime: {}", tally.session, tally.total);
        Ok(())
      }
      TasbihCommand::Status => {
        let tally = self.progress.tally()?;
        println!("Session: {}  Lifetime: {}", tally.session, tally.total);
        Ok(())
      }
      TasbihCommand::Reset => {
        self.progress.tally_reset()?;
        let tally = self.progress.tally()?;
        println!("Session reset. Lifetime: {}", tally.total);
        Ok(())
      }
    }
  }

  async fn ask(&self, args: AskArgs) -> Result<()> {
    let language = self.content_language()?;
    let question = args.question.join(" ");
    let answer = self.client.ask(&question, &language).await?;
    println!("{}", answer);
    Ok(())
  }

  async fn run_offline(&self, command: OfflineCommand) -> Result<()> {
    match command {
      OfflineCommand::Install => {
        if !self.config.cache.enabled {
          return Err(eyre!("Caching is disabled in the configuration"));
        }

        let installed = self.lifecycle.install().await?;
        let pruned = self.lifecycle.activate()?;

        println!(
          "Precached {} entries into {}",
          installed,
          self.config.cache.shell_partition()
        );
        match pruned.len() {
          0 => println!("No obsolete partitions to prune"),
          n => println!("Pruned {} obsolete partition{}", n, if n == 1 { "" } else { "s" }),
        }
        Ok(())
      }
      OfflineCommand::Status => {
        if !self.config.cache.enabled {
          println!("Caching is disabled in the configuration");
          return Ok(());
        }

        let names = self.store.partition_names()?;
        if names.is_empty() {
          println!("Cache is empty");
          return Ok(());
        }

        let expected = [
          self.config.cache.shell_partition(),
          self.config.cache.data_partition(),
        ];
        for name in names {
          let count = self.store.entry_count(&name)?;
          let marker = if expected.contains(&name) { "" } else { " (obsolete)" };
          println!("  {}: {} entries{}", name, count, marker);
        }
        Ok(())
      }
    }
  }

  /// Stored language preference, falling back to the configured default.
  fn content_language(&self) -> Result<String> {
    Ok(
      self
        .progress
        .language()?
        .unwrap_or_else(|| self.config.content.language.clone()),
    )
  }

  /// Wait for a partition update, bounded by the revalidation grace.
  ///
  /// Commands that were answered straight from the network have their
  /// update already buffered on the subscription, so this returns at
  /// once. Commands answered from cache give the background revalidation
  /// this window to complete.
  async fn finish_revalidation(&self, events: &mut Subscription<CacheEvent>) {
    let _ = tokio::time::timeout(REVALIDATION_GRACE, async {
      while let Some(event) = events.next().await {
        if matches!(event, CacheEvent::PartitionUpdated { .. }) {
          break;
        }
      }
    })
    .await;
  }
}

/// Verse number out of a "chapter:verse" key
fn verse_number(key: &str) -> Option<u32> {
  key.rsplit_once(':').and_then(|(_, aya)| aya.parse().ok())
}

/// Message shown when a tally milestone lands
fn milestone_message(milestone: Milestone) -> &'static str {
  match milestone {
    Milestone::ThirtyThree => "Cycle of 33 complete",
    Milestone::Hundred => "100 in this session, ma sha Allah",
    Milestone::Thousand => "Another thousand, ma sha Allah",
  }
}
