mod app;
mod bus;
mod cache;
mod commands;
mod config;
mod content;
mod fetch;
mod progress;

use clap::Parser;
use color_eyre::Result;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hidaya")]
#[command(about = "Offline-first terminal companion for Islamic devotional content")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hidaya/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

/// Initialize the tracing subscriber for logging
///
/// Use the RUST_LOG env var to control the log level (e.g. RUST_LOG=debug).
/// Logs go to stderr so command output stays clean on stdout.
fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(io::stderr))
    .with(filter)
    .init();
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  init_tracing();

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run(args.command).await?;

  Ok(())
}
