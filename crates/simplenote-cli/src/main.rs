//! SimpleNote - a command line client for the SimpleNote backend.
//!
//! Keeps a session alive across runs and a local copy of your notes, so
//! reading works offline and writes made offline are uploaded on the next sync.

mod cli;
mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use simplenote_core::Config;

use cli::Cli;

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "simplenote.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a daily file in `log_dir` so they never mix with command
/// output; `verbose` mirrors them to stderr. The returned guard flushes the
/// file writer when dropped.
fn init_tracing(log_dir: &Path, verbose: bool) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(verbose.then(|| fmt::layer().with_writer(io::stderr)))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(ref url) = cli.api_url {
        config.api_base_url = url.clone();
    }
    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)?;

    let _guard = init_tracing(&cache_dir, cli.verbose);
    info!("SimpleNote starting");

    commands::run(cli.command, config, &cache_dir).await
}
