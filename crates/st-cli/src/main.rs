use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use st_cli::commands::{day, history, record, replay, stats, status, sweep, video};
use st_cli::{Cli, Commands, Config};
use st_store::{SqliteKv, Storage};

/// Load config and open storage, ensuring the parent directory exists.
fn open_storage(config_path: Option<&Path>) -> Result<(Storage<SqliteKv>, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let storage = Storage::open(&config.database_path).with_context(|| {
        format!("failed to open {}", config.database_path.display())
    })?;
    Ok((storage, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so JSON output on stdout stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let (storage, config) = open_storage(cli.config.as_deref())?;
    let zone = config.zone();
    let today = zone.today();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Record => {
            let identity = config.identity().context("invalid content_patterns")?;
            record::run(&mut out, storage, &config.recorder, identity)?;
        }
        Commands::Replay { file, json } => {
            let identity = config.identity().context("invalid content_patterns")?;
            replay::run(&mut out, &storage, &config.recorder, identity, file, *json)?;
        }
        Commands::Stats { period, json } => {
            stats::run(&mut out, &storage, zone, *period, today, *json)?;
        }
        Commands::History {
            limit,
            offset,
            json,
        } => {
            history::run(&mut out, &storage, zone, *limit, *offset, *json)?;
        }
        Commands::Day { date, json } => {
            day::run(&mut out, &storage, zone, date.unwrap_or(today), *json)?;
        }
        Commands::Video { id, json } => {
            video::run(&mut out, &storage, zone, id, *json)?;
        }
        Commands::Status => {
            status::run(&mut out, &storage, &config.database_path)?;
        }
        Commands::Sweep { keep_days } => {
            let policy = keep_days.map_or_else(|| config.retention(), st_store::RetentionPolicy::new);
            sweep::run(&mut out, &storage, policy, today)?;
        }
    }

    out.flush()?;
    Ok(())
}
