//! glucose-store: inspect and maintain a local glucose sample cache
//!
//! Runs against the cache file only; the remote tier is reported as
//! unavailable, so every read is served from the cache.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use glucose_store::events::spawn_logging_listener;
use glucose_store::{Config, GlucoseStore, MemoryRemoteStore, RemoteError};

#[derive(Parser)]
#[command(name = "glucose-store")]
#[command(about = "Inspect and maintain a local glucose sample cache")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "glucose-store.toml")]
    config: String,

    /// Cache database (overrides config file)
    #[arg(long, env = "GLUCOSE_STORE_CACHE")]
    cache_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print configuration and cache contents
    Dump,
    /// Print the most recent cached sample as JSON
    Latest,
    /// Print cached samples from the last N hours as JSON
    Values {
        #[arg(long, default_value_t = 3)]
        hours: i64,
    },
    /// Drop samples older than the cache length
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("glucose_store=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };
    if let Some(path) = cli.cache_path {
        config.cache.path = path;
    }
    info!("Cache: {}", config.cache.path.display());

    let remote = Arc::new(MemoryRemoteStore::new());
    remote
        .set_unavailable(Some(RemoteError::Unavailable("no remote store configured".into())))
        .await;

    let store = GlucoseStore::open(&config, remote).await?;
    spawn_logging_listener(store.subscribe());

    match cli.command {
        Command::Dump => {
            println!("{}", store.diagnostic_report().await?);
        }
        Command::Latest => {
            // The tracker is filled by the worker's first task
            let _ = store.reconciler().stats().await?;
            println!("{}", serde_json::to_string_pretty(&store.get_latest())?);
        }
        Command::Values { hours } => {
            let read = store
                .get_cached_values(Utc::now() - Duration::hours(hours), None)
                .await?;
            println!("{}", serde_json::to_string_pretty(&read.value)?);
        }
        Command::Purge => {
            let purged = store.purge().await?;
            println!("Purged {} samples", purged);
        }
    }

    Ok(())
}
