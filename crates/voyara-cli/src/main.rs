//! # Voyara Cache CLI
//!
//! Entry point for the `voyara-cache` admin tool. Every command loads the
//! layered configuration, connects the cache the same way the application
//! does, and prints its result as JSON on stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::error;
use voyara_cache::{metrics::register_metrics, CacheService};
use voyara_config::ConfigLoader;
use voyara_core::telemetry::init_tracing;

mod commands;

const SERVICE_NAME: &str = "voyara-cache";

#[derive(Debug, Parser)]
#[command(name = "voyara-cache")]
#[command(about = "Inspect and maintain the Voyara application cache", version)]
struct Cli {
    /// Configuration directory
    #[arg(long, short = 'c', default_value = "./config", global = true)]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the backend, its health and the counters of this process
    Stats,

    /// Check that the cache store answers
    Ping,

    /// Delete every entry carrying any of the given tags
    Invalidate {
        /// Tag names, e.g. `destinations` or `packages:12`
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Delete every key under the configured namespace
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Load entries from a JSON file: `[{"key", "value", "ttl_secs"?, "tags"?}]`
    WarmUp {
        /// Path to the entries file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let loader = ConfigLoader::new(cli.config_dir)?;
    let config = loader.get().await;

    init_tracing(&config.observability.telemetry(SERVICE_NAME))?;
    register_metrics();

    let cache = CacheService::from_config(&config.cache, &config.redis).await;

    let output = match cli.command {
        Commands::Stats => commands::stats(&cache).await,
        Commands::Ping => commands::ping(&cache).await?,
        Commands::Invalidate { tags } => commands::invalidate(&cache, &tags).await?,
        Commands::Clear { yes } => commands::clear(&cache, yes).await?,
        Commands::WarmUp { file } => {
            let entries = commands::load_entries(&file)?;
            commands::warm_up(&cache, entries).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
