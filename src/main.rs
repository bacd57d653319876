//! seriesdex: live catalog of time-series identifiers
//!
//! Starts a catalog from a TOML configuration, waits for the first discovery
//! pass of every origin, runs one query and shuts the catalog down.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::OutputFormat;
use seriesdex::config::{Config, LogFormat};
use seriesdex::search::Scope;
use seriesdex::EntityKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "seriesdex")]
#[command(about = "Live catalog of time-series origins, sources and metrics")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "seriesdex.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seconds to wait for the initial discovery pass before querying
    #[arg(long, default_value = "30")]
    settle_timeout: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count distinct origins, sources and metrics
    Counts,

    /// List distinct names of one collection
    List {
        /// Collection: origins, sources or metrics
        #[arg(value_parser = parse_collection)]
        collection: EntityKind,

        /// Name filter (substring, or glob when it contains * ? [ {)
        #[arg(default_value = "")]
        name: String,

        /// Origin filter
        #[arg(long, default_value = "")]
        origin: String,

        /// Source filter (metrics only)
        #[arg(long, default_value = "")]
        source: String,

        /// Skip this many names
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        offset: i64,

        /// Return at most this many names (0 = all)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        limit: i64,
    },

    /// Show which origins, sources and providers expose a name
    Show {
        /// Collection: origins, sources or metrics
        #[arg(value_parser = parse_collection)]
        collection: EntityKind,

        /// Exact entity name
        name: String,

        /// Only consider this origin
        #[arg(long)]
        origin: Option<String>,

        /// Only consider this source
        #[arg(long)]
        source: Option<String>,
    },

    /// Look up one metric by its full path
    Get {
        origin: String,
        source: String,
        metric: String,
    },

    /// Show origin worker status and catalog metrics
    Status {
        /// Print metrics in Prometheus text format
        #[arg(long)]
        prometheus: bool,
    },

    /// Write a sample configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

fn parse_collection(value: &str) -> Result<EntityKind, String> {
    EntityKind::from_collection(value)
        .ok_or_else(|| format!("unknown collection '{}' (expected origins, sources or metrics)", value))
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.directive(verbose)));

    match config.logging.format {
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let config = if config_found {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    init_logging(&config, cli.verbose)?;
    if config_found {
        info!("Loaded configuration from {}", cli.config.display());
    } else if !matches!(cli.command, Commands::Init { .. }) {
        warn!("Configuration file {} not found, using defaults", cli.config.display());
    }

    let settle = Duration::from_secs(cli.settle_timeout);
    let format = cli.format;

    match cli.command {
        Commands::Counts => commands::show_counts(config, format, settle).await,
        Commands::List {
            collection,
            name,
            origin,
            source,
            offset,
            limit,
        } => {
            commands::list_entries(config, collection, origin, source, name, offset, limit, format, settle)
                .await
        }
        Commands::Show {
            collection,
            name,
            origin,
            source,
        } => {
            let scope = Scope { origin, source };
            commands::show_detail(config, collection, name, scope, format, settle).await
        }
        Commands::Get { origin, source, metric } => {
            commands::get_metric(config, origin, source, metric, format, settle).await
        }
        Commands::Status { prometheus } => commands::show_status(config, format, prometheus, settle).await,
        Commands::Init { path } => commands::init_config(path).await,
    }
}
