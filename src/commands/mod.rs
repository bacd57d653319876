//! CLI command implementations

mod init;
mod list;
mod show;
mod status;

pub use init::init_config;
pub use list::{list_entries, show_counts};
pub use show::{get_metric, show_detail};
pub use status::show_status;

use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use seriesdex::{Catalog, Config};
use tracing::{info, warn};

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Start a catalog and wait for every origin's first discovery pass
async fn open_catalog(config: &Config, settle_timeout: Duration) -> Result<Catalog> {
    let catalog = Catalog::start(config)?;
    info!("Waiting for initial discovery of {} origins", config.origins.len());

    match tokio::time::timeout(settle_timeout, catalog.wait_settled()).await {
        Ok(result) => result?,
        Err(_) => warn!(
            "Initial discovery still running after {:?}, querying a partial catalog",
            settle_timeout
        ),
    }
    Ok(catalog)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
