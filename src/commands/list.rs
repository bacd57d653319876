use std::time::Duration;

use anyhow::Result;
use seriesdex::search::CatalogQuery;
use seriesdex::{Config, EntityKind};
use tracing::debug;

use super::{open_catalog, print_json, OutputFormat};

#[allow(clippy::too_many_arguments)]
pub async fn list_entries(
    config: Config,
    kind: EntityKind,
    origin: String,
    source: String,
    name: String,
    offset: i64,
    limit: i64,
    format: OutputFormat,
    settle_timeout: Duration,
) -> Result<()> {
    let catalog = open_catalog(&config, settle_timeout).await?;
    let query = CatalogQuery {
        kind,
        origin,
        source,
        name,
    };
    debug!("Listing {:?}", query);

    let result = catalog.searcher().list(&query, offset, limit);
    catalog.close().await?;
    let page = result?;

    match format {
        OutputFormat::Json => print_json(&page)?,
        OutputFormat::Text => {
            for item in &page.items {
                println!("{}", item);
            }
            println!(
                "\n{} of {} {}s (offset {})",
                page.items.len(),
                page.total,
                kind,
                offset
            );
        }
    }
    Ok(())
}

pub async fn show_counts(config: Config, format: OutputFormat, settle_timeout: Duration) -> Result<()> {
    let catalog = open_catalog(&config, settle_timeout).await?;
    let counts = catalog.searcher().counts();
    catalog.close().await?;

    match format {
        OutputFormat::Json => print_json(&counts)?,
        OutputFormat::Text => {
            println!("\nCatalog");
            println!("=======");
            println!("Origins: {}", counts.origins);
            println!("Sources: {}", counts.sources);
            println!("Metrics: {}", counts.metrics);
        }
    }
    Ok(())
}
