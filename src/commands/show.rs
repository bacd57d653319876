use std::time::Duration;

use anyhow::Result;
use seriesdex::search::Scope;
use seriesdex::{Config, EntityKind};

use super::{open_catalog, print_json, OutputFormat};

pub async fn show_detail(
    config: Config,
    kind: EntityKind,
    name: String,
    scope: Scope,
    format: OutputFormat,
    settle_timeout: Duration,
) -> Result<()> {
    let catalog = open_catalog(&config, settle_timeout).await?;
    let result = catalog.searcher().detail(kind, &name, &scope);
    catalog.close().await?;
    let detail = result?;

    match format {
        OutputFormat::Json => print_json(&detail)?,
        OutputFormat::Text => {
            println!("\n{} {}", detail.kind, detail.name);
            println!("Origins:   {}", detail.origins.join(", "));
            if !detail.sources.is_empty() {
                println!("Sources:   {}", detail.sources.join(", "));
            }
            println!("Providers: {}", detail.providers.join(", "));
        }
    }
    Ok(())
}

pub async fn get_metric(
    config: Config,
    origin: String,
    source: String,
    metric: String,
    format: OutputFormat,
    settle_timeout: Duration,
) -> Result<()> {
    let catalog = open_catalog(&config, settle_timeout).await?;
    let result = catalog.get_metric(&origin, &source, &metric);
    catalog.close().await?;
    let entry = result?;

    match format {
        OutputFormat::Json => print_json(&entry)?,
        OutputFormat::Text => {
            println!("Metric:    {}", entry.name);
            println!("Source:    {}", entry.source);
            println!("Origin:    {}", entry.origin);
            println!("Provider:  {}", entry.provider);
            println!("Connector: {}", entry.payload.connector());
        }
    }
    Ok(())
}
