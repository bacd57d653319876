use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use seriesdex::catalog::{MetricsSnapshot, WorkerStatus};
use seriesdex::Config;

use super::{open_catalog, print_json, OutputFormat};

#[derive(Serialize)]
struct OriginReport {
    origin: String,
    #[serde(flatten)]
    status: WorkerStatus,
}

#[derive(Serialize)]
struct StatusReport {
    origins: Vec<OriginReport>,
    metrics: MetricsSnapshot,
}

pub async fn show_status(
    config: Config,
    format: OutputFormat,
    prometheus: bool,
    settle_timeout: Duration,
) -> Result<()> {
    let catalog = open_catalog(&config, settle_timeout).await?;

    let mut origins = Vec::new();
    for origin in catalog.origin_names() {
        let status = catalog.worker_status(&origin)?;
        origins.push(OriginReport { origin, status });
    }
    let metrics = catalog.metrics();
    catalog.close().await?;

    if prometheus {
        print!("{}", metrics.to_prometheus());
        return Ok(());
    }

    let report = StatusReport {
        origins,
        metrics: metrics.snapshot(),
    };
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("\nOrigin workers");
            println!("==============");
            for o in &report.origins {
                println!(
                    "{:<20} generation {:<4} passes {:<4} failed {:<4} {}",
                    o.origin,
                    o.status.generation,
                    o.status.passes_completed,
                    o.status.passes_failed,
                    o.status.last_error.as_deref().unwrap_or("")
                );
            }
            let m = &report.metrics;
            println!("\nRecords applied:   {}", m.records_applied);
            println!("Records discarded: {}", m.records_discarded);
            println!("Subtree swaps:     {}", m.subtree_swaps);
        }
    }
    Ok(())
}
