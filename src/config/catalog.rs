//! Catalog runtime configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_ingest_queue_size() -> usize {
    256
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

/// Catalog runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// Capacity of the ingestion channel between origin workers and the mutator.
    /// A full channel throttles discovery instead of buffering without bound.
    #[serde(default = "default_ingest_queue_size")]
    pub ingest_queue_size: usize,
    /// Refresh every origin on this interval (0 disables periodic refresh)
    #[serde(default)]
    pub refresh_interval_secs: u64,
    /// Time allowed for workers to stop on close before they are aborted
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl CatalogSettings {
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Problems that would keep a catalog from running with these settings
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.ingest_queue_size == 0 {
            problems.push("ingest_queue_size must be positive".to_string());
        }
        // A zero timeout would abort every worker on close
        if self.shutdown_timeout_secs == 0 {
            problems.push("shutdown_timeout_secs must be positive".to_string());
        }
        problems
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            ingest_queue_size: default_ingest_queue_size(),
            refresh_interval_secs: 0,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}
