//! Catalog
//!
//! Live index of origins, sources and metrics fed by one discovery worker per
//! origin.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ OriginWorker │  │ OriginWorker │  │ OriginWorker │   one per origin
//! │  (connector) │  │  (connector) │  │  (connector) │
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        │ Record / PassComplete (bounded)   │
//!        └─────────────────┼─────────────────┘
//!                          ▼
//!                   ┌─────────────┐
//!                   │   Mutator   │  single writer, stages and swaps
//!                   └──────┬──────┘
//!                          ▼
//!                ┌──────────────────┐
//!                │ RwLock<CatalogIndex> │◀──── Searcher (readers)
//!                └──────────────────┘
//! ```

pub mod index;
pub mod metrics;
pub mod mutator;
pub mod worker;

pub use index::{CatalogIndex, Metric, MetricEntry, Origin, Source};
pub use metrics::{CatalogMetrics, MetricsSnapshot};
pub use mutator::{IngestItem, Mutator};
pub use worker::{OriginCommand, OriginWorker, WorkerHandle, WorkerState, WorkerStatus};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{CatalogSettings, Config};
use crate::connector::{create_connector, Connector};
use crate::error::{CatalogError, CatalogResult};
use crate::search::Searcher;
use crate::types::{EntityKind, Name};

/// Collects origins and their connectors before starting a [`Catalog`]
pub struct CatalogBuilder {
    settings: CatalogSettings,
    origins: Vec<(Name, Name, Arc<dyn Connector>)>,
}

impl CatalogBuilder {
    pub fn new(settings: CatalogSettings) -> Self {
        Self {
            settings,
            origins: Vec::new(),
        }
    }

    /// Build from configuration, creating one connector per origin
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::new(config.catalog.clone());
        for origin in &config.origins {
            let connector = create_connector(&origin.connector)
                .with_context(|| format!("Failed to create connector for origin '{}'", origin.name))?;
            builder = builder.origin(origin.name.clone(), origin.provider_name(), connector);
        }
        Ok(builder)
    }

    /// Add an origin fed by `connector` and owned by `provider`
    pub fn origin(
        mut self,
        name: impl Into<Name>,
        provider: impl Into<Name>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let name = name.into();
        if self.origins.iter().any(|(existing, _, _)| *existing == name) {
            warn!("Origin '{}' declared twice, keeping the first declaration", name);
            return self;
        }
        self.origins.push((name, provider.into(), connector));
        self
    }

    /// Spawn the mutator and one worker per origin.
    ///
    /// Fails on unusable settings. Must be called from within a tokio runtime.
    pub fn start(self) -> Result<Catalog> {
        let problems = self.settings.problems();
        if !problems.is_empty() {
            anyhow::bail!("Invalid catalog settings: {}", problems.join(", "));
        }

        let metrics = CatalogMetrics::shared();

        let mut tree = CatalogIndex::new();
        for (name, provider, connector) in &self.origins {
            tree.register_origin(name, provider, connector.kind());
        }
        let index = Arc::new(RwLock::new(tree));

        let (ingest_tx, mutator) =
            Mutator::start(index.clone(), metrics.clone(), self.settings.ingest_queue_size);

        let workers = DashMap::new();
        for (name, _provider, connector) in self.origins {
            let handle = OriginWorker::spawn(name.clone(), connector, ingest_tx.clone(), metrics.clone());
            workers.insert(name, handle);
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let refresher = self.settings.refresh_interval().map(|interval| {
            let commands: Vec<_> = workers.iter().map(|w| w.commands().clone()).collect();
            spawn_refresher(interval, commands, shutdown_tx.subscribe())
        });

        info!("Catalog started with {} origins", workers.len());

        Ok(Catalog {
            settings: self.settings,
            index,
            workers,
            ingest_tx: Mutex::new(Some(ingest_tx)),
            mutator: Mutex::new(Some(mutator)),
            refresher: Mutex::new(refresher),
            shutdown_tx,
            closed: AtomicBool::new(false),
            metrics,
        })
    }
}

/// Periodically ask every worker for a refresh
fn spawn_refresher(
    interval: std::time::Duration,
    commands: Vec<mpsc::Sender<OriginCommand>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; workers already run a pass on start
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Periodic refresh of {} origins", commands.len());
                    for tx in &commands {
                        // A full queue already holds a pending command
                        let _ = tx.try_send(OriginCommand::Refresh);
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    })
}

/// Running catalog: entity tree, mutator and origin workers
pub struct Catalog {
    settings: CatalogSettings,
    index: Arc<RwLock<CatalogIndex>>,
    workers: DashMap<Name, WorkerHandle>,
    ingest_tx: Mutex<Option<mpsc::Sender<IngestItem>>>,
    mutator: Mutex<Option<JoinHandle<()>>>,
    refresher: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    closed: AtomicBool,
    metrics: Arc<CatalogMetrics>,
}

impl Catalog {
    /// Start a catalog for every origin in the configuration
    pub fn start(config: &Config) -> Result<Self> {
        CatalogBuilder::from_config(config)?.start()
    }

    /// Read-side query engine over this catalog
    pub fn searcher(&self) -> Searcher {
        Searcher::new(self.index.clone())
    }

    /// Look up a metric by its full path
    pub fn get_metric(&self, origin: &str, source: &str, name: &str) -> CatalogResult<MetricEntry> {
        self.index.read().metric_entry(origin, source, name)
    }

    /// Names of the configured origins, sorted
    pub fn origin_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.workers.iter().map(|w| w.key().clone()).collect();
        names.sort();
        names
    }

    /// Ask one origin to run a new discovery pass
    pub fn refresh(&self, origin: &str) -> CatalogResult<()> {
        if self.is_closed() {
            return Err(CatalogError::Closed);
        }
        let worker = self
            .workers
            .get(origin)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Origin, origin))?;

        match worker.commands().try_send(OriginCommand::Refresh) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(origin, "Refresh already pending");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CatalogError::Closed),
        }
    }

    /// Ask every origin to run a new discovery pass
    pub fn refresh_all(&self) -> CatalogResult<()> {
        for name in self.origin_names() {
            self.refresh(&name)?;
        }
        Ok(())
    }

    /// Current status of an origin worker
    pub fn worker_status(&self, origin: &str) -> CatalogResult<WorkerStatus> {
        self.workers
            .get(origin)
            .map(|w| w.status())
            .ok_or_else(|| CatalogError::not_found(EntityKind::Origin, origin))
    }

    /// Wait until `origin` has finished at least `passes` discovery passes
    /// (successful or failed), or has stopped.
    pub async fn wait_for_passes(&self, origin: &str, passes: u64) -> CatalogResult<WorkerStatus> {
        let mut status = self
            .workers
            .get(origin)
            .map(|w| w.subscribe())
            .ok_or_else(|| CatalogError::not_found(EntityKind::Origin, origin))?;

        let result = status
            .wait_for(|s| s.state == WorkerState::Stopped || s.passes_finished() >= passes)
            .await
            .map(|s| s.clone());
        // A dropped sender means the worker task is gone
        result.map_err(|_| CatalogError::Closed)
    }

    /// Wait until every origin has finished its first discovery pass
    pub async fn wait_settled(&self) -> CatalogResult<()> {
        for name in self.origin_names() {
            self.wait_for_passes(&name, 1).await?;
        }
        Ok(())
    }

    pub fn metrics(&self) -> Arc<CatalogMetrics> {
        self.metrics.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop every worker, then release the ingestion channel and the mutator.
    ///
    /// Workers are always joined (or aborted after the shutdown timeout)
    /// before the catalog's own sender is dropped, so the channel only closes
    /// once nothing can send on it. Calling `close` twice is a no-op.
    pub async fn close(&self) -> CatalogResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing catalog");

        let _ = self.shutdown_tx.send(());
        let refresher = self.refresher.lock().take();
        if let Some(refresher) = refresher {
            let _ = refresher.await;
        }

        let mut stopping = Vec::new();
        for mut worker in self.workers.iter_mut() {
            let name = worker.key().clone();
            let commands = worker.commands().clone();
            stopping.push((name, commands, worker.take_task()));
        }

        for (_, commands, _) in &stopping {
            // Fails only if the worker already exited
            let _ = commands.send(OriginCommand::Shutdown).await;
        }

        let timeout = self.settings.shutdown_timeout();
        for (name, _, task) in stopping {
            let Some(task) = task else { continue };
            let abort = task.abort_handle();
            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(())) => debug!(origin = %name, "Worker joined"),
                Ok(Err(e)) => error!(origin = %name, "Worker task failed: {}", e),
                Err(_) => {
                    warn!(origin = %name, "Worker did not stop within {:?}, aborting", timeout);
                    abort.abort();
                }
            }
        }

        // Every worker sender is gone; dropping ours lets the mutator drain and exit
        drop(self.ingest_tx.lock().take());
        let mutator = self.mutator.lock().take();
        if let Some(mutator) = mutator {
            if let Err(e) = mutator.await {
                error!("Catalog mutator failed: {}", e);
            }
        }

        info!("Catalog closed");
        Ok(())
    }
}
