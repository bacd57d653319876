//! Catalog Mutator
//!
//! The single writer of the entity tree. Origin workers never touch the tree
//! themselves; they send [`IngestItem`]s and this loop applies them.
//!
//! Each discovery pass is staged in a private per-origin subtree. The staged
//! subtree replaces the visible one in a single write-locked swap when the
//! pass-complete marker arrives, so readers see either the previous pass or
//! the new one, never a mix. Records tagged with a generation older than the
//! one visible or staged are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::index::{CatalogIndex, Origin};
use super::metrics::CatalogMetrics;
use crate::types::{Generation, Name, Record};

/// Messages accepted by the mutator
#[derive(Debug)]
pub enum IngestItem {
    /// A discovered triple belonging to pass `generation` of its origin
    Record { generation: Generation, record: Record },
    /// Every record of the pass has been sent; swap it in and acknowledge
    PassComplete {
        origin: Name,
        generation: Generation,
        ack: oneshot::Sender<()>,
    },
    /// The pass failed; drop what was staged and keep the previous subtree
    PassAborted { origin: Name, generation: Generation },
}

/// Background loop owning all tree mutations
pub struct Mutator {
    index: Arc<RwLock<CatalogIndex>>,
    ingest_rx: mpsc::Receiver<IngestItem>,
    metrics: Arc<CatalogMetrics>,
    staging: HashMap<Name, Origin>,
}

impl Mutator {
    /// Start the mutation loop.
    ///
    /// The loop ends once every sender of the returned channel has been dropped
    /// and the queue is drained.
    pub fn start(
        index: Arc<RwLock<CatalogIndex>>,
        metrics: Arc<CatalogMetrics>,
        capacity: usize,
    ) -> (mpsc::Sender<IngestItem>, JoinHandle<()>) {
        let (ingest_tx, ingest_rx) = mpsc::channel(capacity);
        let mutator = Self {
            index,
            ingest_rx,
            metrics,
            staging: HashMap::new(),
        };
        let task = tokio::spawn(mutator.run());
        (ingest_tx, task)
    }

    async fn run(mut self) {
        info!("Catalog mutator started");

        while let Some(item) = self.ingest_rx.recv().await {
            self.apply(item);
        }

        if !self.staging.is_empty() {
            debug!("Dropping {} unfinished staged passes", self.staging.len());
        }
        info!("Catalog mutator stopped");
    }

    fn apply(&mut self, item: IngestItem) {
        match item {
            IngestItem::Record { generation, record } => self.apply_record(generation, record),
            IngestItem::PassComplete {
                origin,
                generation,
                ack,
            } => {
                self.complete_pass(&origin, generation);
                // The worker may already be gone on shutdown
                let _ = ack.send(());
            }
            IngestItem::PassAborted { origin, generation } => {
                if self.staged_generation(&origin) == Some(generation) {
                    self.staging.remove(&origin);
                    debug!(origin = %origin, generation, "Dropped staged pass after discovery failure");
                }
            }
        }
    }

    fn apply_record(&mut self, generation: Generation, record: Record) {
        if generation <= self.visible_generation(&record.origin) {
            self.discard(&record, generation);
            return;
        }

        match self.staged_generation(&record.origin) {
            Some(staged) if staged > generation => {
                self.discard(&record, generation);
                return;
            }
            Some(staged) if staged == generation => {}
            previous => {
                if let Some(previous) = previous {
                    debug!(
                        origin = %record.origin,
                        previous,
                        generation,
                        "Superseding unfinished staged pass"
                    );
                }
                let staged = self.empty_subtree(&record.origin, generation);
                self.staging.insert(record.origin.clone(), staged);
            }
        }

        trace!("Staging {} (generation {})", record, generation);
        if let Some(staged) = self.staging.get_mut(&record.origin) {
            staged.insert(&record.source, &record.metric, record.payload);
            self.metrics.records_applied.inc();
        }
    }

    fn complete_pass(&mut self, origin: &str, generation: Generation) {
        if generation <= self.visible_generation(origin) {
            debug!(origin, generation, "Ignoring completion of a superseded pass");
            return;
        }

        let staged = match self.staging.remove(origin) {
            Some(staged) if staged.generation() == generation => staged,
            Some(newer) if newer.generation() > generation => {
                self.staging.insert(origin.to_string(), newer);
                debug!(origin, generation, "Ignoring completion of a superseded pass");
                return;
            }
            // Nothing staged for this generation: the pass found no entries
            _ => self.empty_subtree(origin, generation),
        };

        let (sources, metrics) = (staged.source_count(), staged.metric_count());
        self.index.write().replace_origin(staged);
        self.metrics.subtree_swaps.inc();
        debug!(origin, generation, sources, metrics, "Origin subtree swapped");
    }

    fn discard(&self, record: &Record, generation: Generation) {
        trace!("Discarding stale {} (generation {})", record, generation);
        self.metrics.records_discarded.inc();
    }

    fn staged_generation(&self, origin: &str) -> Option<Generation> {
        self.staging.get(origin).map(Origin::generation)
    }

    fn visible_generation(&self, origin: &str) -> Generation {
        self.index.read().origin(origin).map_or(0, Origin::generation)
    }

    fn empty_subtree(&self, origin: &str, generation: Generation) -> Origin {
        match self.index.read().origin(origin) {
            Some(current) => current.empty_like(generation),
            None => Origin::new(origin, origin, "unknown").empty_like(generation),
        }
    }
}
