//! Origin Worker
//!
//! One task per configured origin. Drives the connector's discovery
//! capability and streams what it finds onto the ingestion channel.
//!
//! ```text
//!            start / Refresh
//!   Idle ─────────────────────▶ Discovering ◀──┐
//!    ▲                              │           │ next entry
//!    │      pass complete           ▼           │
//!    └───────────────────────── Publishing ─────┘
//!
//!   any state ── Shutdown ──▶ Stopped
//! ```
//!
//! Every blocking step (connector call, stream poll, channel send, swap
//! acknowledgement) is raced against the command channel so a shutdown is
//! observed without waiting for the step to finish.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::metrics::CatalogMetrics;
use super::mutator::IngestItem;
use crate::connector::Connector;
use crate::error::CatalogError;
use crate::types::{Generation, Name, Record};

/// Pending commands buffered per worker
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// Control commands accepted by an origin worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginCommand {
    /// Run a new discovery pass (coalesced if one is already running)
    Refresh,
    /// Stop the worker, abandoning any in-flight pass
    Shutdown,
}

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Discovering,
    Publishing,
    Stopped,
}

/// Observable status of one origin worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    /// Generation of the last pass swapped into the catalog (0 = none yet)
    pub generation: Generation,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub last_error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl WorkerStatus {
    /// Passes that reached an end, successful or not
    pub fn passes_finished(&self) -> u64 {
        self.passes_completed + self.passes_failed
    }
}

impl Default for WorkerStatus {
    fn default() -> Self {
        Self {
            state: WorkerState::Idle,
            generation: 0,
            passes_completed: 0,
            passes_failed: 0,
            last_error: None,
            last_refresh: None,
        }
    }
}

/// Whether the worker keeps running after a pass
enum Flow {
    Continue,
    Stop,
}

/// Handle kept by the catalog for each running worker
pub struct WorkerHandle {
    commands: mpsc::Sender<OriginCommand>,
    status: watch::Receiver<WorkerStatus>,
    task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Sender for control commands
    pub fn commands(&self) -> &mpsc::Sender<OriginCommand> {
        &self.commands
    }

    /// Current status
    pub fn status(&self) -> WorkerStatus {
        self.status.borrow().clone()
    }

    /// Status receiver for waiting on changes
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.clone()
    }

    /// Take the task handle for joining (only once)
    pub fn take_task(&mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }
}

/// Discovery driver for a single origin
pub struct OriginWorker {
    origin: Name,
    connector: Arc<dyn Connector>,
    ingest_tx: mpsc::Sender<IngestItem>,
    commands: mpsc::Receiver<OriginCommand>,
    status: watch::Sender<WorkerStatus>,
    metrics: Arc<CatalogMetrics>,
    generation: Generation,
    refresh_queued: bool,
}

impl OriginWorker {
    /// Spawn a worker; it starts with a discovery pass right away
    pub fn spawn(
        origin: Name,
        connector: Arc<dyn Connector>,
        ingest_tx: mpsc::Sender<IngestItem>,
        metrics: Arc<CatalogMetrics>,
    ) -> WorkerHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(WorkerStatus::default());

        let worker = Self {
            origin,
            connector,
            ingest_tx,
            commands: command_rx,
            status: status_tx,
            metrics,
            generation: 0,
            refresh_queued: true,
        };

        let task = tokio::spawn(worker.run());

        WorkerHandle {
            commands: command_tx,
            status: status_rx,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        info!(origin = %self.origin, connector = self.connector.kind(), "Origin worker started");
        self.metrics.active_workers.inc();

        loop {
            if self.refresh_queued {
                self.refresh_queued = false;
                if let Flow::Stop = self.run_pass().await {
                    break;
                }
                continue;
            }

            self.set_state(WorkerState::Idle);
            match self.commands.recv().await {
                Some(OriginCommand::Refresh) => self.refresh_queued = true,
                Some(OriginCommand::Shutdown) | None => break,
            }
        }

        self.set_state(WorkerState::Stopped);
        self.metrics.active_workers.dec();
        info!(origin = %self.origin, "Origin worker stopped");
    }

    /// Run one full discovery pass under a fresh generation
    async fn run_pass(&mut self) -> Flow {
        self.generation += 1;
        let generation = self.generation;
        let started = Instant::now();
        self.metrics.passes_started.inc();
        self.set_state(WorkerState::Discovering);
        debug!(origin = %self.origin, generation, "Discovery pass started");

        let opened = until_shutdown(
            &mut self.commands,
            &mut self.refresh_queued,
            self.connector.discover(),
        )
        .await;
        let mut stream = match opened {
            None => return self.interrupted(generation),
            Some(Ok(stream)) => stream,
            Some(Err(e)) => return self.fail_pass(generation, e.to_string()).await,
        };

        let mut published = 0u64;
        loop {
            self.set_state(WorkerState::Discovering);
            let next = until_shutdown(&mut self.commands, &mut self.refresh_queued, stream.next()).await;
            let discovered = match next {
                None => return self.interrupted(generation),
                Some(None) => break,
                Some(Some(Ok(discovered))) => discovered,
                Some(Some(Err(e))) => return self.fail_pass(generation, e.to_string()).await,
            };

            self.set_state(WorkerState::Publishing);
            let item = IngestItem::Record {
                generation,
                record: Record::new(
                    self.origin.clone(),
                    discovered.source,
                    discovered.metric,
                    discovered.payload,
                ),
            };
            match until_shutdown(&mut self.commands, &mut self.refresh_queued, self.ingest_tx.send(item)).await {
                None => return self.interrupted(generation),
                Some(Err(_)) => {
                    warn!(origin = %self.origin, "Ingestion channel closed, stopping worker");
                    return Flow::Stop;
                }
                Some(Ok(())) => published += 1,
            }
        }

        // Hand over the pass and wait until it is visible to readers
        let (ack_tx, ack_rx) = oneshot::channel();
        let complete = IngestItem::PassComplete {
            origin: self.origin.clone(),
            generation,
            ack: ack_tx,
        };
        match until_shutdown(&mut self.commands, &mut self.refresh_queued, self.ingest_tx.send(complete)).await {
            None => return self.interrupted(generation),
            Some(Err(_)) => return Flow::Stop,
            Some(Ok(())) => {}
        }
        match until_shutdown(&mut self.commands, &mut self.refresh_queued, ack_rx).await {
            None => return self.interrupted(generation),
            Some(Err(_)) => return Flow::Stop,
            Some(Ok(())) => {}
        }

        let elapsed = started.elapsed();
        self.metrics.passes_completed.inc();
        self.metrics.pass_duration.observe(elapsed);
        self.status.send_modify(|s| {
            s.generation = generation;
            s.passes_completed += 1;
            s.last_error = None;
            s.last_refresh = Some(Utc::now());
        });
        debug!(
            origin = %self.origin,
            generation,
            published,
            elapsed_ms = elapsed.as_millis() as u64,
            "Discovery pass complete"
        );

        Flow::Continue
    }

    /// Record a failed pass; the origin keeps its previous subtree
    async fn fail_pass(&mut self, generation: Generation, message: String) -> Flow {
        let failure = CatalogError::DiscoveryFailure {
            origin: self.origin.clone(),
            message,
        };
        warn!(generation, "{}", failure);
        self.metrics.passes_failed.inc();
        self.status.send_modify(|s| {
            s.passes_failed += 1;
            s.last_error = Some(failure.to_string());
        });

        let aborted = IngestItem::PassAborted {
            origin: self.origin.clone(),
            generation,
        };
        match until_shutdown(&mut self.commands, &mut self.refresh_queued, self.ingest_tx.send(aborted)).await {
            Some(Ok(())) => Flow::Continue,
            None | Some(Err(_)) => Flow::Stop,
        }
    }

    fn interrupted(&self, generation: Generation) -> Flow {
        debug!(origin = %self.origin, generation, "Discovery pass abandoned on shutdown");
        Flow::Stop
    }

    fn set_state(&self, state: WorkerState) {
        self.status.send_if_modified(|s| {
            if s.state == state {
                false
            } else {
                s.state = state;
                true
            }
        });
    }
}

/// Drive `fut` to completion unless a shutdown arrives first.
///
/// Refresh commands received meanwhile are queued rather than interrupting.
/// Returns `None` on shutdown or when every command sender is gone.
async fn until_shutdown<F: Future>(
    commands: &mut mpsc::Receiver<OriginCommand>,
    refresh_queued: &mut bool,
    fut: F,
) -> Option<F::Output> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(OriginCommand::Refresh) => *refresh_queued = true,
                Some(OriginCommand::Shutdown) | None => return None,
            },
            output = &mut fut => return Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorResult, Discovered, DiscoveryStream, StaticConnector};
    use crate::types::MetricPayload;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Connector whose discovery never produces anything
    #[derive(Debug)]
    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        fn kind(&self) -> &str {
            "hanging"
        }

        async fn discover(&self) -> ConnectorResult<DiscoveryStream> {
            Ok(futures::stream::pending().boxed())
        }
    }

    fn static_connector() -> Arc<dyn Connector> {
        Arc::new(StaticConnector::new(vec![
            Discovered::new("host1", "load", MetricPayload::Static { value: None }),
            Discovered::new("host1", "cpu", MetricPayload::Static { value: None }),
        ]))
    }

    #[tokio::test]
    async fn test_worker_publishes_tagged_records_then_completes() {
        let (ingest_tx, mut ingest_rx) = mpsc::channel(16);
        let handle = OriginWorker::spawn(
            "collectd".to_string(),
            static_connector(),
            ingest_tx,
            CatalogMetrics::shared(),
        );

        for expected in ["load", "cpu"] {
            match ingest_rx.recv().await.unwrap() {
                IngestItem::Record { generation, record } => {
                    assert_eq!(generation, 1);
                    assert_eq!(record.origin, "collectd");
                    assert_eq!(record.metric, expected);
                }
                _ => panic!("expected a record"),
            }
        }
        match ingest_rx.recv().await.unwrap() {
            IngestItem::PassComplete { generation, ack, .. } => {
                assert_eq!(generation, 1);
                ack.send(()).unwrap();
            }
            _ => panic!("expected pass completion"),
        }

        let mut status = handle.subscribe();
        let status = status.wait_for(|s| s.passes_completed == 1).await.unwrap().clone();
        assert_eq!(status.generation, 1);
        assert!(status.last_refresh.is_some());
    }

    #[tokio::test]
    async fn test_refresh_runs_next_generation() {
        let (ingest_tx, mut ingest_rx) = mpsc::channel(16);
        let handle = OriginWorker::spawn(
            "collectd".to_string(),
            static_connector(),
            ingest_tx,
            CatalogMetrics::shared(),
        );

        let mut completions = 0;
        while completions < 2 {
            match ingest_rx.recv().await.unwrap() {
                IngestItem::PassComplete { generation, ack, .. } => {
                    completions += 1;
                    assert_eq!(generation, completions);
                    ack.send(()).unwrap();
                    if completions == 1 {
                        handle.commands().send(OriginCommand::Refresh).await.unwrap();
                    }
                }
                IngestItem::Record { generation, .. } => assert_eq!(generation, completions + 1),
                IngestItem::PassAborted { .. } => panic!("unexpected abort"),
            }
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_discovery() {
        let (ingest_tx, _ingest_rx) = mpsc::channel(16);
        let mut handle = OriginWorker::spawn(
            "slow".to_string(),
            Arc::new(HangingConnector),
            ingest_tx,
            CatalogMetrics::shared(),
        );

        let mut status = handle.subscribe();
        status
            .wait_for(|s| s.state == WorkerState::Discovering)
            .await
            .unwrap();

        handle.commands().send(OriginCommand::Shutdown).await.unwrap();
        let task = handle.take_task().unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("worker did not stop in time")
            .unwrap();

        let status = handle.status();
        assert_eq!(status.state, WorkerState::Stopped);
        assert_eq!(status.passes_completed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_blocked_send() {
        // Capacity 1 and nobody reading: the second send blocks
        let (ingest_tx, _ingest_rx) = mpsc::channel(1);
        let mut handle = OriginWorker::spawn(
            "collectd".to_string(),
            static_connector(),
            ingest_tx,
            CatalogMetrics::shared(),
        );

        let mut status = handle.subscribe();
        status
            .wait_for(|s| s.state == WorkerState::Publishing)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        handle.commands().send(OriginCommand::Shutdown).await.unwrap();
        let task = handle.take_task().unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("worker did not stop in time")
            .unwrap();
        assert_eq!(handle.status().state, WorkerState::Stopped);
    }
}
