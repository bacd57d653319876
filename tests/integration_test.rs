//! Integration tests for seriesdex
//!
//! Drive a full catalog (workers, mutator, searcher) through scripted
//! connectors and the file connector.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use seriesdex::catalog::{CatalogBuilder, WorkerState};
use seriesdex::config::{CatalogSettings, Config};
use seriesdex::connector::{Connector, ConnectorError, ConnectorResult, Discovered, DiscoveryStream};
use seriesdex::search::{CatalogQuery, Scope, UNLIMITED};
use seriesdex::{Catalog, CatalogError, EntityKind, MetricPayload};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

/// What one discovery pass of a scripted connector does
#[derive(Debug, Clone)]
enum Pass {
    Entries(Vec<(String, String)>),
    FailOpen,
    FailAfter(Vec<(String, String)>),
    Hang,
}

/// Plays its passes in order, then repeats the last one
#[derive(Debug)]
struct ScriptedConnector {
    passes: Mutex<Vec<Pass>>,
}

impl ScriptedConnector {
    fn new(passes: Vec<Pass>) -> Arc<dyn Connector> {
        Arc::new(Self {
            passes: Mutex::new(passes),
        })
    }
}

fn discovered((source, metric): (String, String)) -> ConnectorResult<Discovered> {
    Ok(Discovered::new(source, metric, MetricPayload::Static { value: None }))
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn kind(&self) -> &str {
        "scripted"
    }

    async fn discover(&self) -> ConnectorResult<DiscoveryStream> {
        let pass = {
            let mut passes = self.passes.lock();
            if passes.len() > 1 {
                passes.remove(0)
            } else {
                passes[0].clone()
            }
        };

        match pass {
            Pass::Entries(entries) => Ok(stream::iter(entries.into_iter().map(discovered)).boxed()),
            Pass::FailOpen => Err(ConnectorError::Other(anyhow::anyhow!("backend unreachable"))),
            Pass::FailAfter(entries) => {
                let failure = stream::once(async {
                    Err(ConnectorError::Other(anyhow::anyhow!("connection reset")))
                });
                Ok(stream::iter(entries.into_iter().map(discovered)).chain(failure).boxed())
            }
            Pass::Hang => Ok(stream::pending().boxed()),
        }
    }
}

fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(s, m)| (s.to_string(), m.to_string())).collect()
}

fn metrics_of(catalog: &Catalog, origin: &str) -> Vec<String> {
    catalog.searcher().metrics(origin, "", "", UNLIMITED).unwrap()
}

async fn wait_passes(catalog: &Catalog, origin: &str, passes: u64) {
    tokio::time::timeout(WAIT, catalog.wait_for_passes(origin, passes))
        .await
        .expect("discovery pass did not finish in time")
        .unwrap();
}

#[tokio::test]
async fn test_refresh_replaces_origin_subtree() {
    let catalog = CatalogBuilder::new(CatalogSettings::default())
        .origin(
            "collectd",
            "prod",
            ScriptedConnector::new(vec![
                Pass::Entries(entries(&[("host1", "a"), ("host1", "b"), ("host1", "c")])),
                Pass::Entries(entries(&[("host1", "a"), ("host1", "d")])),
            ]),
        )
        .start()
        .unwrap();

    wait_passes(&catalog, "collectd", 1).await;
    assert_eq!(metrics_of(&catalog, "collectd"), vec!["a", "b", "c"]);

    catalog.refresh("collectd").unwrap();
    wait_passes(&catalog, "collectd", 2).await;

    assert_eq!(metrics_of(&catalog, "collectd"), vec!["a", "d"]);
    assert!(catalog.get_metric("collectd", "host1", "b").unwrap_err().is_not_found());
    assert_eq!(catalog.worker_status("collectd").unwrap().generation, 2);

    catalog.close().await.unwrap();
}

#[tokio::test]
async fn test_overlapping_origins_form_union() {
    let catalog = CatalogBuilder::new(CatalogSettings::default())
        .origin(
            "a",
            "prod",
            ScriptedConnector::new(vec![Pass::Entries(entries(&[("host1", "load"), ("host2", "load")]))]),
        )
        .origin(
            "b",
            "lab",
            ScriptedConnector::new(vec![Pass::Entries(entries(&[("host2", "load"), ("host3", "cpu")]))]),
        )
        .start()
        .unwrap();
    tokio::time::timeout(WAIT, catalog.wait_settled()).await.unwrap().unwrap();

    let searcher = catalog.searcher();
    assert_eq!(searcher.sources("", "", UNLIMITED).unwrap(), vec!["host1", "host2", "host3"]);
    assert_eq!(searcher.sources("", "host2", UNLIMITED).unwrap(), vec!["host2"]);
    assert_eq!(searcher.metrics("", "", "", UNLIMITED).unwrap(), vec!["cpu", "load"]);

    let detail = searcher.detail(EntityKind::Source, "host2", &Scope::default()).unwrap();
    assert_eq!(detail.origins, vec!["a", "b"]);
    assert_eq!(detail.providers, vec!["lab", "prod"]);

    let page = searcher.list(&CatalogQuery::sources("", ""), 1, 1).unwrap();
    assert_eq!(page.items, vec!["host2"]);
    assert_eq!(page.total, 3);

    catalog.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_origins_build_exact_union() {
    const ORIGINS: usize = 8;
    const SOURCES: usize = 10;
    const METRICS: usize = 20;

    // Origin i reports hosts i..i+10, so neighbouring origins share most hosts
    // and every origin shares every metric name
    let mut expected = BTreeSet::new();
    let settings = CatalogSettings {
        ingest_queue_size: 1,
        ..CatalogSettings::default()
    };
    let mut builder = CatalogBuilder::new(settings);
    for o in 0..ORIGINS {
        let origin = format!("origin-{}", o);
        let mut pairs = Vec::new();
        for s in 0..SOURCES {
            let source = format!("host{:02}", o + s);
            for m in 0..METRICS {
                let metric = format!("metric{:02}", m);
                expected.insert((origin.clone(), source.clone(), metric.clone()));
                pairs.push((source.clone(), metric));
            }
        }
        builder = builder.origin(origin, "prod", ScriptedConnector::new(vec![Pass::Entries(pairs)]));
    }
    let catalog = builder.start().unwrap();
    tokio::time::timeout(WAIT, catalog.wait_settled()).await.unwrap().unwrap();

    for (origin, source, metric) in &expected {
        let entry = catalog.get_metric(origin, source, metric).unwrap();
        assert_eq!((&entry.origin, &entry.source, &entry.name), (origin, source, metric));
    }

    // Walk the whole tree and compare with the expected triples
    let searcher = catalog.searcher();
    let mut seen = BTreeSet::new();
    for origin in searcher.origins("", UNLIMITED).unwrap() {
        let origin_filter = format!("glob:{}", origin);
        for source in searcher.sources(&origin_filter, "", UNLIMITED).unwrap() {
            let source_filter = format!("glob:{}", source);
            for metric in searcher.metrics(&origin_filter, &source_filter, "", UNLIMITED).unwrap() {
                seen.insert((origin.clone(), source.clone(), metric));
            }
        }
    }
    assert_eq!(seen, expected);
    assert_eq!(expected.len(), ORIGINS * SOURCES * METRICS);
    assert_eq!(catalog.metrics().snapshot().records_applied, expected.len() as u64);

    let counts = searcher.counts();
    assert_eq!(counts.origins, ORIGINS);
    assert_eq!(counts.sources, ORIGINS + SOURCES - 1);
    assert_eq!(counts.metrics, METRICS);

    catalog.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_pass_keeps_previous_subtree() {
    let catalog = CatalogBuilder::new(CatalogSettings::default())
        .origin(
            "flaky",
            "prod",
            ScriptedConnector::new(vec![
                Pass::Entries(entries(&[("host1", "a")])),
                Pass::FailAfter(entries(&[("host1", "b"), ("host1", "c")])),
                Pass::FailOpen,
            ]),
        )
        .origin(
            "steady",
            "prod",
            ScriptedConnector::new(vec![Pass::Entries(entries(&[("host9", "z")]))]),
        )
        .start()
        .unwrap();
    tokio::time::timeout(WAIT, catalog.wait_settled()).await.unwrap().unwrap();

    catalog.refresh("flaky").unwrap();
    wait_passes(&catalog, "flaky", 2).await;
    assert_eq!(metrics_of(&catalog, "flaky"), vec!["a"]);

    catalog.refresh("flaky").unwrap();
    wait_passes(&catalog, "flaky", 3).await;
    assert_eq!(metrics_of(&catalog, "flaky"), vec!["a"]);

    let status = catalog.worker_status("flaky").unwrap();
    assert_eq!(status.passes_completed, 1);
    assert_eq!(status.passes_failed, 2);
    assert_eq!(status.generation, 1);
    assert!(status.last_error.unwrap().contains("backend unreachable"));

    // The other origin is unaffected
    assert_eq!(metrics_of(&catalog, "steady"), vec!["z"]);
    assert_eq!(catalog.worker_status("steady").unwrap().passes_failed, 0);
    assert_eq!(catalog.metrics().snapshot().passes_failed, 2);

    catalog.close().await.unwrap();
}

#[tokio::test]
async fn test_close_interrupts_hanging_discovery() {
    let catalog = CatalogBuilder::new(CatalogSettings::default())
        .origin("stuck", "prod", ScriptedConnector::new(vec![Pass::Hang]))
        .origin(
            "fine",
            "prod",
            ScriptedConnector::new(vec![Pass::Entries(entries(&[("host1", "load")]))]),
        )
        .start()
        .unwrap();
    wait_passes(&catalog, "fine", 1).await;

    tokio::time::timeout(Duration::from_secs(2), catalog.close())
        .await
        .expect("close waited on a hanging connector")
        .unwrap();

    assert_eq!(catalog.worker_status("stuck").unwrap().state, WorkerState::Stopped);
    assert_eq!(catalog.worker_status("fine").unwrap().state, WorkerState::Stopped);
    assert_eq!(catalog.metrics().snapshot().active_workers, 0);
}

#[tokio::test]
async fn test_closed_catalog_rejects_refresh_but_serves_reads() {
    let catalog = CatalogBuilder::new(CatalogSettings::default())
        .origin(
            "collectd",
            "prod",
            ScriptedConnector::new(vec![Pass::Entries(entries(&[("host1", "load")]))]),
        )
        .start()
        .unwrap();
    wait_passes(&catalog, "collectd", 1).await;
    catalog.close().await.unwrap();

    assert!(matches!(catalog.refresh("collectd"), Err(CatalogError::Closed)));
    assert!(matches!(catalog.refresh_all(), Err(CatalogError::Closed)));
    assert_eq!(metrics_of(&catalog, "collectd"), vec!["load"]);
    assert!(catalog.get_metric("collectd", "host1", "load").is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_never_see_partial_refresh() {
    let old: Vec<(String, String)> = (0..50).map(|i| ("host".to_string(), format!("old{:02}", i))).collect();
    let new: Vec<(String, String)> = (0..50).map(|i| ("host".to_string(), format!("new{:02}", i))).collect();

    let settings = CatalogSettings {
        ingest_queue_size: 2,
        ..CatalogSettings::default()
    };
    let catalog = Arc::new(
        CatalogBuilder::new(settings)
            .origin(
                "collectd",
                "prod",
                ScriptedConnector::new(vec![Pass::Entries(old), Pass::Entries(new)]),
            )
            .start()
            .unwrap(),
    );
    wait_passes(&catalog, "collectd", 1).await;

    let reader = {
        let catalog = catalog.clone();
        tokio::spawn(async move {
            let searcher = catalog.searcher();
            loop {
                let names = searcher.metrics("", "", "", UNLIMITED).unwrap();
                assert_eq!(names.len(), 50, "saw a partial subtree");
                let all_old = names.iter().all(|n| n.starts_with("old"));
                let all_new = names.iter().all(|n| n.starts_with("new"));
                assert!(all_old || all_new, "saw a mix of two passes");
                if all_new {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
    };

    catalog.refresh("collectd").unwrap();
    wait_passes(&catalog, "collectd", 2).await;
    tokio::time::timeout(WAIT, reader).await.unwrap().unwrap();

    catalog.close().await.unwrap();
}

#[tokio::test]
async fn test_file_connector_end_to_end() {
    let tmp = TempDir::new().unwrap();
    for path in ["web1/cpu.rrd", "web1/load.rrd", "web2/load.rrd", "web2/notes.txt"] {
        let full = tmp.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, b"").unwrap();
    }

    let config = Config::from_toml(&format!(
        r#"
        [[origins]]
        name = "rrd"
        provider = "collectd"
        [origins.connector]
        type = "file"
        path = '{}'
        pattern = '^(?P<source>[^/]+)/(?P<metric>.+)\.rrd$'
        "#,
        tmp.path().display()
    ))
    .unwrap();

    let catalog = Catalog::start(&config).unwrap();
    tokio::time::timeout(WAIT, catalog.wait_settled()).await.unwrap().unwrap();

    let searcher = catalog.searcher();
    assert_eq!(searcher.sources("rrd", "", UNLIMITED).unwrap(), vec!["web1", "web2"]);
    assert_eq!(searcher.metrics("", "web1", "", UNLIMITED).unwrap(), vec!["cpu", "load"]);

    let entry = catalog.get_metric("rrd", "web2", "load").unwrap();
    assert_eq!(entry.provider, "collectd");
    assert_eq!(
        entry.payload,
        MetricPayload::File {
            path: tmp.path().join("web2/load.rrd")
        }
    );

    // New files show up after a refresh, removed ones disappear
    std::fs::remove_file(tmp.path().join("web1/cpu.rrd")).unwrap();
    std::fs::write(tmp.path().join("web2/disk.rrd"), b"").unwrap();
    catalog.refresh("rrd").unwrap();
    wait_passes(&catalog, "rrd", 2).await;

    assert_eq!(searcher.metrics("", "", "", UNLIMITED).unwrap(), vec!["disk", "load"]);
    assert_eq!(searcher.counts().metrics, 2);

    catalog.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_file_root_is_a_discovery_failure() {
    let tmp = TempDir::new().unwrap();
    let config = Config::from_toml(&format!(
        r#"
        [[origins]]
        name = "rrd"
        [origins.connector]
        type = "file"
        path = '{}'
        "#,
        tmp.path().join("missing").display()
    ))
    .unwrap();

    let catalog = Catalog::start(&config).unwrap();
    tokio::time::timeout(WAIT, catalog.wait_settled()).await.unwrap().unwrap();

    let status = catalog.worker_status("rrd").unwrap();
    assert_eq!(status.passes_failed, 1);
    assert!(status.last_error.is_some());
    // The origin is known but empty
    assert_eq!(catalog.searcher().origins("", UNLIMITED).unwrap(), vec!["rrd"]);
    assert!(metrics_of(&catalog, "rrd").is_empty());

    catalog.close().await.unwrap();
}
