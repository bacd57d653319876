//! Filesystem connector
//!
//! Walks a directory tree and maps each file's relative path to a
//! source/metric pair through a regex with `source` and `metric` named
//! groups, e.g. `^(?P<source>[^/]+)/(?P<metric>.+)\.rrd$`.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use walkdir::WalkDir;

use super::traits::{Connector, ConnectorError, ConnectorResult, Discovered, DiscoveryStream};
use crate::types::MetricPayload;

/// Pattern used when the configuration does not provide one
pub const DEFAULT_FILE_PATTERN: &str = r"^(?P<source>[^/]+)/(?P<metric>.+)$";

/// Entries buffered between the blocking walker and the discovery stream
const DISCOVERY_BUFFER: usize = 64;

/// Connector discovering metrics from files under a root directory
#[derive(Debug, Clone)]
pub struct FileConnector {
    root: PathBuf,
    pattern: Regex,
}

impl FileConnector {
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> ConnectorResult<Self> {
        let pattern = compile_pattern(pattern)?;
        Ok(Self {
            root: root.into(),
            pattern,
        })
    }

    /// Map a `/`-separated relative path to a (source, metric) pair
    pub fn match_path(&self, relative: &str) -> Option<(String, String)> {
        let captures = self.pattern.captures(relative)?;
        let source = captures.name("source")?.as_str();
        let metric = captures.name("metric")?.as_str();
        if source.is_empty() || metric.is_empty() {
            return None;
        }
        Some((source.to_string(), metric.to_string()))
    }

    /// Blocking directory walk feeding the discovery stream
    fn walk(&self, tx: mpsc::Sender<ConnectorResult<Discovered>>) {
        for entry in WalkDir::new(&self.root).follow_links(true).sort_by_file_name() {
            let item = match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                        continue;
                    };
                    let relative = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    match self.match_path(&relative) {
                        Some((source, metric)) => Ok(Discovered::new(
                            source,
                            metric,
                            MetricPayload::File {
                                path: entry.path().to_path_buf(),
                            },
                        )),
                        None => continue,
                    }
                }
                Err(e) => Err(ConnectorError::Walk(e)),
            };

            let failed = item.is_err();
            if tx.blocking_send(item).is_err() {
                debug!("Discovery stream for {} dropped, stopping walk", self.root.display());
                return;
            }
            if failed {
                return;
            }
        }
    }
}

/// Compile a discovery pattern and check it exposes the required groups
pub fn compile_pattern(pattern: &str) -> ConnectorResult<Regex> {
    let regex = Regex::new(pattern).map_err(|e| ConnectorError::Pattern(e.to_string()))?;
    for group in ["source", "metric"] {
        if !regex.capture_names().flatten().any(|name| name == group) {
            return Err(ConnectorError::Pattern(format!(
                "pattern '{}' has no named group '{}'",
                pattern, group
            )));
        }
    }
    Ok(regex)
}

#[async_trait]
impl Connector for FileConnector {
    fn kind(&self) -> &str {
        "file"
    }

    async fn discover(&self) -> ConnectorResult<DiscoveryStream> {
        let metadata = tokio::fs::metadata(&self.root).await?;
        if !metadata.is_dir() {
            return Err(ConnectorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a directory", self.root.display()),
            )));
        }

        let (tx, rx) = mpsc::channel(DISCOVERY_BUFFER);
        let connector = self.clone();
        tokio::task::spawn_blocking(move || connector.walk(tx));

        Ok(ReceiverStream::new(rx).boxed())
    }
}
