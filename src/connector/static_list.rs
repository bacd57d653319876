//! Connector serving a fixed list of entries from configuration

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::traits::{Connector, ConnectorResult, Discovered, DiscoveryStream};
use crate::config::StaticEntry;
use crate::types::MetricPayload;

/// Connector replaying a fixed list of entries on every pass
#[derive(Debug, Clone, Default)]
pub struct StaticConnector {
    entries: Vec<Discovered>,
}

impl StaticConnector {
    pub fn new(entries: Vec<Discovered>) -> Self {
        Self { entries }
    }

    /// Build from configured entries
    pub fn from_config(entries: &[StaticEntry]) -> Self {
        let entries = entries
            .iter()
            .map(|e| {
                Discovered::new(
                    e.source.clone(),
                    e.metric.clone(),
                    MetricPayload::Static {
                        value: e.value.clone(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Connector for StaticConnector {
    fn kind(&self) -> &str {
        "static"
    }

    async fn discover(&self) -> ConnectorResult<DiscoveryStream> {
        Ok(stream::iter(self.entries.clone().into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_connector_replays_entries() {
        let connector = StaticConnector::from_config(&[
            StaticEntry {
                source: "host1".to_string(),
                metric: "cpu.idle".to_string(),
                value: None,
            },
            StaticEntry {
                source: "host2".to_string(),
                metric: "load".to_string(),
                value: Some("x".to_string()),
            },
        ]);
        assert_eq!(connector.len(), 2);

        for _ in 0..2 {
            let found: Vec<_> = connector
                .discover()
                .await
                .unwrap()
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .map(|r| r.unwrap())
                .collect();
            assert_eq!(found.len(), 2);
            assert_eq!(found[1].source, "host2");
            assert_eq!(
                found[1].payload,
                MetricPayload::Static {
                    value: Some("x".to_string())
                }
            );
        }
    }
}
