//! Origin and connector configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::connector::DEFAULT_FILE_PATTERN;

fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

/// One entry of a static connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEntry {
    pub source: String,
    pub metric: String,
    /// Opaque value handed back with the metric payload
    #[serde(default)]
    pub value: Option<String>,
}

/// Connector configuration for an origin
///
/// ```toml
/// [[origins]]
/// name = "collectd"
/// provider = "prod"
///
/// [origins.connector]
/// type = "file"
/// path = "/var/lib/collectd/rrd"
/// pattern = '^(?P<source>[^/]+)/(?P<metric>.+)\.rrd$'
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectorConfig {
    /// Fixed list of entries declared inline
    Static {
        #[serde(default)]
        entries: Vec<StaticEntry>,
    },
    /// Files under a directory, mapped through a regex with `source` and `metric` groups
    File {
        path: PathBuf,
        #[serde(default = "default_file_pattern")]
        pattern: String,
    },
}

impl ConnectorConfig {
    /// Connector kind label, also the default provider name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::File { .. } => "file",
        }
    }
}

/// A configured origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Origin name, unique within the catalog
    pub name: String,
    /// Provider this origin belongs to (defaults to the connector kind)
    #[serde(default)]
    pub provider: Option<String>,
    /// Connector feeding the origin
    pub connector: ConnectorConfig,
}

impl OriginConfig {
    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or(self.connector.kind())
    }
}
