//! Core types for the catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Name of an origin, source or metric
pub type Name = String;

/// Discovery pass number of one origin. Starts at 1, strictly increasing.
pub type Generation = u64;

// ============================================================================
// Entity Kinds
// ============================================================================

/// The three levels of the catalog tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Origin,
    Source,
    Metric,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Source => "source",
            Self::Metric => "metric",
        }
    }

    /// Parse the plural collection name used by API consumers ("origins", "sources", "metrics")
    pub fn from_collection(name: &str) -> Option<Self> {
        match name {
            "origins" => Some(Self::Origin),
            "sources" => Some(Self::Source),
            "metrics" => Some(Self::Metric),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Connector Payload
// ============================================================================

/// Connector-specific data attached to a metric.
///
/// The catalog never interprets it; it is carried along so the sample
/// fetching layer knows how to reach the underlying series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "connector", rename_all = "lowercase")]
pub enum MetricPayload {
    /// Entry declared inline in the configuration
    Static {
        #[serde(default)]
        value: Option<String>,
    },
    /// Entry backed by a file on disk
    File { path: PathBuf },
}

impl MetricPayload {
    /// Connector kind that produced the payload
    pub fn connector(&self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::File { .. } => "file",
        }
    }
}

// ============================================================================
// Ingestion Record
// ============================================================================

/// One discovered origin/source/metric triple plus its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub origin: Name,
    pub source: Name,
    pub metric: Name,
    pub payload: MetricPayload,
}

impl Record {
    pub fn new(
        origin: impl Into<Name>,
        source: impl Into<Name>,
        metric: impl Into<Name>,
        payload: MetricPayload,
    ) -> Self {
        Self {
            origin: origin.into(),
            source: source.into(),
            metric: metric.into(),
            payload,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Origin: \"{}\", Source: \"{}\", Metric: \"{}\"}}",
            self.origin, self.source, self.metric
        )
    }
}
