//! Connector trait definitions
//!
//! A connector is the discovery capability behind one origin. The catalog only
//! consumes the stream of discovered entries; how a connector talks to its
//! backend is its own business.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::types::{MetricPayload, Name};

/// Errors that can occur during discovery
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Filesystem or network I/O failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal failed
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Discovery pattern is unusable
    #[error("Invalid pattern: {0}")]
    Pattern(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for connector operations
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// One source/metric pair found by a connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub source: Name,
    pub metric: Name,
    pub payload: MetricPayload,
}

impl Discovered {
    pub fn new(source: impl Into<Name>, metric: impl Into<Name>, payload: MetricPayload) -> Self {
        Self {
            source: source.into(),
            metric: metric.into(),
            payload,
        }
    }
}

/// Lazy, finite sequence of discovered entries.
///
/// The end of the stream marks pass completion; an `Err` item aborts the pass.
pub type DiscoveryStream = BoxStream<'static, ConnectorResult<Discovered>>;

/// Discovery capability of a backend
///
/// Implementations must be cheap to call repeatedly: every refresh of the
/// origin calls `discover` again and expects a complete listing.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Connector kind label (e.g., "static", "file")
    fn kind(&self) -> &str;

    /// Start one discovery pass
    async fn discover(&self) -> ConnectorResult<DiscoveryStream>;
}
