//! Connectors
//!
//! Pluggable discovery backends. Each configured origin gets one connector,
//! created from its [`ConnectorConfig`] by [`create_connector`].

pub mod file;
pub mod static_list;
pub mod traits;

pub use file::{FileConnector, DEFAULT_FILE_PATTERN};
pub use static_list::StaticConnector;
pub use traits::{Connector, ConnectorError, ConnectorResult, Discovered, DiscoveryStream};

use std::sync::Arc;

use tracing::info;

use crate::config::ConnectorConfig;

/// Create a connector from configuration
///
/// Returns an `Arc<dyn Connector>` that the origin worker keeps for its lifetime.
pub fn create_connector(config: &ConnectorConfig) -> ConnectorResult<Arc<dyn Connector>> {
    match config {
        ConnectorConfig::Static { entries } => {
            info!("Creating static connector with {} entries", entries.len());
            Ok(Arc::new(StaticConnector::from_config(entries)))
        }
        ConnectorConfig::File { path, pattern } => {
            info!("Creating file connector: path={}", path.display());
            Ok(Arc::new(FileConnector::new(path.clone(), pattern)?))
        }
    }
}
