//! Catalog error types

use thiserror::Error;

use crate::types::EntityKind;

/// Result type for catalog and search operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors surfaced by the catalog and the searcher
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Named entity does not exist, or an entity-detail lookup matched nothing
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    /// Negative offset/limit or a malformed filter pattern
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Connector failed during a discovery pass. Only ever logged and counted;
    /// carried in worker status, never returned from the search API.
    #[error("Discovery failed for origin '{origin}': {message}")]
    DiscoveryFailure { origin: String, message: String },

    /// Catalog has been closed and no longer accepts commands
    #[error("Catalog is closed")]
    Closed,
}

impl CatalogError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
