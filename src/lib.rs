//! seriesdex: live catalog of time-series identifiers
//!
//! Keeps an index of origins, sources and metrics discovered from pluggable
//! backends, and serves filtered, paginated and aggregated views of it:
//! - One discovery worker per origin, driven by a [`connector::Connector`]
//! - A single mutator task owning every change to the tree
//! - Refresh passes swapped in atomically per origin (mark and swap)
//! - A [`search::Searcher`] safe to use while discovery is running

pub mod catalog;
pub mod config;
pub mod connector;
pub mod error;
pub mod search;
pub mod types;

pub use catalog::{Catalog, CatalogBuilder};
pub use config::Config;
pub use error::{CatalogError, CatalogResult};
pub use search::Searcher;
pub use types::*;
