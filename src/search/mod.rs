//! Catalog search
//!
//! Filtered, deduplicated and paginated views over the entity tree, plus
//! cross-origin aggregation for entity details.

mod filter;
mod searcher;

pub use filter::NameFilter;
pub use searcher::{CatalogCounts, CatalogQuery, EntityDetail, Page, Scope, Searcher, UNLIMITED};
