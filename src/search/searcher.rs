//! Read-side query engine over the catalog tree

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::filter::NameFilter;
use crate::catalog::{CatalogIndex, Origin, Source};
use crate::error::{CatalogError, CatalogResult};
use crate::types::{EntityKind, Name};

/// Limit value meaning "no limit" for the search operations
pub const UNLIMITED: i64 = -1;

/// A listing request: which entity kind to list and the filters to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub kind: EntityKind,
    /// Filter on origin names
    #[serde(default)]
    pub origin: String,
    /// Filter on source names (metrics only)
    #[serde(default)]
    pub source: String,
    /// Filter on the listed entity's own name
    #[serde(default)]
    pub name: String,
}

impl CatalogQuery {
    pub fn origins(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Origin,
            origin: String::new(),
            source: String::new(),
            name: name.into(),
        }
    }

    pub fn sources(origin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Source,
            origin: origin.into(),
            source: String::new(),
            name: name.into(),
        }
    }

    pub fn metrics(origin: impl Into<String>, source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Metric,
            origin: origin.into(),
            source: source.into(),
            name: name.into(),
        }
    }
}

/// One page of distinct names plus the match count before pagination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub items: Vec<Name>,
    pub total: usize,
}

/// Restricts an entity-detail lookup to exact origin and source names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub origin: Option<Name>,
    pub source: Option<Name>,
}

impl Scope {
    fn origin_in_scope(&self, origin: &Origin) -> bool {
        self.origin.as_deref().map_or(true, |o| o == origin.name())
    }

    fn source_in_scope(&self, source: &Source) -> bool {
        self.source.as_deref().map_or(true, |s| s == source.name())
    }
}

/// Everything that exposes an entity of a given name, aggregated over origins
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDetail {
    pub kind: EntityKind,
    pub name: Name,
    pub origins: Vec<Name>,
    /// Owning sources; empty unless `kind` is `Metric`
    pub sources: Vec<Name>,
    pub providers: Vec<Name>,
}

/// Number of distinct names at each level of the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub origins: usize,
    pub sources: usize,
    pub metrics: usize,
}

/// Query engine. Cheap to clone; every call takes the tree's read lock for
/// its own duration and never waits on discovery.
#[derive(Clone)]
pub struct Searcher {
    index: Arc<RwLock<CatalogIndex>>,
}

impl Searcher {
    pub fn new(index: Arc<RwLock<CatalogIndex>>) -> Self {
        Self { index }
    }

    /// Distinct origin names matching `filter`, sorted
    pub fn origins(&self, filter: &str, limit: i64) -> CatalogResult<Vec<Name>> {
        let names = self.matching(&CatalogQuery::origins(filter))?;
        truncate(names, limit)
    }

    /// Distinct source names matching `name_filter` under origins matching
    /// `origin_filter`, sorted
    pub fn sources(&self, origin_filter: &str, name_filter: &str, limit: i64) -> CatalogResult<Vec<Name>> {
        let names = self.matching(&CatalogQuery::sources(origin_filter, name_filter))?;
        truncate(names, limit)
    }

    /// Distinct metric names, scoped by origin and source filters, sorted
    pub fn metrics(
        &self,
        origin_filter: &str,
        source_filter: &str,
        name_filter: &str,
        limit: i64,
    ) -> CatalogResult<Vec<Name>> {
        let names = self.matching(&CatalogQuery::metrics(origin_filter, source_filter, name_filter))?;
        truncate(names, limit)
    }

    /// Paginate the distinct matches of `query`.
    ///
    /// `limit == 0` returns everything from `offset`. Negative values are
    /// rejected rather than clamped.
    pub fn list(&self, query: &CatalogQuery, offset: i64, limit: i64) -> CatalogResult<Page> {
        if offset < 0 {
            return Err(CatalogError::InvalidQuery(format!("offset must not be negative, got {}", offset)));
        }
        if limit < 0 {
            return Err(CatalogError::InvalidQuery(format!("limit must not be negative, got {}", limit)));
        }

        let names = self.matching(query)?;
        let total = names.len();
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = match limit {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };

        let items: Vec<Name> = names.into_iter().skip(offset).take(take).collect();
        debug!(
            kind = %query.kind,
            total,
            returned = items.len(),
            "Listed catalog entries"
        );
        Ok(Page { items, total })
    }

    /// Aggregate the origins, sources and providers exposing `name`.
    ///
    /// Only exact name matches count. No match at all is `NotFound`.
    pub fn detail(&self, kind: EntityKind, name: &str, scope: &Scope) -> CatalogResult<EntityDetail> {
        let index = self.index.read();
        let mut origins = BTreeSet::new();
        let mut sources = BTreeSet::new();
        let mut providers = BTreeSet::new();

        for origin in index.origins().filter(|o| scope.origin_in_scope(o)) {
            let found = match kind {
                EntityKind::Origin => origin.name() == name,
                EntityKind::Source => origin.source(name).is_some_and(|s| scope.source_in_scope(s)),
                EntityKind::Metric => {
                    let mut found = false;
                    for source in origin.sources().filter(|s| scope.source_in_scope(s)) {
                        if source.metric(name).is_some() {
                            sources.insert(source.name().to_string());
                            found = true;
                        }
                    }
                    found
                }
            };

            if found {
                origins.insert(origin.name().to_string());
                providers.insert(origin.provider().to_string());
            }
        }

        if origins.is_empty() {
            return Err(CatalogError::not_found(kind, name));
        }

        Ok(EntityDetail {
            kind,
            name: name.to_string(),
            origins: origins.into_iter().collect(),
            sources: sources.into_iter().collect(),
            providers: providers.into_iter().collect(),
        })
    }

    /// Distinct name counts for the catalog root
    pub fn counts(&self) -> CatalogCounts {
        let index = self.index.read();
        let mut sources = BTreeSet::new();
        let mut metrics = BTreeSet::new();
        for origin in index.origins() {
            for source in origin.sources() {
                sources.insert(source.name());
                metrics.extend(source.metrics().map(|m| m.name()));
            }
        }
        CatalogCounts {
            origins: index.origin_count(),
            sources: sources.len(),
            metrics: metrics.len(),
        }
    }

    /// Distinct names matching `query`, in ascending order
    fn matching(&self, query: &CatalogQuery) -> CatalogResult<BTreeSet<Name>> {
        let origin_filter = NameFilter::parse(&query.origin)?;
        let source_filter = NameFilter::parse(&query.source)?;
        let name_filter = NameFilter::parse(&query.name)?;

        let index = self.index.read();
        let mut names = BTreeSet::new();

        for origin in index.origins().filter(|o| origin_filter.matches(o.name())) {
            match query.kind {
                EntityKind::Origin => {
                    if name_filter.matches(origin.name()) {
                        names.insert(origin.name().to_string());
                    }
                }
                EntityKind::Source => {
                    names.extend(
                        origin
                            .sources()
                            .filter(|s| name_filter.matches(s.name()))
                            .map(|s| s.name().to_string()),
                    );
                }
                EntityKind::Metric => {
                    for source in origin.sources().filter(|s| source_filter.matches(s.name())) {
                        names.extend(
                            source
                                .metrics()
                                .filter(|m| name_filter.matches(m.name()))
                                .map(|m| m.name().to_string()),
                        );
                    }
                }
            }
        }

        Ok(names)
    }
}

/// Keep at most `limit` names. `-1` and `0` both mean no limit, matching
/// `limit = 0` in [`Searcher::list`].
fn truncate(names: BTreeSet<Name>, limit: i64) -> CatalogResult<Vec<Name>> {
    match limit {
        UNLIMITED | 0 => Ok(names.into_iter().collect()),
        n if n < 0 => Err(CatalogError::InvalidQuery(format!(
            "limit must be -1 or non-negative, got {}",
            n
        ))),
        n => Ok(names
            .into_iter()
            .take(usize::try_from(n).unwrap_or(usize::MAX))
            .collect()),
    }
}
