//! Catalog Index
//!
//! The three-level entity tree: origins own sources, sources own metrics.
//! Parent links are stored as names and resolved through the index, so a
//! removed ancestor simply makes the lookup fail instead of keeping the
//! descendant alive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CatalogError, CatalogResult};
use crate::types::{EntityKind, Generation, MetricPayload, Name, Record};

/// Leaf entity: a named time series under a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    name: Name,
    source: Name,
    origin: Name,
    payload: MetricPayload,
}

impl Metric {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning source
    pub fn source_name(&self) -> &str {
        &self.source
    }

    /// Name of the owning origin
    pub fn origin_name(&self) -> &str {
        &self.origin
    }

    pub fn payload(&self) -> &MetricPayload {
        &self.payload
    }
}

/// A named entity (usually a host) exposing metrics under one origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    name: Name,
    origin: Name,
    metrics: HashMap<Name, Metric>,
}

impl Source {
    fn new(name: Name, origin: Name) -> Self {
        Self {
            name,
            origin,
            metrics: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning origin
    pub fn origin_name(&self) -> &str {
        &self.origin
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.values()
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }
}

/// A configured provider of catalog data, backed by one connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    name: Name,
    provider: Name,
    connector: Name,
    generation: Generation,
    sources: HashMap<Name, Source>,
}

impl Origin {
    pub fn new(name: impl Into<Name>, provider: impl Into<Name>, connector: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            connector: connector.into(),
            generation: 0,
            sources: HashMap::new(),
        }
    }

    /// Empty subtree sharing this origin's identity, used to stage a refresh
    pub fn empty_like(&self, generation: Generation) -> Self {
        Self {
            name: self.name.clone(),
            provider: self.provider.clone(),
            connector: self.connector.clone(),
            generation,
            sources: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the provider this origin belongs to
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Kind of connector feeding this origin
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// Generation of the discovery pass currently visible (0 before the first swap)
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn metric_count(&self) -> usize {
        self.sources.values().map(Source::metric_count).sum()
    }

    /// Create or update one source/metric leaf under this origin.
    ///
    /// Missing sources are created on the fly; an existing metric keeps its
    /// identity and only has its payload replaced.
    pub fn insert(&mut self, source: &str, metric: &str, payload: MetricPayload) {
        let origin_name = &self.name;
        let source_node = self
            .sources
            .entry(source.to_string())
            .or_insert_with(|| Source::new(source.to_string(), origin_name.clone()));

        match source_node.metrics.get_mut(metric) {
            Some(existing) => existing.payload = payload,
            None => {
                source_node.metrics.insert(
                    metric.to_string(),
                    Metric {
                        name: metric.to_string(),
                        source: source.to_string(),
                        origin: origin_name.clone(),
                        payload,
                    },
                );
            }
        }
    }
}

/// Owned snapshot of a metric together with its full ancestor chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: Name,
    pub source: Name,
    pub origin: Name,
    pub provider: Name,
    pub payload: MetricPayload,
}

impl MetricEntry {
    fn from_parts(origin: &Origin, metric: &Metric) -> Self {
        Self {
            name: metric.name.clone(),
            source: metric.source.clone(),
            origin: origin.name.clone(),
            provider: origin.provider.clone(),
            payload: metric.payload.clone(),
        }
    }
}

/// Root of the entity tree
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    origins: HashMap<Name, Origin>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an origin known from configuration before any record arrives
    pub fn register_origin(&mut self, name: &str, provider: &str, connector: &str) {
        self.origins
            .entry(name.to_string())
            .or_insert_with(|| Origin::new(name, provider, connector));
    }

    /// Insert a record, creating any missing ancestor.
    ///
    /// Never fails. Re-inserting an existing triple overwrites its payload.
    /// An origin created here without prior registration uses its own name
    /// as provider.
    pub fn insert(&mut self, record: Record) {
        trace!("Inserting {}", record);

        let origin = self
            .origins
            .entry(record.origin.clone())
            .or_insert_with(|| Origin::new(record.origin.as_str(), record.origin.as_str(), "unknown"));

        origin.insert(&record.source, &record.metric, record.payload);
    }

    /// Replace an origin's whole source/metric subtree with a staged one.
    ///
    /// The provider and connector labels of an already registered origin are
    /// kept.
    pub fn replace_origin(&mut self, staged: Origin) {
        match self.origins.get_mut(&staged.name) {
            Some(current) => {
                current.sources = staged.sources;
                current.generation = staged.generation;
            }
            None => {
                self.origins.insert(staged.name.clone(), staged);
            }
        }
    }

    /// Drop an origin and everything under it
    pub fn remove_origin(&mut self, name: &str) -> Option<Origin> {
        self.origins.remove(name)
    }

    pub fn origin(&self, name: &str) -> Option<&Origin> {
        self.origins.get(name)
    }

    pub fn origins(&self) -> impl Iterator<Item = &Origin> {
        self.origins.values()
    }

    /// Look up a metric, reporting which level was missing
    pub fn metric(&self, origin: &str, source: &str, name: &str) -> CatalogResult<&Metric> {
        let origin_node = self
            .origins
            .get(origin)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Origin, origin))?;
        let source_node = origin_node
            .sources
            .get(source)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Source, source))?;
        source_node
            .metrics
            .get(name)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Metric, name))
    }

    /// Look up a metric and copy it out with its ancestors resolved
    pub fn metric_entry(&self, origin: &str, source: &str, name: &str) -> CatalogResult<MetricEntry> {
        let metric = self.metric(origin, source, name)?;
        // metric() succeeded, so the origin exists
        let origin_node = self
            .origins
            .get(origin)
            .ok_or_else(|| CatalogError::not_found(EntityKind::Origin, origin))?;
        Ok(MetricEntry::from_parts(origin_node, metric))
    }

    /// Owning source of a metric, if it still exists
    pub fn source_of(&self, metric: &Metric) -> Option<&Source> {
        self.origins.get(&metric.origin)?.sources.get(&metric.source)
    }

    /// Owning origin of a source, if it still exists
    pub fn origin_of(&self, source: &Source) -> Option<&Origin> {
        self.origins.get(&source.origin)
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }

    pub fn source_count(&self) -> usize {
        self.origins.values().map(Origin::source_count).sum()
    }

    pub fn metric_count(&self) -> usize {
        self.origins.values().map(Origin::metric_count).sum()
    }
}
