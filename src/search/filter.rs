//! Name filters for catalog queries

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{CatalogError, CatalogResult};

/// Explicit prefix forcing glob interpretation
const GLOB_PREFIX: &str = "glob:";

/// Characters that turn a filter into a glob
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Match applied to entity names
///
/// - empty string: matches every name
/// - `glob:` prefix, or any of `* ? [ {`: anchored glob over the whole name
/// - anything else: case-sensitive substring
#[derive(Debug, Clone, Default)]
pub enum NameFilter {
    #[default]
    Any,
    Substring(String),
    Glob(GlobMatcher),
}

impl NameFilter {
    pub fn parse(pattern: &str) -> CatalogResult<Self> {
        if pattern.is_empty() {
            return Ok(Self::Any);
        }

        let glob = match pattern.strip_prefix(GLOB_PREFIX) {
            Some(rest) => rest,
            None if pattern.contains(GLOB_META) => pattern,
            None => return Ok(Self::Substring(pattern.to_string())),
        };

        let matcher = GlobBuilder::new(glob)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| CatalogError::InvalidQuery(format!("invalid filter '{}': {}", pattern, e)))?
            .compile_matcher();
        Ok(Self::Glob(matcher))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Substring(needle) => name.contains(needle.as_str()),
            Self::Glob(matcher) => matcher.is_match(name),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}
