//! Configuration for seriesdex

mod catalog;
mod logging;
mod origin;

pub use catalog::CatalogSettings;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use origin::{ConnectorConfig, OriginConfig, StaticEntry};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::connector::file::compile_pattern;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog runtime configuration
    #[serde(default)]
    pub catalog: CatalogSettings,
    /// Configured origins, one worker each
    #[serde(default)]
    pub origins: Vec<OriginConfig>,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        Self::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = self.catalog.problems();

        let mut seen = HashSet::new();
        for origin in &self.origins {
            if origin.name.is_empty() {
                errors.push("origin name must not be empty".to_string());
                continue;
            }
            if !seen.insert(origin.name.as_str()) {
                errors.push(format!("duplicate origin name '{}'", origin.name));
            }
            if origin.provider.as_deref() == Some("") {
                errors.push(format!("origin '{}': provider must not be empty", origin.name));
            }

            match &origin.connector {
                ConnectorConfig::File { path, pattern } => {
                    if path.as_os_str().is_empty() {
                        errors.push(format!("origin '{}': file connector path must not be empty", origin.name));
                    }
                    if let Err(e) = compile_pattern(pattern) {
                        errors.push(format!("origin '{}': {}", origin.name, e));
                    }
                }
                ConnectorConfig::Static { entries } => {
                    if entries.iter().any(|e| e.source.is_empty() || e.metric.is_empty()) {
                        errors.push(format!(
                            "origin '{}': static entries need a source and a metric name",
                            origin.name
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
