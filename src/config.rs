//! Configuration
//!
//! Layered loading: built-in defaults, then an optional TOML file, then
//! `ARBOR_*` environment overrides with `__` as the nested-key separator
//! (e.g. `ARBOR_DATABASE__URL`).

use crate::error::FsError;
use crate::logging::LoggingConfig;
use crate::perms::DEFAULT_MASK;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArborConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub node: NodeDefaults,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relational store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:arbor.db` or `sqlite::memory:`.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Pool size for file-backed databases.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Search windowing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result count when the caller does not pass a limit.
    #[serde(default = "default_search_limit")]
    pub default_limit: i64,

    /// Hard cap on any requested limit.
    #[serde(default = "default_search_max_limit")]
    pub max_limit: i64,

    /// Candidate-window size as a multiple of the limit, fetched
    /// pre-permission-filter.
    #[serde(default = "default_window_multiplier")]
    pub window_multiplier: i64,
}

/// Defaults applied to newly created nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefaults {
    /// Mask for nodes created without explicit permissions.
    #[serde(default = "default_permissions")]
    pub permissions: i64,
}

fn default_database_url() -> String {
    "sqlite:arbor.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_search_limit() -> i64 {
    100
}

fn default_search_max_limit() -> i64 {
    500
}

fn default_window_multiplier() -> i64 {
    2
}

fn default_permissions() -> i64 {
    DEFAULT_MASK
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            max_limit: default_search_max_limit(),
            window_multiplier: default_window_multiplier(),
        }
    }
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            permissions: default_permissions(),
        }
    }
}

impl ArborConfig {
    /// Load configuration. An explicit file must exist; otherwise an
    /// `arbor.toml` in the working directory is merged when present.
    pub fn load(file: Option<&Path>) -> Result<Self, FsError> {
        let mut builder = Config::builder();
        builder = match file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("arbor").required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix("ARBOR")
                .separator("__")
                .try_parsing(true),
        );
        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| FsError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArborConfig::default();
        assert_eq!(config.database.url, "sqlite:arbor.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.search.default_limit, 100);
        assert_eq!(config.search.max_limit, 500);
        assert_eq!(config.search.window_multiplier, 2);
        assert_eq!(config.node.permissions, 7);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbor.toml");
        std::fs::write(
            &path,
            "[database]\nurl = \"sqlite::memory:\"\n\n[search]\ndefault_limit = 25\n",
        )
        .unwrap();

        let config = ArborConfig::load(Some(&path)).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.search.default_limit, 25);
        // Untouched sections keep their defaults.
        assert_eq!(config.search.max_limit, 500);
        assert_eq!(config.node.permissions, 7);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = ArborConfig::load(Some(Path::new("/nonexistent/arbor.toml")));
        assert!(matches!(result, Err(FsError::Config(_))));
    }
}
