//! Configuration management.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, then `ENTITYGRAPH_*` environment variables.
//!
//! ```toml
//! data_dir = "/var/lib/entitygraph"
//! busy_timeout_ms = 5000
//! prefetch_batch_size = 500
//!
//! [logging]
//! format = "json"
//! file = "/var/log/entitygraph.log"
//!
//! [metrics]
//! enabled = true
//! ```

use crate::storage::entity::DEFAULT_PREFETCH_BATCH_SIZE;
use crate::storage::sqlite::DEFAULT_BUSY_TIMEOUT_MS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Database file name used when no explicit path is configured.
pub const DEFAULT_DATABASE_FILE: &str = "entitygraph.db";

/// Largest prefetch batch; each id is one bound `SQLite` variable.
pub const MAX_PREFETCH_BATCH_SIZE: usize = 32_766;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "ENTITYGRAPH_CONFIG_PATH";
/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "ENTITYGRAPH_DATA_DIR";
/// Environment variable overriding the database path.
pub const ENV_DATABASE_PATH: &str = "ENTITYGRAPH_DATABASE_PATH";

/// Main configuration for entitygraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityGraphConfig {
    /// Directory holding the database when no explicit path is set.
    pub data_dir: PathBuf,
    /// Explicit database path.
    pub database_path: Option<PathBuf>,
    /// `SQLite` `busy_timeout` in milliseconds.
    pub busy_timeout_ms: u32,
    /// Entity ids per relationship prefetch statement.
    pub prefetch_batch_size: usize,
    /// Logging settings (format, file, filter).
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Logging section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive, e.g. `entitygraph=debug`.
    pub filter: Option<String>,
}

/// Metrics section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Install the in-process Prometheus recorder.
    pub enabled: Option<bool>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Database path.
    pub database_path: Option<String>,
    /// Busy timeout.
    pub busy_timeout_ms: Option<u32>,
    /// Prefetch batch size.
    pub prefetch_batch_size: Option<usize>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

impl Default for EntityGraphConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            prefetch_batch_size: DEFAULT_PREFETCH_BATCH_SIZE,
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "entitygraph").map_or_else(
        || PathBuf::from(".entitygraph"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

impl EntityGraphConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// out-of-range value.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::operation_failed("read_config_file", format!("{}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or holds an out-of-range
    /// value.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::operation_failed("parse_config_file", e))?;
        let config = Self::from_config_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/entitygraph/` on macOS)
    /// 2. XDG config dir (`~/.config/entitygraph/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("entitygraph").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("entitygraph")
                .join("config.toml"),
        ];
        for candidate in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(candidate) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %candidate.display(), error = %e, "Ignoring config file");
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `EntityGraphConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        config.database_path = file.database_path.map(PathBuf::from);
        if let Some(timeout) = file.busy_timeout_ms {
            config.busy_timeout_ms = timeout;
        }
        if let Some(batch) = file.prefetch_batch_size {
            config.prefetch_batch_size = batch;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        config
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the prefetch batch size is zero or
    /// exceeds [`MAX_PREFETCH_BATCH_SIZE`].
    pub fn validate(&self) -> Result<()> {
        if self.prefetch_batch_size == 0 || self.prefetch_batch_size > MAX_PREFETCH_BATCH_SIZE {
            return Err(Error::InvalidInput(format!(
                "prefetch_batch_size must be between 1 and {MAX_PREFETCH_BATCH_SIZE}, got {}",
                self.prefetch_batch_size
            )));
        }
        Ok(())
    }

    /// Applies `ENTITYGRAPH_DATA_DIR` / `ENTITYGRAPH_DATABASE_PATH`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH).filter(|v| !v.is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Sets an explicit database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Returns the effective database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_DATABASE_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EntityGraphConfig::new().with_data_dir("/tmp/eg");
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.prefetch_batch_size, 500);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/eg/entitygraph.db"));
        assert!(config.metrics.enabled.is_none());
    }

    #[test]
    fn test_from_toml() {
        let config = EntityGraphConfig::from_toml(
            r#"
            data_dir = "/srv/eg"
            busy_timeout_ms = 100
            prefetch_batch_size = 50

            [logging]
            format = "json"

            [metrics]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/eg"));
        assert_eq!(config.busy_timeout_ms, 100);
        assert_eq!(config.prefetch_batch_size, 50);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.metrics.enabled, Some(true));
    }

    #[test]
    fn test_prefetch_batch_size_bounds() {
        let err = EntityGraphConfig::from_toml("prefetch_batch_size = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = EntityGraphConfig::from_toml("prefetch_batch_size = 40000").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = EntityGraphConfig::from_toml("busy_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "database_path = \"/data/graph.db\"\n").unwrap();

        let config = EntityGraphConfig::load_from_file(&path).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/data/graph.db"));

        let missing = EntityGraphConfig::load_from_file(&dir.path().join("nope.toml"));
        assert!(missing.is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/override"),
            (ENV_DATABASE_PATH, ""),
        ]
        .into_iter()
        .collect();

        let config = EntityGraphConfig::new()
            .with_overrides_from(|key| vars.get(key).map(ToString::to_string));
        assert_eq!(config.data_dir, PathBuf::from("/override"));
        assert!(config.database_path.is_none());
    }
}
