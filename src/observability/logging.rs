//! Structured logging configuration.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Default filter directive.
pub const DEFAULT_FILTER: &str = "entitygraph=info";
/// Filter directive used with `--verbose`.
pub const VERBOSE_FILTER: &str = "entitygraph=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name. Unknown names fall back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Optional log file (stderr otherwise).
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive.
    pub filter: String,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// Precedence for the filter: `RUST_LOG`, then the config file, then the
    /// default (`entitygraph=debug` when `verbose`).
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::from_settings_with(settings, verbose, |key| std::env::var(key).ok())
    }

    /// Same as [`LoggingConfig::from_settings`] with an explicit variable lookup.
    #[must_use]
    pub fn from_settings_with(
        settings: Option<&LoggingSettings>,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let format = env("ENTITYGRAPH_LOG_FORMAT")
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .map_or(LogFormat::Pretty, |f| LogFormat::parse(&f));
        let file = env("ENTITYGRAPH_LOG_FILE")
            .map(PathBuf::from)
            .or_else(|| settings.and_then(|s| s.file.clone()));
        let default_filter = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
        let filter = env("RUST_LOG")
            .or_else(|| settings.and_then(|s| s.filter.clone()))
            .unwrap_or_else(|| default_filter.to_string());

        Self {
            format,
            file,
            filter,
        }
    }

    /// Builds the `EnvFilter` for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the directive does not parse.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| Error::InvalidInput(format!("log filter '{}': {e}", self.filter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", LogFormat::Json ; "json")]
    #[test_case("JSON ", LogFormat::Json ; "json uppercase")]
    #[test_case("pretty", LogFormat::Pretty ; "pretty")]
    #[test_case("xml", LogFormat::Pretty ; "unknown falls back")]
    fn test_log_format_parse(input: &str, expected: LogFormat) {
        assert_eq!(LogFormat::parse(input), expected);
    }

    #[test]
    fn test_defaults_without_settings() {
        let config = LoggingConfig::from_settings_with(None, false, |_| None);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert!(config.file.is_none());

        let verbose = LoggingConfig::from_settings_with(None, true, |_| None);
        assert_eq!(verbose.filter, VERBOSE_FILTER);
    }

    #[test]
    fn test_env_beats_settings() {
        let settings = LoggingSettings {
            format: Some("pretty".to_string()),
            file: Some(PathBuf::from("/tmp/from-config.log")),
            filter: Some("entitygraph=warn".to_string()),
        };
        let config = LoggingConfig::from_settings_with(Some(&settings), false, |key| {
            match key {
                "ENTITYGRAPH_LOG_FORMAT" => Some("json".to_string()),
                "RUST_LOG" => Some("entitygraph=trace".to_string()),
                _ => None,
            }
        });
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "entitygraph=trace");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/from-config.log")));
        assert!(config.env_filter().is_ok());
    }
}
