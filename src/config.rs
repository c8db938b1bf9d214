//! Configuration loading.
//!
//! Settings live in a TOML file. Every field has a default, so a missing
//! file or a partial one both work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::types::DEFAULT_LOOKBACK_DAYS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub report: ReportConfig,
}

/// Market-data provider settings, passed to the client at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Site root; API paths are joined onto it.
    pub base_url: String,
    /// Index whose constituents form the candidate list.
    pub index: String,
    /// Browser-like user agent (the exchange rejects bare clients).
    pub user_agent: String,
    /// Minimum spacing between requests, in milliseconds.
    pub request_interval_ms: u64,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.nseindia.com".to_string(),
            index: "SECURITIES IN F&O".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
            request_interval_ms: 350,
            timeout_secs: 20,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    pub output_path: PathBuf,
    pub archive_dir: PathBuf,
    pub lookback_days: u32,
    pub max_symbols: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Top 50 Performing Indian Stocks with Metrics".to_string(),
            output_path: PathBuf::from("README.md"),
            archive_dir: PathBuf::from("history"),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_symbols: 50,
        }
    }
}

impl AppConfig {
    /// Parse configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load configuration from `path`, or defaults if the file does not exist.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    if path.as_ref().exists() {
        AppConfig::from_file(path)
    } else {
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.report.lookback_days, 30);
        assert_eq!(config.report.max_symbols, 50);
        assert_eq!(config.report.output_path, PathBuf::from("README.md"));
        assert_eq!(config.provider.index, "SECURITIES IN F&O");
    }

    #[test]
    fn test_partial_config_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[report]
max_symbols = 10
archive_dir = "old"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.report.max_symbols, 10);
        assert_eq!(config.report.archive_dir, PathBuf::from("old"));
        assert_eq!(config.report.lookback_days, 30);
        assert_eq!(config.provider.request_interval_ms, 350);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.report.title, ReportConfig::default().title);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.report.lookback_days = 60;
        config.save_to_file(&path).unwrap();

        let reloaded = load_config(&path).unwrap();
        assert_eq!(reloaded.report.lookback_days, 60);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "report = [").unwrap();
        assert!(matches!(
            AppConfig::from_file(temp_file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
