//! Configuration file management.
//!
//! Read from `$ATLAS_DATA_DIR/config.toml`; every field has a default so a
//! missing file or section is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Complete statement runner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementsConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Statement run settings.
    #[serde(default)]
    pub statements: RunConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Statement run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Period to run when none is given on the command line, e.g. "2026-09".
    #[serde(default)]
    pub period: String,
    /// Currency precision used in the run report.
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
    /// JSON report path. Empty = no report file.
    #[serde(default)]
    pub report_path: String,
    /// Maximum agreements calculated concurrently.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_decimal_places() -> u32 {
    2
}

fn default_max_parallel() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            period: String::new(),
            decimal_places: default_decimal_places(),
            report_path: String::new(),
            max_parallel: default_max_parallel(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl StatementsConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: StatementsConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the database file path.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("atlas.db")
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Default data directory, overridable with `ATLAS_DATA_DIR`.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("ATLAS_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".atlas"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/atlas"))
    }
}
