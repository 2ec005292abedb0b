//! Configuration file support for Quarry
//!
//! This module provides TOML configuration file parsing.
//!
//! ## Priority Order
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values
//!
//! ## Example Configuration
//!
//! ```toml
//! # quarry.toml
//!
//! [dataset]
//! base_url = "https://example.com/retail-demo/"
//! dataset_path = "data/parquet"
//! metadata_path = "data/metadata.json"
//!
//! [cache]
//! durable = true
//! # dir = "/var/cache/quarry/blobs"
//!
//! [engine]
//! # threads = 4
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::defaults::CONFIG_FILE_NAME;
use crate::error::{QuarryError, Result};

/// Root configuration structure for TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Dataset location
    pub dataset: DatasetSection,

    /// Byte cache configuration
    pub cache: CacheSection,

    /// Analytics engine configuration
    pub engine: EngineSection,

    /// Logging configuration
    pub log: LogSection,
}

/// Dataset section configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSection {
    /// Origin the dataset is served from
    pub base_url: Option<String>,

    /// Parquet directory relative to the base URL
    pub dataset_path: Option<String>,

    /// Manifest path relative to the base URL
    pub metadata_path: Option<String>,
}

/// Cache section configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Persist downloaded files across runs
    pub durable: Option<bool>,

    /// Durable cache directory
    pub dir: Option<PathBuf>,
}

/// Engine section configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Worker thread count
    pub threads: Option<usize>,
}

/// Log section configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            QuarryError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            QuarryError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Try to load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./quarry.toml
    /// 2. ~/.config/quarry/quarry.toml
    pub fn load_default() -> Option<Self> {
        let default_paths = [
            PathBuf::from(CONFIG_FILE_NAME),
            dirs::config_dir()
                .map(|p| p.join("quarry").join(CONFIG_FILE_NAME))
                .unwrap_or_default(),
        ];

        for path in default_paths.iter().filter(|p| !p.as_os_str().is_empty()) {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {:?}", path);
                        return Some(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        None
    }

    /// Generate an example configuration file
    pub fn generate_example() -> String {
        r#"# Quarry Configuration File
# Copy to quarry.toml and customize as needed
#
# Configuration priority (highest to lowest):
# 1. Command-line arguments
# 2. Environment variables (QUARRY_*)
# 3. This configuration file
# 4. Default values

[dataset]
# Origin the dataset is served from (must end with a slash)
base_url = "http://localhost:5173/"

# Parquet directory relative to base_url
dataset_path = "data/parquet"

# Dataset manifest relative to base_url
metadata_path = "data/metadata.json"

[cache]
# Keep downloaded files on disk between runs
durable = true

# Durable cache directory (default: <user cache dir>/quarry/blobs)
# dir = "/var/cache/quarry/blobs"

[engine]
# Worker thread count; 1 selects the single-threaded bundle
# (default: available parallelism)
# threads = 4

[log]
# Log level: trace, debug, info, warn, error
level = "info"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_parse_dataset_section() {
        let toml = r#"
            [dataset]
            base_url = "https://example.com/demo/"
            dataset_path = "parquet"
        "#;
        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(
            config.dataset.base_url,
            Some("https://example.com/demo/".to_string())
        );
        assert_eq!(config.dataset.dataset_path, Some("parquet".to_string()));
        assert!(config.dataset.metadata_path.is_none());
    }

    #[test]
    fn test_parse_cache_engine_log_sections() {
        let toml = r#"
            [cache]
            durable = false
            dir = "/tmp/quarry"

            [engine]
            threads = 1

            [log]
            level = "debug"
        "#;
        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.durable, Some(false));
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/quarry")));
        assert_eq!(config.engine.threads, Some(1));
        assert_eq!(config.log.level, Some("debug".to_string()));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarry.toml");
        std::fs::write(&path, "[engine]\nthreads = \"many\"\n").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, QuarryError::Config(_)));
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load("/definitely/not/here/quarry.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_generate_example_is_valid_toml() {
        let example = ConfigFile::generate_example();
        let config: ConfigFile = toml::from_str(&example).unwrap();
        assert_eq!(config.cache.durable, Some(true));
        assert_eq!(config.log.level, Some("info".to_string()));
    }
}
