//! Configuration module for Quarry
//!
//! This module is organized into submodules:
//! - `defaults` - Default constants and values
//! - `args` - CLI argument definitions
//! - `file` - TOML configuration file
//! - `merge` - Layering file values under CLI arguments

mod args;
mod defaults;
pub mod file;
mod merge;

// Re-export submodule types
pub use args::GlobalArgs;
pub use defaults::*;
pub use file::ConfigFile;
pub use merge::merge_config_with_args;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{QuarryError, Result};

/// Where the dataset lives.
///
/// URLs are built by plain concatenation, so `base_url` always ends with a
/// slash and the relative paths never start with one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLocation {
    pub base_url: String,
    pub dataset_path: String,
    pub metadata_path: String,
}

impl DatasetLocation {
    /// Create a location, normalizing slashes.
    pub fn new(
        base_url: impl Into<String>,
        dataset_path: impl Into<String>,
        metadata_path: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            dataset_path: dataset_path.into().trim_matches('/').to_string(),
            metadata_path: metadata_path.into().trim_start_matches('/').to_string(),
        }
    }

    /// URL of a parquet file: `{base_url}{dataset_path}/{file}`.
    pub fn table_url(&self, file: &str) -> String {
        format!("{}{}/{}", self.base_url, self.dataset_path, file)
    }

    /// URL of the dataset manifest: `{base_url}{metadata_path}`.
    pub fn metadata_url(&self) -> String {
        format!("{}{}", self.base_url, self.metadata_path)
    }
}

impl Default for DatasetLocation {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_DATASET_PATH, DEFAULT_METADATA_PATH)
    }
}

/// Resolved configuration for a Quarry session.
///
/// # Configuration Sources
///
/// Configuration is loaded from multiple sources with this precedence:
/// 1. **CLI arguments / environment variables** (highest priority) - `QUARRY_*` prefix
/// 2. **Config file** - `quarry.toml`
/// 3. **Built-in defaults** (lowest priority)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Dataset origin and paths
    pub location: DatasetLocation,

    /// Durable cache directory
    pub cache_dir: PathBuf,

    /// Whether downloaded files are persisted to `cache_dir`
    pub durable_cache: bool,

    /// Engine worker thread override
    pub engine_threads: Option<usize>,

    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            location: DatasetLocation::default(),
            cache_dir: default_cache_dir(),
            durable_cache: DEFAULT_DURABLE_CACHE,
            engine_threads: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl QuarryConfig {
    /// Resolve the configuration from CLI arguments, the config file and
    /// defaults.
    ///
    /// An explicit `--config` path must load; otherwise the default
    /// locations are searched and a missing file is fine.
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default(),
        };
        let merged = match file {
            Some(file) => merge_config_with_args(args.clone(), &file),
            None => args.clone(),
        };
        Self::from_args(&merged)
    }

    /// Build a configuration from already-merged arguments.
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let base_url = args.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(QuarryError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                base_url
            )));
        }
        if args.engine_threads == Some(0) {
            return Err(QuarryError::config("engine_threads must be at least 1"));
        }

        Ok(Self {
            location: DatasetLocation::new(
                base_url,
                args.dataset_path.as_deref().unwrap_or(DEFAULT_DATASET_PATH),
                args.metadata_path.as_deref().unwrap_or(DEFAULT_METADATA_PATH),
            ),
            cache_dir: args.cache_dir.clone().unwrap_or_else(default_cache_dir),
            durable_cache: !args.no_durable_cache,
            engine_threads: args.engine_threads,
            log_level: args
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    /// URL of a parquet file.
    pub fn table_url(&self, file: &str) -> String {
        self.location.table_url(file)
    }

    /// URL of the dataset manifest.
    pub fn metadata_url(&self) -> String {
        self.location.metadata_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QuarryConfig::from_args(&GlobalArgs::default()).unwrap();
        assert_eq!(
            config.table_url("households.parquet"),
            "http://localhost:5173/data/parquet/households.parquet"
        );
        assert_eq!(
            config.metadata_url(),
            "http://localhost:5173/data/metadata.json"
        );
        assert!(config.durable_cache);
        assert_eq!(config.engine_threads, None);
        assert_eq!(config.log_level, "info");
        assert!(config.cache_dir.ends_with("blobs"));
    }

    #[test]
    fn test_location_normalizes_slashes() {
        let location = DatasetLocation::new("https://example.com/app", "/parquet/", "/meta.json");
        assert_eq!(
            location.table_url("coupons.parquet"),
            "https://example.com/app/parquet/coupons.parquet"
        );
        assert_eq!(location.metadata_url(), "https://example.com/app/meta.json");
    }

    #[test]
    fn test_rejects_bad_values() {
        let args = GlobalArgs {
            base_url: Some("ftp://example.com/".into()),
            ..Default::default()
        };
        assert!(matches!(
            QuarryConfig::from_args(&args),
            Err(QuarryError::Config(_))
        ));

        let args = GlobalArgs {
            engine_threads: Some(0),
            ..Default::default()
        };
        assert!(QuarryConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_resolve_with_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[dataset]\nbase_url = \"https://data.example.com/\"\n\n[cache]\ndurable = false\n\n[log]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let args = GlobalArgs {
            config: Some(path),
            log_level: Some("warn".into()),
            ..Default::default()
        };
        let config = QuarryConfig::resolve(&args).unwrap();

        assert_eq!(config.location.base_url, "https://data.example.com/");
        assert!(!config.durable_cache);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_resolve_with_missing_explicit_file_fails() {
        let args = GlobalArgs {
            config: Some(PathBuf::from("/no/such/quarry.toml")),
            ..Default::default()
        };
        assert!(QuarryConfig::resolve(&args).is_err());
    }
}
