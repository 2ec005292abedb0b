//! Default constants for Quarry configuration
//!
//! These constants define the default values used throughout the configuration
//! system when no explicit value is provided.

/// Default origin the dataset is served from. Must end with `/`.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5173/";

/// Default path of the parquet directory, relative to the base URL
pub const DEFAULT_DATASET_PATH: &str = "data/parquet";

/// Default path of the dataset manifest, relative to the base URL
pub const DEFAULT_METADATA_PATH: &str = "data/metadata.json";

/// Default durable cache enabled state
pub const DEFAULT_DURABLE_CACHE: bool = true;

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default HTTP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Cache directory name under the user cache directory
pub const CACHE_DIR_NAME: &str = "quarry/blobs";

/// Config file name searched for in the default locations
pub const CONFIG_FILE_NAME: &str = "quarry.toml";

/// Default durable cache directory (`<user cache dir>/quarry/blobs`).
///
/// Falls back to `./.quarry-cache/blobs` on hosts without a cache directory.
pub fn default_cache_dir() -> std::path::PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_DIR_NAME))
        .unwrap_or_else(|| std::path::PathBuf::from(".quarry-cache/blobs"))
}
