//! Command-line arguments shared by every Quarry subcommand
//!
//! Every setting is optional here so that an unset flag can be filled from
//! the config file before falling back to the defaults.

use clap::Args;
use std::path::PathBuf;

/// Global options for the `quarry` binary
#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct GlobalArgs {
    /// Path to configuration file (TOML format)
    /// If not specified, looks for quarry.toml in current directory
    /// or ~/.config/quarry/
    #[arg(short, long, global = true, env = "QUARRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Origin the dataset is served from, e.g. https://example.com/app/
    #[arg(long, global = true, env = "QUARRY_BASE_URL")]
    pub base_url: Option<String>,

    /// Parquet directory relative to the base URL
    #[arg(long, global = true, env = "QUARRY_DATASET_PATH")]
    pub dataset_path: Option<String>,

    /// Manifest path relative to the base URL
    #[arg(long, global = true, env = "QUARRY_METADATA_PATH")]
    pub metadata_path: Option<String>,

    /// Directory for the durable byte cache
    #[arg(long, global = true, env = "QUARRY_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Keep downloaded files only in memory
    #[arg(long, global = true, env = "QUARRY_NO_DURABLE_CACHE")]
    pub no_durable_cache: bool,

    /// Number of engine worker threads (1 selects the single-threaded bundle)
    #[arg(long, global = true, env = "QUARRY_ENGINE_THREADS")]
    pub engine_threads: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "QUARRY_LOG_LEVEL")]
    pub log_level: Option<String>,
}
