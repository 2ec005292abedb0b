#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # Quarry
//!
//! Quarry loads a parquet dataset served over HTTP into an embedded DuckDB
//! engine and runs SQL against it. Downloaded files are cached in memory and
//! on disk, load progress is published through an observable session state,
//! and tables whose files cannot be fetched or read fall back to small
//! built-in fixtures so the dataset stays queryable offline.
//!
//! ## Quick Start
//!
//! ```bash
//! # List the dataset's tables
//! $ quarry --base-url https://example.com/retail-demo/ tables
//!
//! # Load two tables and run a query
//! $ quarry query "SELECT COUNT(*) FROM transactions" --tables transactions products
//!
//! # Build a shareable link for a query
//! $ quarry share top-departments "SELECT 1"
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use quarry::{EngineSession, QuarryConfig};
//!
//! #[tokio::main]
//! async fn main() -> quarry::Result<()> {
//!     let session = EngineSession::from_config(&QuarryConfig::default())?;
//!
//!     let _progress = session.subscribe(|state| {
//!         println!("{} {:?} {}/{}", state.status, state.message, state.loaded_bytes, state.total_bytes);
//!     });
//!
//!     session.ensure_tables(&["transactions"]).await?;
//!     let result = session.run_query("SELECT COUNT(*) AS n FROM transactions").await?;
//!     println!("{} rows in {:.1} ms", result.row_count, result.elapsed_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`cache`]: Two-tier byte cache (memory + durable directory)
//! - [`fetch`]: HTTP fetching with progress reporting
//! - [`state`]: Observable session state
//! - [`metadata`]: Dataset manifest loading
//! - [`session`]: Engine lifecycle, table loading and queries
//! - [`catalog`]: Known tables and the parquet signature check
//! - [`share`]: Shareable query links
//! - [`format`]: Number formatting for terminal output
//! - [`config`]: Configuration and CLI arguments
//! - [`error`]: Error types and Result alias
//!
//! The engine itself lives in the `quarry-engine` workspace crate.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod metadata;
pub mod session;
pub mod share;
pub mod state;

pub use cache::{ByteCache, DiskStore, DurableStore};
pub use config::{ConfigFile, DatasetLocation, GlobalArgs, QuarryConfig};
pub use error::{ErrorKind, QuarryError, Result};
pub use fetch::{Fetcher, HttpResponse, ProgressFn, ReqwestTransport, ResponseBody, Transport};
pub use metadata::{ColumnMetadata, DatasetMetadata, MetadataLoader, TableMetadata};
pub use session::{EngineSession, LoadOutcome, QueryResult};
pub use share::ShareLink;
pub use state::{SessionPatch, SessionState, SessionStatus, SessionStore, Subscription};

pub use quarry_engine as engine;
