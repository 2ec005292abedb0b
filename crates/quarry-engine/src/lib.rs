//! Embedded analytical engine for Quarry (DuckDB-powered SQL on parquet data).
//!
//! This crate is a workspace member that isolates the heavy `duckdb` (bundled C++)
//! dependency into its own compilation unit, preventing recompilation of DuckDB
//! when unrelated core code changes.
//!
//! # Stability
//!
//! **Stable** -- Breaking changes only in major versions.
//!
//! # Overview
//!
//! The session layer in the main crate drives an engine through the traits in
//! [`engine`]:
//!
//! 1. Select an execution [`bundle`] for the host and instantiate an engine.
//! 2. Register raw parquet buffers under a file name.
//! 3. Open one connection and execute SQL, getting fully materialised rows.
//! 4. Register typed [`fixtures`] when real data is unavailable.
//!
//! # Modules
//!
//! - [`bundle`] -- Host capability probing and bundle selection.
//! - [`duckdb`] -- DuckDB implementation of the engine traits.
//! - [`engine`] -- The engine seam traits and [`ResultSet`].
//! - [`error`] -- Domain-specific error types.
//! - [`fixtures`] -- Synthetic fixture tables.

pub mod bundle;
pub mod duckdb;
pub mod engine;
pub mod error;
pub mod fixtures;

pub use bundle::{select_bundle, EngineBundle, HostCapabilities};
pub use self::duckdb::{DuckDbConnection, DuckDbEngine, DuckDbLauncher};
pub use engine::{AnalyticsEngine, EngineConnection, EngineLauncher, ResultSet};
pub use error::{EngineError, Result};
pub use fixtures::{fixture_for, ColumnType, FixtureColumn, FixtureTable, FixtureValue, FIXTURES};
