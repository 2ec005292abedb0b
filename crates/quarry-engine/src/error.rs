//! Error types for the Quarry engine crate.
//!
//! This module defines domain-specific errors for the embedded DuckDB engine,
//! covering instantiation failures, SQL execution failures, rejected file
//! buffers and missing synthetic fixtures.
//!
//! # Stability
//!
//! **Stable** -- Breaking changes only in major versions.

/// Errors from the analytical engine.
///
/// The type is `Clone` so a failed, memoized initialization can be handed to
/// every caller that was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be instantiated (worker start, database open,
    /// settings).
    #[error("Engine initialization failed: {0}")]
    Init(String),

    /// The SQL statement could not be parsed or bound by DuckDB.
    ///
    /// The inner string contains the DuckDB diagnostic message.
    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    /// A registered file buffer was rejected (bad name, unreadable payload).
    #[error("Invalid file buffer: {0}")]
    InvalidBuffer(String),

    /// The parquet reader could not read a registered file (bad footer,
    /// truncated payload, not parquet at all).
    #[error("Invalid parquet file: {0}")]
    InvalidParquet(String),

    /// No synthetic fixture is defined for the requested table.
    #[error("No synthetic dataset available for {0}")]
    MissingFixture(String),

    /// The blocking worker running the engine call went away.
    #[error("Engine worker error: {0}")]
    Worker(String),

    /// A DuckDB operation failed (wrapper around the duckdb crate error).
    #[error("DuckDB error: {0}")]
    DuckDb(String),
}

impl EngineError {
    /// Create an `InvalidSql` error with the offending statement attached.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_engine::error::EngineError;
    ///
    /// let err = EngineError::invalid_sql(
    ///     "SELECT * FORM transactions",
    ///     "syntax error near 'FORM'",
    /// );
    /// assert!(err.to_string().contains("syntax error"));
    /// ```
    pub fn invalid_sql(sql: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        // Truncate very long queries in the error message
        let sql_preview = if sql.chars().count() > 120 {
            format!("{}...", sql.chars().take(120).collect::<String>())
        } else {
            sql.to_string()
        };
        Self::InvalidSql(format!("{} (query: {})", detail, sql_preview))
    }

    /// Wrap a raw DuckDB error string.
    pub fn duckdb(detail: impl Into<String>) -> Self {
        Self::DuckDb(detail.into())
    }

    /// Wrap a join failure from the blocking pool.
    pub fn worker(detail: impl std::fmt::Display) -> Self {
        Self::Worker(detail.to_string())
    }
}

impl From<duckdb::Error> for EngineError {
    fn from(e: duckdb::Error) -> Self {
        let msg = e.to_string();
        // Heuristic: DuckDB syntax / parse errors
        if msg.contains("Parser Error") || msg.contains("Binder Error") {
            EngineError::InvalidSql(msg)
        } else {
            EngineError::DuckDb(msg)
        }
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        EngineError::worker(e)
    }
}

/// A specialised `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
