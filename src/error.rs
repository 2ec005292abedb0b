//! Error types for Quarry
//!
//! This module defines the error type shared by the cache, fetcher, metadata
//! loader and engine session, and the typed classification that decides
//! whether a failed table load may fall back to synthetic data.

use quarry_engine::EngineError;
use thiserror::Error;

/// Result type alias for Quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Broad class of a failure, used to pick a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource could not be retrieved (transport failure or a
    /// non-success HTTP status).
    Network,
    /// The bytes arrived but are not a readable parquet file.
    Validation,
    /// Everything else.
    Other,
}

/// Main error type for Quarry
///
/// `Clone` so that a memoized failure (engine initialization) can be
/// delivered to every waiter.
#[derive(Error, Debug, Clone)]
pub enum QuarryError {
    /// Non-success HTTP status
    #[error("Failed to fetch {url}: {status}")]
    Fetch { url: String, status: String },

    /// Transport-level failure (connection refused, reset, DNS, body read)
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Fetched bytes failed the parquet signature check or were rejected by
    /// the engine's parquet reader
    #[error("Invalid parquet payload for {file}: {detail}")]
    Validation { file: String, detail: String },

    /// Engine instantiation failed
    #[error("Engine initialization failed: {0}")]
    EngineInit(String),

    /// SQL execution failed
    #[error("Query failed: {0}")]
    Query(EngineError),

    /// Manifest could not be fetched or parsed
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Table is not part of the dataset catalog
    #[error("Missing file mapping for table {0}")]
    UnknownTable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Any other engine failure
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl QuarryError {
    /// Create a `Fetch` error from an HTTP status line.
    pub fn fetch(url: impl Into<String>, status: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status: status.into(),
        }
    }

    /// Create a `Network` error.
    pub fn network(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a `Validation` error.
    pub fn validation(file: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            file: file.into(),
            detail: detail.into(),
        }
    }

    /// Create a `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuarryError::Fetch { .. } | QuarryError::Network { .. } => ErrorKind::Network,
            QuarryError::Validation { .. } => ErrorKind::Validation,
            _ => ErrorKind::Other,
        }
    }

    /// Whether a table load that failed with this error should be replaced
    /// by the table's synthetic fixture.
    pub fn allows_synthetic_fallback(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Validation)
    }
}

impl From<std::io::Error> for QuarryError {
    fn from(e: std::io::Error) -> Self {
        QuarryError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for QuarryError {
    fn from(e: toml::de::Error) -> Self {
        QuarryError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_and_network_errors_fall_back() {
        let not_found = QuarryError::fetch("http://x/transactions.parquet", "Not Found");
        assert_eq!(not_found.kind(), ErrorKind::Network);
        assert!(not_found.allows_synthetic_fallback());
        assert_eq!(
            not_found.to_string(),
            "Failed to fetch http://x/transactions.parquet: Not Found"
        );

        let refused = QuarryError::network("http://x/a", "connection refused");
        assert!(refused.allows_synthetic_fallback());
    }

    #[test]
    fn test_validation_errors_fall_back() {
        let err = QuarryError::validation("products.parquet", "missing PAR1 signature");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.allows_synthetic_fallback());
    }

    #[test]
    fn test_other_errors_do_not_fall_back() {
        let cases = vec![
            QuarryError::EngineInit("worker died".into()),
            QuarryError::Query(EngineError::InvalidSql("nope".into())),
            QuarryError::UnknownTable("weather".into()),
            QuarryError::Engine(EngineError::DuckDb("out of memory".into())),
            QuarryError::Io("disk full".into()),
        ];
        for err in cases {
            assert_eq!(err.kind(), ErrorKind::Other, "{err}");
            assert!(!err.allows_synthetic_fallback());
        }
    }
}
