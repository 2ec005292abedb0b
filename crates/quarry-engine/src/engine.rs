//! Engine seam traits.
//!
//! The session layer never talks to DuckDB directly. It goes through these
//! three traits, which mirror the lifecycle of the embedded engine:
//!
//! 1. An [`EngineLauncher`] picks an [`EngineBundle`] and instantiates an
//!    engine from it.
//! 2. An [`AnalyticsEngine`] accepts raw file buffers and hands out
//!    connections.
//! 3. An [`EngineConnection`] runs SQL and registers fixture tables.
//!
//! Tests substitute in-process implementations to simulate worker failures.
//!
//! # Stability
//!
//! **Stable** -- Breaking changes only in major versions.

use crate::bundle::EngineBundle;
use crate::error::Result;
use crate::fixtures::FixtureTable;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Starts engine instances.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Choose the execution bundle for this host.
    fn select_bundle(&self) -> EngineBundle;

    /// Spin up and instantiate an engine running the given bundle.
    async fn instantiate(&self, bundle: EngineBundle) -> Result<Arc<dyn AnalyticsEngine>>;
}

/// An instantiated engine.
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    /// Make `bytes` readable by SQL under the file name `name`.
    async fn register_file_buffer(&self, name: &str, bytes: Bytes) -> Result<()>;

    /// Open a connection to the engine's database.
    async fn connect(&self) -> Result<Arc<dyn EngineConnection>>;
}

/// A logical connection to an engine.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Execute one SQL statement and materialise its full result.
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Create `table` from the registered parquet file `file`, unless a
    /// table of that name exists.
    ///
    /// Implementations that can tell a payload the parquet reader rejects
    /// from other failures report it as [`EngineError::InvalidParquet`];
    /// every other failure is returned as is.
    ///
    /// [`EngineError::InvalidParquet`]: crate::error::EngineError::InvalidParquet
    async fn create_table_from_parquet(&self, table: &str, file: &str) -> Result<()> {
        self.query(&format!(
            "CREATE TABLE IF NOT EXISTS {} AS SELECT * FROM parquet_scan('{}')",
            table,
            file.replace('\'', "''")
        ))
        .await
        .map(|_| ())
    }

    /// Create `fixture` as a table, unless a table of that name exists.
    async fn load_fixture(&self, fixture: &'static FixtureTable) -> Result<()>;

    /// Approximate memory held by the engine, when it can report one.
    async fn memory_usage(&self) -> Option<u64> {
        None
    }
}

/// A fully materialised result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<String>,

    /// Row values, positionally matching `columns`.
    pub rows: Vec<Vec<JsonValue>>,
}

impl ResultSet {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as column-name keyed records.
    ///
    /// Duplicate column names keep the right-most value.
    pub fn to_records(&self) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, JsonValue>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_records_zips_columns_and_values() {
        let rs = ResultSet {
            columns: vec!["department".into(), "revenue".into()],
            rows: vec![vec![json!("GROCERY"), json!(42.5)], vec![json!("DAIRY"), json!(7)]],
        };

        let records = rs.to_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["department"], json!("GROCERY"));
        assert_eq!(records[1]["revenue"], json!(7));
        assert!(!rs.is_empty());
    }
}
