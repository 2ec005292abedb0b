//! DuckDB-backed implementation of the engine seam.
//!
//! Every call into DuckDB runs on the Tokio blocking pool, so the async
//! callers only ever see an opaque asynchronous operation, the same way a
//! page sees a database living in a web worker.
//!
//! # Architecture
//!
//! 1. **Instantiation** -- [`DuckDbLauncher`] opens an in-memory database
//!    configured for the selected [`EngineBundle`] and creates a private
//!    scratch directory for registered file buffers.
//! 2. **File registration** -- [`DuckDbEngine::register_file_buffer`] writes
//!    the buffer into the scratch directory, which is on the
//!    `file_search_path` of every connection, so
//!    `parquet_scan('name.parquet')` resolves to it.
//! 3. **Query execution** -- [`DuckDbConnection::query`] materialises all
//!    rows as JSON values together with the result's column names.
//!
//! # Examples
//!
//! ```ignore
//! use quarry_engine::{DuckDbLauncher, EngineLauncher};
//!
//! let launcher = DuckDbLauncher::new(None);
//! let engine = launcher.instantiate(launcher.select_bundle()).await?;
//! let conn = engine.connect().await?;
//! let rs = conn.query("SELECT 42 AS answer").await?;
//! assert_eq!(rs.columns, vec!["answer"]);
//! ```

use crate::bundle::{select_bundle, EngineBundle, HostCapabilities};
use crate::engine::{AnalyticsEngine, EngineConnection, EngineLauncher, ResultSet};
use crate::error::{EngineError, Result};
use crate::fixtures::{FixtureTable, FixtureValue};
use async_trait::async_trait;
use bytes::Bytes;
use duckdb::{params, params_from_iter, types::ValueRef, Connection};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

// ─── Launcher ────────────────────────────────────────────────────────────────

/// Launches in-memory DuckDB engines.
#[derive(Debug, Clone)]
pub struct DuckDbLauncher {
    host: HostCapabilities,
    threads_override: Option<usize>,
}

impl DuckDbLauncher {
    /// Create a launcher for the current host.
    ///
    /// `threads_override` forces DuckDB's worker thread count.
    pub fn new(threads_override: Option<usize>) -> Self {
        Self {
            host: HostCapabilities::detect(),
            threads_override,
        }
    }

    /// Create a launcher for explicit host capabilities.
    pub fn with_host(host: HostCapabilities, threads_override: Option<usize>) -> Self {
        Self {
            host,
            threads_override,
        }
    }
}

impl Default for DuckDbLauncher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl EngineLauncher for DuckDbLauncher {
    fn select_bundle(&self) -> EngineBundle {
        select_bundle(&self.host, self.threads_override)
    }

    async fn instantiate(&self, bundle: EngineBundle) -> Result<Arc<dyn AnalyticsEngine>> {
        let engine = tokio::task::spawn_blocking(move || DuckDbEngine::open(bundle)).await??;
        Ok(Arc::new(engine))
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// An instantiated in-memory DuckDB database.
pub struct DuckDbEngine {
    /// Root connection; every logical connection is cloned from it.
    /// Note: Using Mutex because DuckDB Connection contains RefCell which is not Sync.
    connection: Arc<Mutex<Connection>>,

    /// Directory holding registered file buffers. Removed on drop.
    scratch: Arc<TempDir>,

    bundle: EngineBundle,
}

impl DuckDbEngine {
    /// Open a database configured for `bundle`.
    ///
    /// Blocking; callers on the async side go through [`DuckDbLauncher`].
    pub fn open(bundle: EngineBundle) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("quarry-buffers-")
            .tempdir()
            .map_err(|e| EngineError::Init(format!("Failed to create buffer directory: {}", e)))?;

        let connection = Connection::open_in_memory().map_err(|e| {
            EngineError::Init(format!("Failed to create DuckDB connection: {}", e))
        })?;

        // Bundled builds ship parquet; never try to download extensions.
        if let Err(e) = connection.execute_batch(
            "SET autoinstall_known_extensions=false; SET autoload_known_extensions=true;",
        ) {
            warn!(error = %e, "Failed to configure extension loading");
        }
        if let Err(e) = connection.execute_batch("LOAD parquet;") {
            warn!(error = %e, "Failed to load the parquet extension");
        }

        connection
            .execute_batch(&format!("SET threads = {};", bundle.threads()))
            .map_err(|e| EngineError::Init(format!("Failed to set thread count: {}", e)))?;
        set_search_path(&connection, scratch.path())
            .map_err(|e| EngineError::Init(format!("Failed to set file search path: {}", e)))?;

        info!(
            bundle = bundle.name(),
            threads = bundle.threads(),
            "DuckDB engine initialized"
        );

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            scratch: Arc::new(scratch),
            bundle,
        })
    }

    /// The bundle this engine runs.
    pub fn bundle(&self) -> EngineBundle {
        self.bundle
    }

    /// Directory registered buffers are written to.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }
}

#[async_trait]
impl AnalyticsEngine for DuckDbEngine {
    async fn register_file_buffer(&self, name: &str, bytes: Bytes) -> Result<()> {
        if !is_bare_file_name(name) {
            return Err(EngineError::InvalidBuffer(format!(
                "file name '{}' must be a bare file name",
                name
            )));
        }

        let path = self.scratch.path().join(name);
        let len = bytes.len();
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            EngineError::InvalidBuffer(format!("Failed to register {}: {}", name, e))
        })?;

        debug!(file = %name, bytes = len, "Registered file buffer");
        Ok(())
    }

    async fn connect(&self) -> Result<Arc<dyn EngineConnection>> {
        let root = self.connection.clone();
        let scratch = self.scratch.clone();
        let connection = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let connection = root.lock().try_clone()?;
            // The search path is a per-connection setting; clones start empty.
            set_search_path(&connection, scratch.path())?;
            Ok(connection)
        })
        .await??;

        debug!("Opened DuckDB connection");
        Ok(Arc::new(DuckDbConnection {
            inner: Arc::new(Mutex::new(connection)),
            scratch: self.scratch.clone(),
        }))
    }
}

// ─── Connection ──────────────────────────────────────────────────────────────

/// A connection cloned from a [`DuckDbEngine`].
pub struct DuckDbConnection {
    inner: Arc<Mutex<Connection>>,

    /// Keeps registered buffers alive as long as a connection can read them.
    scratch: Arc<TempDir>,
}

#[async_trait]
impl EngineConnection for DuckDbConnection {
    async fn query(&self, sql: &str) -> Result<ResultSet> {
        let inner = self.inner.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || execute(&inner.lock(), &sql)).await?
    }

    async fn create_table_from_parquet(&self, table: &str, file: &str) -> Result<()> {
        if !is_bare_file_name(file) {
            return Err(EngineError::InvalidBuffer(format!(
                "file name '{}' must be a bare file name",
                file
            )));
        }
        let inner = self.inner.clone();
        let path = sql_quote(&self.scratch.path().join(file).to_string_lossy());
        let table = table.to_string();
        let file = file.to_string();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = inner.lock();

            // Reading the footer first separates payloads the parquet reader
            // rejects from failures of the table build itself.
            conn.query_row(
                &format!("SELECT COUNT(*) FROM parquet_metadata('{}')", path),
                [],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| EngineError::InvalidParquet(format!("{}: {}", file, e)))?;

            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} AS SELECT * FROM parquet_scan('{}')",
                table, path
            ))?;

            debug!(table = %table, file = %file, "Table created from parquet");
            Ok(())
        })
        .await?
    }

    async fn load_fixture(&self, fixture: &'static FixtureTable) -> Result<()> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = inner.lock();

            let exists: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM information_schema.tables WHERE table_name = ?",
                params![fixture.name],
                |row| row.get(0),
            )?;
            if exists {
                debug!(table = %fixture.name, "Fixture table already present");
                return Ok(());
            }

            let tx = conn.transaction()?;
            tx.execute_batch(&fixture.create_sql())?;
            {
                let mut stmt = tx.prepare(&fixture.insert_sql())?;
                for row in fixture.rows {
                    stmt.execute(params_from_iter(row.iter().map(FixtureValue::to_sql_value)))?;
                }
            }
            tx.commit()?;

            info!(table = %fixture.name, rows = fixture.rows.len(), "Fixture table registered");
            Ok(())
        })
        .await?
    }

    async fn memory_usage(&self) -> Option<u64> {
        let inner = self.inner.clone();
        let probe = tokio::task::spawn_blocking(move || {
            inner.lock().query_row(
                "SELECT CAST(COALESCE(SUM(memory_usage_bytes), 0) AS BIGINT) FROM duckdb_memory()",
                [],
                |row| row.get::<_, i64>(0),
            )
        })
        .await;

        match probe {
            Ok(Ok(bytes)) => u64::try_from(bytes).ok(),
            _ => None,
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Execute one statement and collect every row.
fn execute(conn: &Connection, sql: &str) -> Result<ResultSet> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| EngineError::invalid_sql(sql, e.to_string()))?;

    let mut rows_result = stmt.query([]).map_err(EngineError::from)?;

    // Collect all rows, probing column count dynamically from each row.
    // We cannot call stmt.column_names() here because Rows holds a
    // mutable borrow on stmt; we retrieve names after dropping Rows.
    let mut rows = Vec::new();
    while let Some(row) = rows_result
        .next()
        .map_err(|e| EngineError::DuckDb(format!("Failed to fetch row: {}", e)))?
    {
        let mut values = Vec::new();
        for i in 0.. {
            match row.get_ref(i) {
                Ok(value) => values.push(duckdb_value_to_json(value)),
                Err(_) => break,
            }
        }
        rows.push(values);
    }

    drop(rows_result);

    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    Ok(ResultSet { columns, rows })
}

fn is_bare_file_name(name: &str) -> bool {
    !(name.is_empty() || name.contains(&['/', '\\'][..]) || name == "." || name == "..")
}

/// Point `conn`'s `file_search_path` at the scratch directory so registered
/// buffers resolve by bare file name.
fn set_search_path(conn: &Connection, scratch: &Path) -> duckdb::Result<()> {
    conn.execute_batch(&format!(
        "SET file_search_path = '{}';",
        sql_quote(&scratch.to_string_lossy())
    ))
}

/// Escape a string for use inside a single-quoted SQL literal.
fn sql_quote(s: &str) -> String {
    s.replace('\'', "''")
}

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Convert a DuckDB `ValueRef` to a `serde_json::Value`.
fn duckdb_value_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Boolean(b) => JsonValue::Bool(b),
        ValueRef::TinyInt(i) => JsonValue::Number(i.into()),
        ValueRef::SmallInt(i) => JsonValue::Number(i.into()),
        ValueRef::Int(i) => JsonValue::Number(i.into()),
        ValueRef::BigInt(i) => JsonValue::Number(i.into()),
        ValueRef::HugeInt(i) => {
            // Try to fit into i64 for a proper JSON Number; fall back to string for very large values.
            if let Ok(n) = i64::try_from(i) {
                JsonValue::Number(n.into())
            } else {
                JsonValue::String(i.to_string())
            }
        }
        ValueRef::UTinyInt(i) => JsonValue::Number(i.into()),
        ValueRef::USmallInt(i) => JsonValue::Number(i.into()),
        ValueRef::UInt(i) => JsonValue::Number(i.into()),
        ValueRef::UBigInt(i) => JsonValue::Number(i.into()),
        ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Double(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::String(text))
        }
        ValueRef::Text(s) => JsonValue::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Date32(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(chrono::NaiveDate::from_num_days_from_ce_opt)
            .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(JsonValue::Null),
        ValueRef::Timestamp(unit, v) => {
            chrono::DateTime::from_timestamp_micros(unit.to_micros(v))
                .map(|dt| JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(JsonValue::Null)
        }
        ValueRef::Blob(b) => JsonValue::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
        _ => JsonValue::String(format!("{:?}", value)),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::fixture_for;
    use serde_json::json;

    async fn connect() -> (Arc<dyn AnalyticsEngine>, Arc<dyn EngineConnection>) {
        let launcher = DuckDbLauncher::new(Some(2));
        let engine = launcher.instantiate(launcher.select_bundle()).await.unwrap();
        let conn = engine.connect().await.unwrap();
        (engine, conn)
    }

    /// Write a small parquet file with a throwaway DuckDB and return its bytes.
    fn parquet_bytes(select: &str) -> Bytes {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!(
            "COPY ({}) TO '{}' (FORMAT PARQUET);",
            select,
            sql_quote(&path.to_string_lossy())
        ))
        .unwrap();
        Bytes::from(std::fs::read(&path).unwrap())
    }

    // ── Instantiation ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_instantiate_single_threaded_bundle() {
        let launcher = DuckDbLauncher::with_host(HostCapabilities { parallelism: 1 }, None);
        let bundle = launcher.select_bundle();
        assert_eq!(bundle, EngineBundle::Mvp);
        assert!(launcher.instantiate(bundle).await.is_ok());
    }

    // ── Queries ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_simple_select() {
        let (_engine, conn) = connect().await;

        let rs = conn.query("SELECT 1 AS one, 'hello' AS greeting").await.unwrap();

        assert_eq!(rs.columns, vec!["one", "greeting"]);
        assert_eq!(rs.rows, vec![vec![json!(1), json!("hello")]]);
    }

    #[tokio::test]
    async fn test_date_and_decimal_values() {
        let (_engine, conn) = connect().await;

        let rs = conn
            .query("SELECT DATE '2020-02-09' AS d, CAST(12.5 AS DECIMAL(4,1)) AS v")
            .await
            .unwrap();

        assert_eq!(rs.rows[0][0], json!("2020-02-09"));
        assert_eq!(rs.rows[0][1], json!(12.5));
    }

    #[tokio::test]
    async fn test_invalid_sql_returns_error() {
        let (_engine, conn) = connect().await;

        let err = conn.query("SELCT * FORM nothing").await.unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidSql(_)),
            "Expected InvalidSql, got: {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_connections_share_one_database() {
        let (engine, conn) = connect().await;
        conn.query("CREATE TABLE shared AS SELECT 7 AS n").await.unwrap();

        let other = engine.connect().await.unwrap();
        let rs = other.query("SELECT n FROM shared").await.unwrap();
        assert_eq!(rs.rows[0][0], json!(7));
    }

    // ── File buffers ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_registered_parquet_buffer_is_scannable() {
        let (engine, conn) = connect().await;
        let bytes = parquet_bytes("SELECT 1001 AS household_id, '35-49K' AS income");

        engine
            .register_file_buffer("households.parquet", bytes)
            .await
            .unwrap();
        conn.query(
            "CREATE TABLE IF NOT EXISTS households AS SELECT * FROM parquet_scan('households.parquet')",
        )
        .await
        .unwrap();

        let rs = conn.query("SELECT household_id, income FROM households").await.unwrap();
        assert_eq!(rs.rows, vec![vec![json!(1001), json!("35-49K")]]);
    }

    #[tokio::test]
    async fn test_register_rejects_path_names() {
        let (engine, _conn) = connect().await;

        let err = engine
            .register_file_buffer("../escape.parquet", Bytes::from_static(b"PAR1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidBuffer(_)));
    }

    #[tokio::test]
    async fn test_every_connection_resolves_registered_names() {
        let launcher = DuckDbLauncher::new(Some(1));
        let engine = launcher.instantiate(EngineBundle::Mvp).await.unwrap();
        let first = engine.connect().await.unwrap();
        let second = engine.connect().await.unwrap();

        let rs = second
            .query("SELECT current_setting('file_search_path') AS path")
            .await
            .unwrap();
        assert_ne!(rs.rows[0][0], json!(""));

        engine
            .register_file_buffer("products.parquet", parquet_bytes("SELECT 42 AS product_id"))
            .await
            .unwrap();
        for conn in [first, second] {
            let rs = conn
                .query("SELECT product_id FROM parquet_scan('products.parquet')")
                .await
                .unwrap();
            assert_eq!(rs.rows, vec![vec![json!(42)]]);
        }
    }

    #[tokio::test]
    async fn test_create_table_from_parquet() {
        let (engine, conn) = connect().await;
        engine
            .register_file_buffer("coupons.parquet", parquet_bytes("SELECT range AS coupon_upc FROM range(5)"))
            .await
            .unwrap();

        conn.create_table_from_parquet("coupons", "coupons.parquet").await.unwrap();
        // Idempotent once the table exists.
        conn.create_table_from_parquet("coupons", "coupons.parquet").await.unwrap();

        let rs = conn.query("SELECT COUNT(*) FROM coupons").await.unwrap();
        assert_eq!(rs.rows[0][0], json!(5));
    }

    #[tokio::test]
    async fn test_garbage_buffer_is_invalid_parquet() {
        let (engine, conn) = connect().await;
        engine
            .register_file_buffer("bad.parquet", Bytes::from_static(b"PAR1 not parquet PAR1"))
            .await
            .unwrap();

        let err = conn.create_table_from_parquet("bad", "bad.parquet").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidParquet(_)), "{err}");

        let tables = conn
            .query("SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'bad'")
            .await
            .unwrap();
        assert_eq!(tables.rows[0][0], json!(0));
    }

    #[tokio::test]
    async fn test_unregistered_file_is_invalid_parquet() {
        let (_engine, conn) = connect().await;

        let err = conn
            .create_table_from_parquet("campaigns", "campaigns.parquet")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidParquet(_)), "{err}");
    }

    // ── Fixtures ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_fixture_is_typed_and_idempotent() {
        let (_engine, conn) = connect().await;
        let fixture = fixture_for("transactions").unwrap();

        conn.load_fixture(fixture).await.unwrap();
        conn.load_fixture(fixture).await.unwrap();

        let rs = conn
            .query("SELECT COUNT(*) AS n, MIN(transaction_date) AS first FROM transactions")
            .await
            .unwrap();
        assert_eq!(rs.rows[0][0], json!(35));
        assert_eq!(rs.rows[0][1], json!("2020-01-05"));

        let types = conn
            .query("SELECT data_type FROM information_schema.columns WHERE table_name = 'transactions' AND column_name = 'transaction_date'")
            .await
            .unwrap();
        assert_eq!(types.rows[0][0], json!("DATE"));
    }

    #[tokio::test]
    async fn test_memory_usage_is_reported() {
        let (_engine, conn) = connect().await;
        conn.query("CREATE TABLE filler AS SELECT range AS n FROM range(100000)")
            .await
            .unwrap();

        // The bundled build exposes duckdb_memory().
        assert!(conn.memory_usage().await.is_some());
    }
}
