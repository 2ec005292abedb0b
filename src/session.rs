//! Engine session manager.
//!
//! An [`EngineSession`] owns everything that lives for one session: the
//! analytics engine, its single connection, the set of loaded tables and the
//! observable [`SessionStore`].
//!
//! # Lifecycle
//!
//! 1. **Engine init** -- [`EngineSession::init_engine`] instantiates the
//!    engine exactly once. Concurrent callers share the same outstanding
//!    future, and a failure is memoized: every later call sees the same
//!    error without a second attempt.
//! 2. **Connection** -- [`EngineSession::get_connection`] opens one
//!    connection for the session's lifetime.
//! 3. **Table loads** -- [`EngineSession::ensure_tables`] fans out one load
//!    task per missing table. A table has at most one load in flight; a
//!    second request for it joins the first.
//! 4. **Queries** -- [`EngineSession::run_query`] runs SQL on the shared
//!    connection and records timing in the session state.
//!
//! # Table load states
//!
//! `unloaded -> loading -> {loaded | loaded-synthetic | failed}`. A failed
//! load leaves the table unloaded, so the next request tries again. It does
//! not touch the session status; only engine initialization sets `error`.

use crate::cache::{ByteCache, DiskStore, DurableStore};
use crate::catalog;
use crate::config::{DatasetLocation, QuarryConfig, DEFAULT_CONNECT_TIMEOUT_MS};
use crate::error::{QuarryError, Result};
use crate::fetch::{Fetcher, ReqwestTransport, Transport};
use crate::metadata::{DatasetMetadata, MetadataLoader};
use crate::state::{SessionPatch, SessionState, SessionStatus, SessionStore, Subscription};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use quarry_engine::{
    fixture_for, AnalyticsEngine, DuckDbLauncher, EngineConnection, EngineError, EngineLauncher,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Output of one SQL execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Rows keyed by column name.
    pub rows: Vec<Map<String, JsonValue>>,
    /// Wall-clock execution time in milliseconds.
    pub elapsed_ms: f64,
    pub row_count: usize,
    /// Rows scanned, when the engine reports it.
    pub scanned_rows: Option<u64>,
    /// Engine memory after the query, when the engine reports it.
    pub memory_bytes: Option<u64>,
}

impl QueryResult {
    /// Values of one row in column order, `null` for missing keys.
    pub fn row_values(&self, index: usize) -> Vec<JsonValue> {
        let Some(row) = self.rows.get(index) else {
            return Vec::new();
        };
        self.columns
            .iter()
            .map(|c| row.get(c).cloned().unwrap_or(JsonValue::Null))
            .collect()
    }
}

/// How a table ended up in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Loaded from its parquet file.
    Loaded,
    /// Replaced by its synthetic fixture.
    Synthetic,
}

#[derive(Default)]
struct LoadRegistry {
    /// Loaded tables, in completion order.
    loaded: Vec<String>,
    in_flight: HashMap<String, SharedResult<()>>,
    /// Bytes reported so far per loading table.
    progress: HashMap<String, u64>,
}

struct SessionInner {
    launcher: Arc<dyn EngineLauncher>,
    fetcher: Fetcher,
    metadata: Arc<MetadataLoader>,
    state: Arc<SessionStore>,
    location: DatasetLocation,
    engine: Mutex<Option<SharedResult<Arc<dyn AnalyticsEngine>>>>,
    connection: Mutex<Option<SharedResult<Arc<dyn EngineConnection>>>>,
    loads: Mutex<LoadRegistry>,
}

/// Removes a table's in-flight entry when its load task ends, however it
/// ends.
struct InFlightGuard {
    inner: Arc<SessionInner>,
    table: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.loads.lock().in_flight.remove(&self.table);
    }
}

/// A dataset session over an embedded analytics engine.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct EngineSession {
    inner: Arc<SessionInner>,
}

impl EngineSession {
    /// Create a session from its parts.
    pub fn new(
        launcher: Arc<dyn EngineLauncher>,
        transport: Arc<dyn Transport>,
        cache: Arc<ByteCache>,
        location: DatasetLocation,
    ) -> Self {
        let metadata = Arc::new(MetadataLoader::new(location.metadata_url(), transport.clone()));
        Self {
            inner: Arc::new(SessionInner {
                launcher,
                fetcher: Fetcher::new(transport, cache),
                metadata,
                state: SessionStore::new(),
                location,
                engine: Mutex::new(None),
                connection: Mutex::new(None),
                loads: Mutex::new(LoadRegistry::default()),
            }),
        }
    }

    /// Create a session with the production transport, cache and engine.
    pub fn from_config(config: &QuarryConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS))?;
        let durable: Option<Arc<dyn DurableStore>> = if config.durable_cache {
            Some(Arc::new(DiskStore::open(&config.cache_dir)))
        } else {
            None
        };
        let cache = ByteCache::new(durable);
        debug!(durable = cache.is_durable(), "Byte cache ready");

        Ok(Self::new(
            Arc::new(DuckDbLauncher::new(config.engine_threads)),
            Arc::new(transport),
            Arc::new(cache),
            config.location.clone(),
        ))
    }

    /// The session's observable state.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.inner.state
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<SessionState> {
        self.inner.state.get()
    }

    /// Subscribe to state changes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        self.inner.state.subscribe(listener)
    }

    /// The dataset location.
    pub fn location(&self) -> &DatasetLocation {
        &self.inner.location
    }

    /// The dataset manifest.
    pub async fn metadata(&self) -> Arc<DatasetMetadata> {
        self.inner.metadata.get_metadata().await
    }

    /// Names of loaded tables, in load order.
    pub fn loaded_tables(&self) -> Vec<String> {
        self.inner.loads.lock().loaded.clone()
    }

    /// Whether a load for `table` is currently running.
    pub fn is_loading(&self, table: &str) -> bool {
        self.inner.loads.lock().in_flight.contains_key(table)
    }

    /// Instantiate the engine, once.
    ///
    /// The first call sets the status to `loading`, instantiates the engine
    /// for the host's bundle, reads the manifest for the total dataset size
    /// and sets the status to `ready`. A failure sets the status to `error`
    /// and is returned to this and every later caller.
    pub async fn init_engine(&self) -> Result<Arc<dyn AnalyticsEngine>> {
        let init = {
            let mut slot = self.inner.engine.lock();
            slot.get_or_insert_with(|| {
                start_engine(
                    self.inner.launcher.clone(),
                    self.inner.metadata.clone(),
                    self.inner.state.clone(),
                )
                .boxed()
                .shared()
            })
            .clone()
        };
        init.await
    }

    /// The session's connection, opened on first use.
    pub async fn get_connection(&self) -> Result<Arc<dyn EngineConnection>> {
        let engine = self.init_engine().await?;
        let connect = {
            let mut slot = self.inner.connection.lock();
            slot.get_or_insert_with(|| {
                async move {
                    let conn = engine.connect().await.map_err(QuarryError::from)?;
                    debug!("Engine connection opened");
                    Ok::<_, QuarryError>(conn)
                }
                .boxed()
                .shared()
            })
            .clone()
        };
        connect.await
    }

    /// Make every table in `tables` queryable.
    ///
    /// Tables that are already loaded are skipped and tables with a load in
    /// flight are joined. Resolves once every requested table has settled;
    /// the first failure is returned.
    ///
    /// # Errors
    ///
    /// `QuarryError::UnknownTable` for a name outside the catalog (checked
    /// before any load starts), engine initialization errors, and load
    /// failures that are not eligible for the synthetic fallback.
    pub async fn ensure_tables<S: AsRef<str>>(&self, tables: &[S]) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        for table in tables {
            catalog::file_for(table.as_ref())?;
        }

        self.init_engine().await?;

        let tasks: Vec<SharedResult<()>> = {
            let mut registry = self.inner.loads.lock();
            let mut tasks = Vec::new();
            for table in tables {
                let table = table.as_ref();
                if registry.loaded.iter().any(|t| t == table) {
                    continue;
                }
                if let Some(task) = registry.in_flight.get(table) {
                    debug!(table = %table, "Joining in-flight table load");
                    tasks.push(task.clone());
                    continue;
                }
                let task = self.spawn_load(table);
                registry.in_flight.insert(table.to_string(), task.clone());
                tasks.push(task);
            }
            tasks
        };

        future::try_join_all(tasks).await?;
        Ok(())
    }

    /// Start the load task for `table`. The task runs to completion even if
    /// every caller stops waiting for it.
    fn spawn_load(&self, table: &str) -> SharedResult<()> {
        let session = self.clone();
        let name = table.to_string();
        let handle = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: session.inner.clone(),
                table: name.clone(),
            };
            session.load_table(&name).await.map(|_| ())
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(QuarryError::from(EngineError::from(e))),
            }
        }
        .boxed()
        .shared()
    }

    async fn load_table(&self, table: &str) -> Result<LoadOutcome> {
        let file = catalog::file_for(table)?;
        self.inner.state.set(
            SessionPatch::new()
                .status(SessionStatus::Loading)
                .message(format!("Loading {}", table)),
        );
        info!(table = %table, file = %file, "Loading table");

        let engine = self.init_engine().await?;
        let conn = self.get_connection().await?;

        let error = match self.load_from_file(table, file, &engine, &conn).await {
            Ok(()) => {
                self.clear_progress(table, false);
                self.mark_loaded(table, format!("Loaded {}", table));
                info!(table = %table, "Table loaded");
                return Ok(LoadOutcome::Loaded);
            }
            Err(e) => e,
        };

        self.clear_progress(table, true);
        if !error.allows_synthetic_fallback() {
            error!(table = %table, error = %error, "Table load failed");
            return Err(error);
        }

        warn!(table = %table, error = %error, "Using synthetic fallback data");
        let fixture = fixture_for(table).ok_or_else(|| {
            EngineError::MissingFixture(format!("No synthetic dataset available for {}", table))
        })?;
        conn.load_fixture(fixture).await?;
        self.mark_loaded(table, format!("Loaded {} (synthetic fallback)", table));
        Ok(LoadOutcome::Synthetic)
    }

    async fn load_from_file(
        &self,
        table: &str,
        file: &str,
        engine: &Arc<dyn AnalyticsEngine>,
        conn: &Arc<dyn EngineConnection>,
    ) -> Result<()> {
        let url = self.inner.location.table_url(file);
        let on_progress = |loaded: u64, _total: Option<u64>| self.report_progress(table, loaded);
        let buffer = self.inner.fetcher.fetch(&url, Some(&on_progress)).await?;

        if !catalog::is_parquet_buffer(&buffer) {
            return Err(QuarryError::validation(file, "missing PAR1 signature"));
        }

        engine.register_file_buffer(file, buffer).await?;
        conn.create_table_from_parquet(table, file)
            .await
            .map_err(|e| match e {
                EngineError::InvalidParquet(detail) => QuarryError::validation(file, detail),
                other => QuarryError::Engine(other),
            })
    }

    fn mark_loaded(&self, table: &str, message: String) {
        {
            let mut registry = self.inner.loads.lock();
            if !registry.loaded.iter().any(|t| t == table) {
                registry.loaded.push(table.to_string());
            }
        }
        self.inner.state.update(|_| {
            SessionPatch::new()
                .status(SessionStatus::Ready)
                .message(message)
                .loaded_tables(self.loaded_tables())
        });
    }

    /// Record that `loaded` bytes of `table` have arrived.
    ///
    /// Only the increase over the table's previous report is added to
    /// `loaded_bytes`; repeated or stale reports change nothing.
    pub fn report_progress(&self, table: &str, loaded: u64) {
        let delta = {
            let mut registry = self.inner.loads.lock();
            let previous = registry.progress.get(table).copied().unwrap_or(0);
            if loaded <= previous {
                return;
            }
            registry.progress.insert(table.to_string(), loaded);
            loaded - previous
        };
        self.inner
            .state
            .update(|s| SessionPatch::new().loaded_bytes(s.loaded_bytes + delta));
    }

    /// Forget `table`'s progress marker, optionally taking its bytes back
    /// out of `loaded_bytes`.
    pub fn clear_progress(&self, table: &str, subtract: bool) {
        let loaded = self.inner.loads.lock().progress.remove(table).unwrap_or(0);
        if !subtract || loaded == 0 {
            return;
        }
        self.inner.state.update(|s| {
            SessionPatch::new().loaded_bytes(s.loaded_bytes.saturating_sub(loaded))
        });
    }

    /// Run `sql` on the session connection.
    ///
    /// # Errors
    ///
    /// Engine errors during execution come back as `QuarryError::Query`
    /// unchanged; there is no retry.
    pub async fn run_query(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.get_connection().await?;

        let start = Instant::now();
        let result = conn.query(sql).await.map_err(QuarryError::Query)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let memory_bytes = conn.memory_usage().await;
        let rows = result.to_records();
        let row_count = rows.len();

        self.inner.state.set(
            SessionPatch::new()
                .last_query_ms(elapsed_ms)
                .last_row_count(row_count)
                .last_scanned_rows(None)
                .memory_bytes(memory_bytes),
        );
        info!(rows = row_count, elapsed_ms = elapsed_ms, "Query completed");

        Ok(QueryResult {
            columns: result.columns,
            rows,
            elapsed_ms,
            row_count,
            scanned_rows: None,
            memory_bytes,
        })
    }

    /// Tables the dataset offers.
    ///
    /// The manifest's tables that are in the catalog, or the whole catalog
    /// when the manifest lists none.
    pub async fn get_available_tables(&self) -> Vec<String> {
        let metadata = self.inner.metadata.get_metadata().await;
        if metadata.tables.is_empty() {
            return catalog::known_tables();
        }
        metadata
            .tables
            .keys()
            .filter(|t| catalog::is_known(t))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("location", &self.inner.location)
            .field("loaded_tables", &self.loaded_tables())
            .finish_non_exhaustive()
    }
}

async fn start_engine(
    launcher: Arc<dyn EngineLauncher>,
    metadata: Arc<MetadataLoader>,
    state: Arc<SessionStore>,
) -> Result<Arc<dyn AnalyticsEngine>> {
    state.set(
        SessionPatch::new()
            .status(SessionStatus::Loading)
            .message("Initializing DuckDB"),
    );

    let bundle = launcher.select_bundle();
    info!(bundle = bundle.name(), threads = bundle.threads(), "Initializing analytics engine");

    let engine = match launcher.instantiate(bundle).await {
        Ok(engine) => engine,
        Err(e) => {
            let err = QuarryError::EngineInit(e.to_string());
            error!(error = %err, "Engine initialization failed");
            state.set(
                SessionPatch::new()
                    .status(SessionStatus::Error)
                    .message(err.to_string()),
            );
            return Err(err);
        }
    };

    let total_bytes = metadata.get_metadata().await.total_bytes;
    state.set(
        SessionPatch::new()
            .status(SessionStatus::Ready)
            .message("DuckDB ready")
            .total_bytes(total_bytes),
    );
    info!(total_bytes = total_bytes, "Analytics engine ready");
    Ok(engine)
}
