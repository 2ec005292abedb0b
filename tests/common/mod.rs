//! Shared test fixtures and utilities for Quarry integration tests
//!
//! # Usage
//!
//! In your test file, add:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Features
//!
//! - `MockTransport`: in-process HTTP with per-URL routes and hit counts
//! - `FailingLauncher`: an engine launcher whose worker never starts
//! - `parquet_bytes`: real parquet files written by DuckDB
//! - Session builders wired to the mocks

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use parking_lot::Mutex;
use quarry::engine::{
    AnalyticsEngine, DuckDbLauncher, EngineBundle, EngineConnection, EngineError, EngineLauncher,
};
use quarry::{
    ByteCache, DatasetLocation, EngineSession, HttpResponse, QuarryError, ResponseBody, Result,
    Transport,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Dataset location
// ============================================================================

pub const BASE_URL: &str = "http://quarry.test/";

pub fn location() -> DatasetLocation {
    DatasetLocation::new(BASE_URL, "data/parquet", "data/metadata.json")
}

pub fn table_url(table: &str) -> String {
    location().table_url(&format!("{}.parquet", table))
}

pub fn metadata_url() -> String {
    location().metadata_url()
}

// ============================================================================
// Transport
// ============================================================================

/// What a mocked URL answers with.
#[derive(Clone)]
pub enum Route {
    /// 200 with this body, streamed in chunks.
    Body(Bytes),
    /// A non-success status.
    Status(u16, &'static str),
    /// A transport-level failure.
    Unreachable(&'static str),
}

/// In-process HTTP transport.
///
/// Unrouted URLs answer `404 Not Found`. Every request is counted per URL.
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<HashMap<String, usize>>,
    delay: Duration,
    chunk_size: usize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    /// Delay every response, keeping loads in flight long enough to race.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            hits: Mutex::new(HashMap::new()),
            delay,
            chunk_size: 1024,
        })
    }

    pub fn route(&self, url: impl Into<String>, route: Route) {
        self.routes.lock().insert(url.into(), route);
    }

    pub fn serve(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.route(url, Route::Body(body.into()));
    }

    /// Serve a manifest with the given `(table, bytes)` entries.
    pub fn serve_manifest(&self, tables: &[(&str, u64)]) {
        let entries: serde_json::Map<String, serde_json::Value> = tables
            .iter()
            .map(|(name, bytes)| {
                (
                    name.to_string(),
                    serde_json::json!({ "rows": 100, "bytes": bytes, "columns": [] }),
                )
            })
            .collect();
        let total: u64 = tables.iter().map(|(_, b)| *b).sum();
        let manifest = serde_json::json!({
            "generated_at": "2024-03-01T12:00:00Z",
            "source": "test fixture",
            "tables": entries,
            "total_bytes": total,
        });
        self.serve(metadata_url(), manifest.to_string());
    }

    /// Requests made for `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }

    /// Requests made for anything but the manifest.
    pub fn file_hits(&self) -> usize {
        let manifest = metadata_url();
        self.hits
            .lock()
            .iter()
            .filter(|(url, _)| **url != manifest)
            .map(|(_, n)| *n)
            .sum()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        *self.hits.lock().entry(url.to_string()).or_insert(0) += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let route = self.routes.lock().get(url).cloned();
        match route {
            Some(Route::Body(body)) => {
                let chunks: Vec<Result<Bytes>> = body
                    .chunks(self.chunk_size)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                Ok(HttpResponse {
                    status: 200,
                    status_text: "OK".into(),
                    content_length: Some(body.len() as u64),
                    body: ResponseBody::Streaming(stream::iter(chunks).boxed()),
                })
            }
            Some(Route::Status(status, text)) => Ok(HttpResponse {
                status,
                status_text: text.into(),
                content_length: None,
                body: ResponseBody::Buffered(Bytes::new()),
            }),
            Some(Route::Unreachable(message)) => Err(QuarryError::network(url, message)),
            None => Ok(HttpResponse {
                status: 404,
                status_text: "Not Found".into(),
                content_length: None,
                body: ResponseBody::Buffered(Bytes::new()),
            }),
        }
    }
}

// ============================================================================
// Engine launchers
// ============================================================================

/// A launcher whose worker dies during instantiation.
#[derive(Default)]
pub struct FailingLauncher {
    pub attempts: AtomicUsize,
}

impl FailingLauncher {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLauncher for FailingLauncher {
    fn select_bundle(&self) -> EngineBundle {
        EngineBundle::Mvp
    }

    async fn instantiate(
        &self,
        _bundle: EngineBundle,
    ) -> quarry::engine::Result<Arc<dyn AnalyticsEngine>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::worker("worker terminated before instantiation"))
    }
}

/// Counts instantiations of a real single-threaded DuckDB.
#[derive(Default)]
pub struct CountingLauncher {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl EngineLauncher for CountingLauncher {
    fn select_bundle(&self) -> EngineBundle {
        EngineBundle::Mvp
    }

    async fn instantiate(
        &self,
        bundle: EngineBundle,
    ) -> quarry::engine::Result<Arc<dyn AnalyticsEngine>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        DuckDbLauncher::new(Some(1)).instantiate(bundle).await
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Session over `transport`, a memory-only cache and a real DuckDB.
pub fn session(transport: Arc<MockTransport>) -> EngineSession {
    session_with(Arc::new(DuckDbLauncher::new(Some(1))), transport, ByteCache::memory_only())
}

pub fn session_with(
    launcher: Arc<dyn EngineLauncher>,
    transport: Arc<MockTransport>,
    cache: ByteCache,
) -> EngineSession {
    EngineSession::new(launcher, transport, Arc::new(cache), location())
}

// ============================================================================
// Data
// ============================================================================

/// A parquet file holding the result of `select`, written by DuckDB.
pub async fn parquet_bytes(select: &str) -> Bytes {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.parquet");

    let engine = DuckDbLauncher::new(Some(1))
        .instantiate(EngineBundle::Mvp)
        .await
        .unwrap();
    let conn = engine.connect().await.unwrap();
    conn.query(&format!(
        "COPY ({}) TO '{}' (FORMAT PARQUET)",
        select,
        path.display()
    ))
    .await
    .unwrap();

    Bytes::from(std::fs::read(&path).unwrap())
}

/// A 100-row transactions file.
pub async fn transactions_parquet() -> Bytes {
    parquet_bytes(
        "SELECT range AS basket_id, range % 8 AS household_key, \
         CAST(range % 7 AS DOUBLE) + 0.99 AS sales_value \
         FROM range(100)",
    )
    .await
}
