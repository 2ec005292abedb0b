//! Dataset manifest loading.
//!
//! The manifest is a static JSON document published next to the parquet
//! files. It is fetched at most once per session; every caller, concurrent
//! or later, shares that one result. A manifest that cannot be fetched or
//! parsed is replaced by an empty one: "nothing known yet" is not an error
//! for any consumer.

use crate::error::{QuarryError, Result};
use crate::fetch::Transport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Column description in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Per-table manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Row count.
    pub rows: u64,
    /// Parquet file size in bytes.
    pub bytes: u64,
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<String>,
}

impl TableMetadata {
    /// `(min_date, max_date)` when the table has a date column.
    pub fn date_range(&self) -> Option<(&str, &str)> {
        match (&self.min_date, &self.max_date) {
            (Some(min), Some(max)) => Some((min.as_str(), max.as_str())),
            _ => None,
        }
    }
}

/// The dataset manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub generated_at: String,
    pub source: String,
    #[serde(default)]
    pub tables: BTreeMap<String, TableMetadata>,
    #[serde(default)]
    pub total_bytes: u64,
}

impl DatasetMetadata {
    /// The manifest used when the real one is unavailable.
    pub fn empty() -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            source: "unknown".to_string(),
            tables: BTreeMap::new(),
            total_bytes: 0,
        }
    }

    /// Size of `table`'s file, 0 when unknown.
    pub fn table_bytes(&self, table: &str) -> u64 {
        self.tables.get(table).map(|t| t.bytes).unwrap_or(0)
    }

    /// Parse a manifest document.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| QuarryError::Metadata(e.to_string()))
    }
}

/// Fetches and memoizes the manifest.
pub struct MetadataLoader {
    url: String,
    transport: Arc<dyn Transport>,
    cell: OnceCell<Arc<DatasetMetadata>>,
    fetches: AtomicUsize,
}

impl MetadataLoader {
    /// Create a loader for the manifest at `url`.
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            transport,
            cell: OnceCell::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Manifest URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The manifest, fetched on first use.
    pub async fn get_metadata(&self) -> Arc<DatasetMetadata> {
        self.cell
            .get_or_init(|| async {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                match self.fetch().await {
                    Ok(metadata) => {
                        debug!(
                            url = %self.url,
                            tables = metadata.tables.len(),
                            total_bytes = metadata.total_bytes,
                            "Loaded dataset metadata"
                        );
                        Arc::new(metadata)
                    }
                    Err(e) => {
                        warn!(url = %self.url, error = %e, "Dataset metadata unavailable, using empty manifest");
                        Arc::new(DatasetMetadata::empty())
                    }
                }
            })
            .await
            .clone()
    }

    /// Size of `table`'s file, 0 for tables the manifest does not list.
    pub async fn get_table_bytes(&self, table: &str) -> u64 {
        self.get_metadata().await.table_bytes(table)
    }

    /// How many times the manifest was requested from the network.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    async fn fetch(&self) -> Result<DatasetMetadata> {
        let response = self.transport.get(&self.url).await?;
        if !response.is_success() {
            return Err(QuarryError::fetch(&self.url, response.status_text));
        }
        let body = response.bytes().await?;
        DatasetMetadata::from_slice(&body)
    }
}

impl std::fmt::Debug for MetadataLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataLoader")
            .field("url", &self.url)
            .field("loaded", &self.cell.initialized())
            .finish()
    }
}
