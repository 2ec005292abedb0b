//! Two-tier byte cache for fetched files.
//!
//! Blobs are keyed by their source URL. The first tier is an in-memory map
//! that lives as long as the process; the second is an optional
//! [`DurableStore`] that survives restarts. A durable hit is copied into
//! memory so the next read is served from the fast path.
//!
//! There is no eviction: dataset files are bounded in number and size, and
//! a URL always names the same immutable bytes.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A persistent key-value store for byte blobs.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Capability probe. A store that reports `false` is never used.
    fn is_supported(&self) -> bool;

    /// Read the blob stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous blob.
    async fn set(&self, key: &str, value: Bytes) -> Result<()>;
}

/// Durable store keeping one file per key in a directory.
///
/// File names are the SHA-256 of the key, so arbitrary URLs map to safe
/// names.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
    supported: bool,
}

impl DiskStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// A directory that cannot be created or written leaves the store
    /// unsupported rather than failing.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let supported = match probe_writable(&root) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %root.display(), error = %e, "Durable cache unavailable, using memory only");
                false
            }
        };
        Self { root, supported }
    }

    /// Directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root.join(format!("{}.bin", hex::encode(digest)))
    }
}

fn probe_writable(root: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(root)?;
    let probe = root.join(".probe");
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(&probe)
}

#[async_trait]
impl DurableStore for DiskStore {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a truncated blob behind.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-memory map in front of an optional durable store.
pub struct ByteCache {
    memory: DashMap<String, Bytes>,
    durable: Option<Arc<dyn DurableStore>>,
}

impl ByteCache {
    /// Create a cache over `durable`.
    ///
    /// The store's capability probe runs once here; an unsupported store is
    /// dropped and the cache works from memory alone.
    pub fn new(durable: Option<Arc<dyn DurableStore>>) -> Self {
        let durable = durable.filter(|store| store.is_supported());
        Self {
            memory: DashMap::new(),
            durable,
        }
    }

    /// Create a memory-only cache.
    pub fn memory_only() -> Self {
        Self::new(None)
    }

    /// Whether a durable tier is in use.
    pub fn is_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Look up `key`, consulting memory first and the durable store second.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(hit) = self.memory.get(key) {
            debug!(key = %key, "Byte cache memory hit");
            return Some(hit.value().clone());
        }

        let store = self.durable.as_ref()?;
        match store.get(key).await {
            Ok(Some(bytes)) => {
                debug!(key = %key, bytes = bytes.len(), "Byte cache durable hit");
                self.memory.insert(key.to_string(), bytes.clone());
                Some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Durable cache read failed");
                None
            }
        }
    }

    /// Store `value` under `key`.
    ///
    /// The memory write always happens; a failed durable write is logged
    /// and otherwise ignored.
    pub async fn set(&self, key: &str, value: Bytes) {
        self.memory.insert(key.to_string(), value.clone());
        if let Some(store) = &self.durable {
            if let Err(e) = store.set(key, value).await {
                warn!(key = %key, error = %e, "Durable cache write failed");
            }
        }
    }

    /// Drop the in-memory tier, as a process restart would.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    /// Number of blobs held in memory.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }
}

impl std::fmt::Debug for ByteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCache")
            .field("memory_entries", &self.memory.len())
            .field("durable", &self.durable.is_some())
            .finish()
    }
}
