//! Execution bundle selection.
//!
//! DuckDB can run single-threaded (the "mvp" bundle) or with a worker
//! thread pool (the "eh" bundle). The bundle is chosen once per session from
//! the capabilities of the host process.

use serde::{Deserialize, Serialize};

/// What the host process offers the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Number of hardware threads the process may use.
    pub parallelism: usize,
}

impl HostCapabilities {
    /// Probe the current process.
    pub fn detect() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { parallelism }
    }
}

/// An execution bundle for the embedded engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EngineBundle {
    /// Single-threaded execution.
    Mvp,
    /// Multi-threaded execution with `threads` workers.
    Eh {
        /// Worker thread count handed to DuckDB.
        threads: usize,
    },
}

impl EngineBundle {
    /// Number of threads DuckDB should use for this bundle.
    pub fn threads(&self) -> usize {
        match self {
            EngineBundle::Mvp => 1,
            EngineBundle::Eh { threads } => *threads,
        }
    }

    /// Short bundle name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            EngineBundle::Mvp => "mvp",
            EngineBundle::Eh { .. } => "eh",
        }
    }
}

/// Pick the bundle for a host.
///
/// A configured thread count wins over the probed parallelism; one thread
/// (configured or probed) always selects [`EngineBundle::Mvp`].
pub fn select_bundle(host: &HostCapabilities, threads_override: Option<usize>) -> EngineBundle {
    let threads = threads_override.unwrap_or(host.parallelism).max(1);
    if threads == 1 {
        EngineBundle::Mvp
    } else {
        EngineBundle::Eh { threads }
    }
}
