//! Observable session state.
//!
//! A [`SessionStore`] owns the single [`SessionState`] record of a session.
//! Every change goes through [`SessionStore::set`] or
//! [`SessionStore::update`], which shallow-merge a [`SessionPatch`] into the
//! current state, swap in the new snapshot and then call every subscriber
//! synchronously, once per change. There is no batching.
//!
//! Listeners run after the write lock is released, so a listener may call
//! [`SessionStore::get`] (and observe the merged state) or even `set`.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Engine/session status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Ready => "ready",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub status: SessionStatus,

    /// Human-readable description of the last transition.
    pub message: Option<String>,

    /// Tables registered in the engine, in load order, without duplicates.
    pub loaded_tables: Vec<String>,

    /// Bytes received so far for tables that are loading or loaded.
    pub loaded_bytes: u64,

    /// Total dataset size according to the manifest.
    pub total_bytes: u64,

    /// Wall-clock duration of the last query in milliseconds.
    pub last_query_ms: Option<f64>,

    /// Row count of the last query.
    pub last_row_count: Option<usize>,

    /// Rows scanned by the last query, when the engine reports it.
    pub last_scanned_rows: Option<u64>,

    /// Engine memory after the last query, when the engine reports it.
    pub memory_bytes: Option<u64>,
}

impl SessionState {
    /// Fraction of `total_bytes` received, clamped to `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.loaded_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }

    fn merged(&self, patch: SessionPatch) -> SessionState {
        let mut next = self.clone();
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(message) = patch.message {
            next.message = message;
        }
        if let Some(tables) = patch.loaded_tables {
            next.loaded_tables = tables;
        }
        if let Some(bytes) = patch.loaded_bytes {
            next.loaded_bytes = bytes;
        }
        if let Some(bytes) = patch.total_bytes {
            next.total_bytes = bytes;
        }
        if let Some(ms) = patch.last_query_ms {
            next.last_query_ms = ms;
        }
        if let Some(rows) = patch.last_row_count {
            next.last_row_count = rows;
        }
        if let Some(rows) = patch.last_scanned_rows {
            next.last_scanned_rows = rows;
        }
        if let Some(bytes) = patch.memory_bytes {
            next.memory_bytes = bytes;
        }
        next
    }
}

/// A partial update. Unset fields leave the state untouched.
///
/// Fields that are themselves optional in [`SessionState`] can be set to a
/// value or cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    status: Option<SessionStatus>,
    message: Option<Option<String>>,
    loaded_tables: Option<Vec<String>>,
    loaded_bytes: Option<u64>,
    total_bytes: Option<u64>,
    last_query_ms: Option<Option<f64>>,
    last_row_count: Option<Option<usize>>,
    last_scanned_rows: Option<Option<u64>>,
    memory_bytes: Option<Option<u64>>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(Some(message.into()));
        self
    }

    pub fn clear_message(mut self) -> Self {
        self.message = Some(None);
        self
    }

    pub fn loaded_tables(mut self, tables: Vec<String>) -> Self {
        self.loaded_tables = Some(tables);
        self
    }

    pub fn loaded_bytes(mut self, bytes: u64) -> Self {
        self.loaded_bytes = Some(bytes);
        self
    }

    pub fn total_bytes(mut self, bytes: u64) -> Self {
        self.total_bytes = Some(bytes);
        self
    }

    pub fn last_query_ms(mut self, ms: f64) -> Self {
        self.last_query_ms = Some(Some(ms));
        self
    }

    pub fn last_row_count(mut self, rows: usize) -> Self {
        self.last_row_count = Some(Some(rows));
        self
    }

    pub fn last_scanned_rows(mut self, rows: Option<u64>) -> Self {
        self.last_scanned_rows = Some(rows);
        self
    }

    pub fn memory_bytes(mut self, bytes: Option<u64>) -> Self {
        self.memory_bytes = Some(bytes);
        self
    }

    /// `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

/// Owner of the session state and its subscribers.
pub struct SessionStore {
    state: RwLock<Arc<SessionState>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
}

impl SessionStore {
    /// Create a store holding the default (idle) state.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(Arc::new(SessionState::default())),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        })
    }

    /// Current snapshot.
    pub fn get(&self) -> Arc<SessionState> {
        self.state.read().clone()
    }

    /// Merge `patch` into the state and notify subscribers.
    pub fn set(&self, patch: SessionPatch) -> Arc<SessionState> {
        self.update(|_| patch)
    }

    /// Build a patch from the current state and merge it atomically.
    ///
    /// Use this for read-modify-write changes such as adding to
    /// `loaded_bytes`, where a separate `get` then `set` could lose a
    /// concurrent update.
    pub fn update<F>(&self, f: F) -> Arc<SessionState>
    where
        F: FnOnce(&SessionState) -> SessionPatch,
    {
        let next = {
            let mut guard = self.state.write();
            let next = Arc::new(guard.merged(f(&guard)));
            *guard = next.clone();
            next
        };
        self.notify(&next);
        next
    }

    /// Register `listener`, called with the new state after every change.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        trace!(listener = id, "Session listener subscribed");
        Subscription {
            id,
            store: Arc::downgrade(self),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
        trace!(listener = id, "Session listener unsubscribed");
    }

    fn notify(&self, state: &SessionState) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(state);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.get())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle for a registered listener; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    store: Weak<SessionStore>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}
