//! Backend registry.
//!
//! # Responsibilities
//! - Own the set of registered backends and their per-backend counters
//! - Atomically select-and-increment for new requests
//! - Mirror the identity list into the registry file on every mutation
//!
//! # Locking
//! One `std::sync::Mutex` guards the backend list. It is held only across
//! in-memory reads and writes, never across an `.await`, so network calls and
//! file writes never serialize behind it. File writes take a separate async
//! lock and re-read the list once they hold it, so the last write always
//! carries the latest list.
//!
//! Every registration gets a fresh generation number. Guards and probe
//! results carry the generation they were taken against, so nothing from a
//! removed entry can touch a later registration of the same URL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::load_balancer::backend::{Backend, BackendLoad, LoadGuard};
use crate::load_balancer::least_conn;
use crate::load_balancer::store::RegistryStore;
use crate::observability::metrics;

/// Process-wide registry of backends.
#[derive(Debug)]
pub struct Registry {
    backends: Mutex<Vec<Backend>>,
    store: Option<RegistryStore>,
    persist_lock: tokio::sync::Mutex<()>,
    next_generation: AtomicU64,
}

impl Registry {
    /// Create a registry with the given identities and optional backing file.
    pub fn new(store: Option<RegistryStore>, urls: Vec<String>) -> Self {
        let registry = Self {
            backends: Mutex::new(Vec::with_capacity(urls.len())),
            store,
            persist_lock: tokio::sync::Mutex::new(()),
            next_generation: AtomicU64::new(0),
        };
        {
            let mut backends = registry.lock();
            for url in urls {
                if !backends.iter().any(|b| b.url == url) {
                    backends.push(Backend::new(url, registry.generation()));
                }
            }
        }
        registry
    }

    /// A registry that never touches disk.
    pub fn ephemeral() -> Self {
        Self::new(None, Vec::new())
    }

    /// Load identities from `store`; every backend starts idle and unhealthy.
    pub async fn load(store: RegistryStore) -> Self {
        let urls = store.load().await;
        tracing::info!(path = %store.path().display(), backends = ?urls, "Registry loaded");
        Self::new(Some(store), urls)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Backend>> {
        self.backends.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Add `url` unless present. Returns the identity list after the call.
    pub async fn register(&self, url: &str) -> Vec<String> {
        let (added, list) = {
            let mut backends = self.lock();
            let added = !backends.iter().any(|b| b.url == url);
            if added {
                backends.push(Backend::new(url, self.generation()));
            }
            (added, identities(&backends))
        };

        if added {
            tracing::info!(backend = %url, "Added backend");
            metrics::record_backend_health(url, false);
            metrics::set_outstanding(url, 0);
            self.persist().await;
        }
        list
    }

    /// Remove `url` if present. Returns the identity list after the call.
    pub async fn deregister(&self, url: &str) -> Vec<String> {
        let (removed, list) = {
            let mut backends = self.lock();
            let before = backends.len();
            backends.retain(|b| b.url != url);
            (backends.len() != before, identities(&backends))
        };

        if removed {
            tracing::info!(backend = %url, "Removed backend");
            metrics::clear_backend(url);
            self.persist().await;
        }
        list
    }

    /// Snapshot of identities in registration order.
    pub fn list(&self) -> Vec<String> {
        identities(&self.lock())
    }

    /// Snapshot of counters and health in registration order.
    pub fn snapshot_load(&self) -> Vec<BackendLoad> {
        self.lock().iter().map(BackendLoad::from).collect()
    }

    /// Identities paired with their current generation, for the prober.
    pub fn targets(&self) -> Vec<(String, u64)> {
        self.lock()
            .iter()
            .map(|b| (b.url.clone(), b.generation))
            .collect()
    }

    /// Give back one slot taken by [`Registry::acquire`].
    ///
    /// No-op if `url` is gone or was registered again since the slot was taken.
    pub(crate) fn release_slot(&self, url: &str, generation: u64) {
        let mut backends = self.lock();
        if let Some(b) = backends
            .iter_mut()
            .find(|b| b.url == url && b.generation == generation)
        {
            b.adjust(-1);
            metrics::set_outstanding(url, b.outstanding);
        }
    }

    /// Set the health flag of the current registration of `url`.
    ///
    /// Returns the previous flag, or `None` if the backend is gone.
    pub fn set_health(&self, url: &str, healthy: bool) -> Option<bool> {
        self.update_health(url, None, healthy)
    }

    /// Record a probe taken against `generation`. Stale results are dropped.
    pub fn record_probe(&self, url: &str, generation: u64, healthy: bool) -> Option<bool> {
        self.update_health(url, Some(generation), healthy)
    }

    fn update_health(&self, url: &str, generation: Option<u64>, healthy: bool) -> Option<bool> {
        let mut backends = self.lock();
        let b = backends
            .iter_mut()
            .find(|b| b.url == url && generation.map_or(true, |g| g == b.generation))?;
        let previous = b.healthy;
        b.healthy = healthy;
        metrics::record_backend_health(url, healthy);
        Some(previous)
    }

    /// Select the least loaded healthy backend and take one outstanding slot on it.
    ///
    /// Selection and increment happen under the same lock, so concurrent callers
    /// never both observe the same stale minimum.
    pub fn acquire(self: &Arc<Self>) -> Option<LoadGuard> {
        let (url, generation) = {
            let mut backends = self.lock();
            let idx = least_conn::select(&backends)?;
            let chosen = &mut backends[idx];
            chosen.adjust(1);
            metrics::set_outstanding(&chosen.url, chosen.outstanding);
            (chosen.url.clone(), chosen.generation)
        };
        Some(LoadGuard::new(Arc::clone(self), url, generation))
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _write = self.persist_lock.lock().await;
        let list = self.list();
        if let Err(e) = store.save(&list).await {
            tracing::error!(path = %store.path().display(), error = %e, "Failed to persist backends; keeping in-memory state");
        }
    }
}

fn identities(backends: &[Backend]) -> Vec<String> {
    backends.iter().map(|b| b.url.clone()).collect()
}
