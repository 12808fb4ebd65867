//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single registered backend
//! - Track outstanding (in-flight) requests
//! - Track health state as last reported by the prober
//! - Release the outstanding slot exactly once via `LoadGuard`

use serde::Serialize;
use std::sync::Arc;

use crate::load_balancer::registry::Registry;

/// A single backend server as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Identity of the backend (its base URL as registered).
    pub url: String,
    /// Distinguishes this registration from earlier ones of the same URL.
    pub generation: u64,
    /// Requests dispatched to this backend and not yet completed.
    pub outstanding: usize,
    /// Result of the most recent health probe. False until the first success.
    pub healthy: bool,
}

impl Backend {
    /// Create a freshly registered backend: idle and not yet probed.
    pub fn new(url: impl Into<String>, generation: u64) -> Self {
        Self {
            url: url.into(),
            generation,
            outstanding: 0,
            healthy: false,
        }
    }

    /// Apply a signed delta to the outstanding count, clamping at zero.
    pub fn adjust(&mut self, delta: isize) {
        self.outstanding = self.outstanding.saturating_add_signed(delta);
    }
}

/// Point-in-time load and health of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendLoad {
    pub url: String,
    pub outstanding: usize,
    pub healthy: bool,
}

impl From<&Backend> for BackendLoad {
    fn from(b: &Backend) -> Self {
        Self {
            url: b.url.clone(),
            outstanding: b.outstanding,
            healthy: b.healthy,
        }
    }
}

/// A RAII guard owning one outstanding slot on a backend.
///
/// Created by [`Registry::acquire`] after the count was incremented. The count is
/// decremented exactly once, either through [`LoadGuard::release`] or on drop.
/// If the backend was deregistered in the meantime the decrement is a no-op,
/// even when the same URL has since been registered again.
#[derive(Debug)]
pub struct LoadGuard {
    registry: Arc<Registry>,
    url: String,
    generation: u64,
    released: bool,
}

impl LoadGuard {
    pub(crate) fn new(registry: Arc<Registry>, url: String, generation: u64) -> Self {
        Self {
            registry,
            url,
            generation,
            released: false,
        }
    }

    /// Identity of the backend this slot belongs to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Give the slot back now instead of waiting for drop.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release_slot(&self.url, self.generation);
        }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.release_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_backend_is_idle_and_unhealthy() {
        let b = Backend::new("http://10.0.0.1:8000", 7);
        assert_eq!(b.generation, 7);
        assert_eq!(b.outstanding, 0);
        assert!(!b.healthy);
    }

    #[test]
    fn adjust_never_goes_negative() {
        let mut b = Backend::new("http://10.0.0.1:8000", 1);
        b.adjust(1);
        b.adjust(-1);
        b.adjust(-1);
        assert_eq!(b.outstanding, 0);
    }
}
