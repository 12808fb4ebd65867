//! Retry logic.
//!
//! # Responsibilities
//! - Bound the number of attempts per proxied request
//! - Space attempts by a fixed delay
//!
//! # Design Decisions
//! - Only transport failures (connect refused, reset, connect timeout) retry
//! - Any upstream status, 5xx included, is a final answer passed to the caller
//! - Retries stay on the backend chosen for the request

use std::time::Duration;

use crate::config::RetryConfig;

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
    }
}
