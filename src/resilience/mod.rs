//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → connect timeout on the outbound connector
//!     → On transport failure: retries.rs (another attempt after a fixed delay)
//!     → Attempts exhausted: 502 to the caller
//! ```

pub mod retries;

pub use retries::RetryPolicy;
