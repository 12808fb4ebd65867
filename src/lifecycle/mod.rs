//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Config → Registry load → HTTP client → Bind → Spawn prober → Serve
//!
//! Shutdown:
//!     signals.rs (SIGINT/SIGTERM)
//!     → shutdown.rs trigger
//!     → server stops accepting, drains open connections
//!     → prober task joined
//!     → shared HTTP client dropped
//! ```
//!
//! # Design Decisions
//! - Bind failure is fatal; everything after it degrades gracefully
//! - In-flight proxy requests are not cancelled by shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
