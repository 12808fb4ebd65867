//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Snapshot registered backends
//!     → Probe each one concurrently (GET <backend><path>, short timeout)
//!     → Registry::record_probe (dropped if the backend was replaced)
//! ```
//!
//! # Design Decisions
//! - New backends start unhealthy; the first successful probe admits them
//! - A single failed probe removes a backend from rotation
//! - Down and slow are the same verdict
//! - Probe failures stay inside the monitor; they are only logged

pub mod active;

pub use active::HealthMonitor;
