//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → registry.rs (lock backend list)
//!     → least_conn.rs (pick healthy backend with fewest outstanding requests)
//!     → backend.rs (increment, hand out LoadGuard)
//!     → [forward] → LoadGuard dropped → decrement
//!
//! Admin register/deregister
//!     → registry.rs (mutate list)
//!     → store.rs (rewrite registry file)
//! ```
//!
//! # Design Decisions
//! - Selector is a pure function over the locked backend list
//! - Select and increment happen inside one critical section
//! - Unhealthy backends excluded from selection
//! - Registry file holds identities only; counters live in memory

pub mod backend;
pub mod least_conn;
pub mod registry;
pub mod store;

pub use backend::{Backend, BackendLoad, LoadGuard};
pub use registry::Registry;
pub use store::{RegistryStore, StoreError};
