//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → admin routes, or the proxy pipeline:
//!         → read body (bounded)
//!         → Registry::acquire (select + increment)
//!         → forward.rs (send with retry)
//!         → response.rs (strip hop-by-hop, attach LoadGuard to body)
//!     → Stream to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{Forwarder, ProxyError};
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
