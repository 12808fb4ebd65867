//! Load-aware reverse proxy library.
//!
//! Routes each request to the healthy backend with the fewest outstanding
//! requests, probes backends in the background, and lets operators register
//! and deregister backends at runtime.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Registry, RegistryStore};
