//! Client for the balancing proxy's admin surface.

pub mod client;

pub use client::{AdminClient, AdminError, LoadReport, ServerList};
