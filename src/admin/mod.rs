//! Admin surface.
//!
//! ```text
//! POST   /servers        {"url": ...}  → {"servers": [...]}
//! DELETE /servers        {"url": ...}  → {"servers": [...]}
//! GET    /servers                      → {"servers": [...]}
//! GET    /queue-lengths                → {"queue_lengths": {...}, "health": {...}}
//! ```
//!
//! Paths under these prefixes are never proxied.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub const SERVERS_PATH: &str = "/servers";
pub const QUEUE_LENGTHS_PATH: &str = "/queue-lengths";

/// Whether `path` belongs to the admin surface.
pub fn is_admin_path(path: &str) -> bool {
    path == QUEUE_LENGTHS_PATH
        || path == SERVERS_PATH
        || path
            .strip_prefix(SERVERS_PATH)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn setup_admin_router() -> Router<AppState> {
    Router::new()
        .route(
            SERVERS_PATH,
            get(list_servers).post(add_server).delete(remove_server),
        )
        .route(QUEUE_LENGTHS_PATH, get(queue_lengths))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_paths() {
        assert!(is_admin_path("/servers"));
        assert!(is_admin_path("/servers/extra"));
        assert!(is_admin_path("/queue-lengths"));
        assert!(!is_admin_path("/serversfoo"));
        assert!(!is_admin_path("/queue-lengths/x"));
        assert!(!is_admin_path("/api/servers"));
        assert!(!is_admin_path("/"));
    }
}
