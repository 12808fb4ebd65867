use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::response::error_response;
use crate::http::server::AppState;

/// Body of register/deregister calls.
#[derive(Debug, Deserialize)]
pub struct ServerRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerList {
    pub servers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadReport {
    pub queue_lengths: BTreeMap<String, usize>,
    pub health: BTreeMap<String, bool>,
}

/// Rejected admin input.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        error_response(StatusCode::BAD_REQUEST, self.to_string())
    }
}

/// Accept only absolute `http://` URLs with a host.
pub fn validate_backend_url(raw: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let parsed = url::Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if parsed.scheme() != "http" {
        return Err(invalid("scheme must be http"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(())
}

pub async fn add_server(
    State(state): State<AppState>,
    Json(req): Json<ServerRequest>,
) -> Result<Json<ServerList>, RegistryError> {
    validate_backend_url(&req.url)?;
    let servers = state.registry.register(&req.url).await;
    Ok(Json(ServerList { servers }))
}

// Unknown URLs are not an error.
pub async fn remove_server(
    State(state): State<AppState>,
    Json(req): Json<ServerRequest>,
) -> Json<ServerList> {
    let servers = state.registry.deregister(&req.url).await;
    Json(ServerList { servers })
}

pub async fn list_servers(State(state): State<AppState>) -> Json<ServerList> {
    Json(ServerList {
        servers: state.registry.list(),
    })
}

pub async fn queue_lengths(State(state): State<AppState>) -> Json<LoadReport> {
    let mut report = LoadReport {
        queue_lengths: BTreeMap::new(),
        health: BTreeMap::new(),
    };
    for b in state.registry.snapshot_load() {
        report.queue_lengths.insert(b.url.clone(), b.outstanding);
        report.health.insert(b.url, b.healthy);
    }
    Json(report)
}
