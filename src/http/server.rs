//! HTTP server setup and the per-request pipeline.
//!
//! # Responsibilities
//! - Create the Axum router: admin routes plus the proxy fallback
//! - Wire up middleware (request ID, tracing)
//! - Run the request pipeline: admin bypass → select → forward
//! - Own the health monitor task for the lifetime of the server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::admin;
use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::forward::{build_client, read_body, Forwarder, ProxyError, UpstreamClient};
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::http::response::error_response;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::Registry;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub forwarder: Forwarder,
    pub max_body_bytes: usize,
}

/// HTTP server for the balancing proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    registry: Arc<Registry>,
    client: UpstreamClient,
}

impl HttpServer {
    /// Create a new HTTP server over `registry`.
    ///
    /// The outbound client built here is shared by the forwarder and the
    /// health monitor.
    pub fn new(config: ProxyConfig, registry: Arc<Registry>) -> Self {
        let client = build_client(Duration::from_secs(config.timeouts.connect_secs));
        let forwarder = Forwarder::new(client.clone(), RetryPolicy::from(&config.retries));

        let state = AppState {
            registry: registry.clone(),
            forwarder,
            max_body_bytes: config.retries.max_body_bytes,
        };

        Self {
            router: Self::build_router(state),
            config,
            registry,
            client,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        admin::setup_admin_router()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Open connections are drained, then the health monitor is joined before
    /// the shared client is released.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let monitor = HealthMonitor::new(
            self.registry.clone(),
            self.config.health_check.clone(),
            self.client.clone(),
        )
        .spawn(shutdown.clone());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown;
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.recv().await })
            .await;

        if served.is_err() {
            monitor.abort();
        }
        match monitor.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!(error = %e, "Health monitor task failed"),
        }
        drop(self.client);

        tracing::info!("HTTP server stopped");
        served
    }
}

/// Proxy pipeline for every non-admin request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let request_id = request_id(&request).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Unknown paths under an admin prefix are not ours to proxy.
    if admin::is_admin_path(&path) {
        return error_response(StatusCode::NOT_FOUND, "Not Found");
    }

    let (parts, body) = request.into_parts();
    let body = match read_body(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, client = %client, error = %e, "Rejected request body");
            metrics::record_request(method.as_str(), e.status().as_u16(), "none", start);
            return e.into_response();
        }
    };

    let Some(guard) = state.registry.acquire() else {
        tracing::info!(request_id = %request_id, client = %client, path = %path, "No available backends");
        metrics::record_request(method.as_str(), 503, "none", start);
        return ProxyError::NoEligibleBackend.into_response();
    };
    let backend = guard.url().to_string();

    tracing::info!(
        request_id = %request_id,
        client = %client,
        method = %method,
        path = %path,
        backend = %backend,
        "Forwarding request"
    );

    let span = tracing::info_span!("forward", request_id = %request_id, backend = %backend);
    let response = match state.forwarder.forward(guard, &parts, body).instrument(span).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), &backend, start);
    response
}
