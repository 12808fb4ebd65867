//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the inbound request onto the chosen backend
//! - Retry transport failures against the same backend
//! - Stream the upstream response back, holding the backend's slot until done
//!
//! # Design Decisions
//! - The request body is collected once (bounded) so every attempt can replay it
//! - Upstream status codes are never retried, 5xx included
//! - No overall deadline on proxied requests; only the TCP connect is bounded

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, request::Parts, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::response::{error_response, strip_hop_by_hop, GuardedBody};
use crate::load_balancer::LoadGuard;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Shared outbound client. Cloning shares the connection pool.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Build the process-wide outbound client.
pub fn build_client(connect_timeout: Duration) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// A failed try at forwarding one request to one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAttempt {
    pub number: u32,
    pub target: String,
    pub error: String,
}

/// Failures the proxy answers on behalf of the backend.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No available backends")]
    NoEligibleBackend,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    ReadBody(String),

    #[error("invalid upstream URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("{last_error}")]
    Exhausted {
        attempts: Vec<ProxyAttempt>,
        last_error: String,
    },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoEligibleBackend => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::ReadBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidUri { .. } | ProxyError::Exhausted { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_response(self.status(), self.to_string())
    }
}

/// Collect the inbound body, refusing anything over `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(ProxyError::BodyTooLarge { limit }),
        Err(e) => Err(ProxyError::ReadBody(e.to_string())),
    }
}

/// `base` + original path and query.
pub fn upstream_uri(base: &str, original: &Uri) -> Result<Uri, ProxyError> {
    let path_and_query = original.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let uri = format!("{}{}", base.trim_end_matches('/'), path_and_query);
    uri.parse().map_err(|e: axum::http::uri::InvalidUri| ProxyError::InvalidUri {
        uri,
        reason: e.to_string(),
    })
}

/// Error text including every source, e.g. "client error (Connect): tcp connect error: Connection refused".
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Sends requests to a chosen backend with bounded retry.
#[derive(Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    policy: RetryPolicy,
}

impl Forwarder {
    pub fn new(client: UpstreamClient, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Forward one request to the backend held by `guard`.
    ///
    /// On success the guard moves into the response body and is released when
    /// the body ends or is dropped. On failure it is released before returning.
    pub async fn forward(
        &self,
        guard: LoadGuard,
        parts: &Parts,
        body: Bytes,
    ) -> Result<Response, ProxyError> {
        let uri = upstream_uri(guard.base(), &parts.uri)?;

        let mut headers = parts.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let mut attempts = Vec::new();
        loop {
            let number = attempts.len() as u32 + 1;

            let mut request = Request::new(Body::from(body.clone()));
            *request.method_mut() = parts.method.clone();
            *request.uri_mut() = uri.clone();
            *request.headers_mut() = headers.clone();

            match self.client.request(request).await {
                Ok(response) => {
                    tracing::info!(
                        backend = %guard.url(),
                        attempt = number,
                        status = %response.status(),
                        "Upstream responded"
                    );
                    let (mut head, incoming) = response.into_parts();
                    strip_hop_by_hop(&mut head.headers);
                    let response = Response::from_parts(head, Body::new(incoming));
                    return Ok(GuardedBody::wrap_response(response, guard));
                }
                Err(e) => {
                    let error = describe(&e);
                    metrics::record_attempt_failure(guard.url());
                    tracing::warn!(backend = %guard.url(), attempt = number, error = %error, "Upstream attempt failed");

                    attempts.push(ProxyAttempt {
                        number,
                        target: guard.url().to_string(),
                        error: error.clone(),
                    });

                    if !self.policy.should_retry(number) {
                        tracing::error!(
                            backend = %guard.url(),
                            attempts = number,
                            uri = %uri,
                            "All upstream attempts failed"
                        );
                        return Err(ProxyError::Exhausted {
                            attempts,
                            last_error: error,
                        });
                    }
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        }
    }
}
