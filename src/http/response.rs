//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Synthesize proxy-generated error responses
//! - Keep the backend's outstanding slot until the streamed body is done
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - The slot is released at end of stream, or when the body is dropped
//!   because the client went away

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use http_body::{Frame, SizeHint};
use serde_json::json;

use crate::load_balancer::LoadGuard;

/// Headers that describe a single hop and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// A response generated by the proxy itself: `{"detail": "..."}`.
pub fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

/// Response body that holds a [`LoadGuard`] until the upstream stream finishes.
pub struct GuardedBody {
    inner: Body,
    guard: Option<LoadGuard>,
}

impl GuardedBody {
    pub fn new(inner: Body, guard: LoadGuard) -> Self {
        Self {
            inner,
            guard: Some(guard),
        }
    }

    /// Move `guard` into the body of `response`.
    pub fn wrap_response(response: Response, guard: LoadGuard) -> Response {
        let (parts, body) = response.into_parts();
        Response::from_parts(parts, Body::new(Self::new(body, guard)))
    }

    fn finish(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release();
        }
    }
}

impl http_body::Body for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(None) = polled {
            this.finish();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
