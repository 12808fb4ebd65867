//! Request ID handling.
//!
//! Every inbound request carries an `x-request-id`: the client's own if it sent
//! one, otherwise a fresh UUID v4. The header travels to the backend with the
//! rest of the request headers and is echoed on the response.

use axum::http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID of `request`, or `"-"` when absent.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn generates_distinct_uuids() {
        let req = Request::new(Body::empty());
        let mut make = MakeRequestUuidV4;
        let a = make.make_request_id(&req).unwrap();
        let b = make.make_request_id(&req).unwrap();
        assert_ne!(a.header_value(), b.header_value());
        assert!(Uuid::parse_str(a.header_value().to_str().unwrap()).is_ok());
    }

    #[test]
    fn reads_existing_id() {
        let req = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_id(&req), "abc-123");
        assert_eq!(request_id(&Request::new(Body::empty())), "-");
    }
}
