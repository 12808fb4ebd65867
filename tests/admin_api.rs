//! Admin routes driven through the router without a socket.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use balancing_proxy::{HttpServer, ProxyConfig, Registry};

fn server() -> HttpServer {
    let mut config = ProxyConfig::default();
    config.health_check.enabled = false;
    HttpServer::new(config, Arc::new(Registry::ephemeral()))
}

async fn call(server: &HttpServer, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = server.router().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_register_is_idempotent_and_ordered() {
    let server = server();
    for url in ["http://a:1", "http://b:2", "http://a:1"] {
        let (status, _) = call(&server, Method::POST, "/servers", Some(json!({ "url": url }))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(&server, Method::GET, "/servers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "servers": ["http://a:1", "http://b:2"] }));
}

#[tokio::test]
async fn test_deregister_unknown_is_noop() {
    let server = server();
    call(&server, Method::POST, "/servers", Some(json!({ "url": "http://a:1" }))).await;

    let (status, body) =
        call(&server, Method::DELETE, "/servers", Some(json!({ "url": "http://zzz:9" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "servers": ["http://a:1"] }));
}

#[tokio::test]
async fn test_queue_lengths_reports_counts_and_health() {
    let server = server();
    call(&server, Method::POST, "/servers", Some(json!({ "url": "http://a:1" }))).await;
    call(&server, Method::POST, "/servers", Some(json!({ "url": "http://b:2" }))).await;
    server.registry().set_health("http://b:2", true);
    let _guard = server.registry().acquire().unwrap();

    let (status, body) = call(&server, Method::GET, "/queue-lengths", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "queue_lengths": { "http://a:1": 0, "http://b:2": 1 },
            "health": { "http://a:1": false, "http://b:2": true },
        })
    );
}

#[tokio::test]
async fn test_invalid_url_is_rejected() {
    let server = server();
    let (status, body) =
        call(&server, Method::POST, "/servers", Some(json!({ "url": "not a url" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("not a url"));

    let (_, body) = call(&server, Method::GET, "/servers", None).await;
    assert_eq!(body, json!({ "servers": [] }));
}

#[tokio::test]
async fn test_missing_url_field_is_rejected() {
    let server = server();
    let (status, _) = call(&server, Method::POST, "/servers", Some(json!({ "address": "x" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_non_admin_path_without_backends_is_503() {
    let server = server();
    let (status, body) = call(&server, Method::GET, "/api/anything", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].is_string());
}
