//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use balancing_proxy::{HttpServer, ProxyConfig, Registry, Shutdown};

/// A proxy serving on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config for tests: probes off, short retry delay.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.health_check.enabled = false;
    config.retries.delay_ms = 50;
    config.timeouts.connect_secs = 1;
    config
}

pub async fn start_proxy(config: ProxyConfig, registry: Arc<Registry>) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry.clone());
    tokio::spawn(server.run(listener, shutdown.subscribe()));
    TestProxy {
        addr,
        registry,
        shutdown,
    }
}

/// Registers each backend and marks it healthy without waiting for a probe.
pub async fn healthy_registry(backends: &[String]) -> Arc<Registry> {
    let registry = Arc::new(Registry::ephemeral());
    for url in backends {
        registry.register(url).await;
        registry.set_health(url, true);
    }
    registry
}

pub fn http_url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// Outstanding count for `url`, or `None` if it is not registered.
pub fn outstanding(registry: &Registry, url: &str) -> Option<usize> {
    registry
        .snapshot_load()
        .into_iter()
        .find(|b| b.url == url)
        .map(|b| b.outstanding)
}

/// Poll until the sum of outstanding counts equals `expected`.
pub async fn wait_for_total(registry: &Registry, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        let total: usize = registry.snapshot_load().iter().map(|b| b.outstanding).sum();
        if total == expected {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("outstanding total stuck at {total}, expected {expected}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Read one request head plus a `Content-Length` body. Returns the request line and body.
async fn read_request(socket: &mut TcpStream) -> Option<(String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buf[head_end..]).to_string();
    Some((request_line, body))
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

async fn write_response(socket: &mut TcpStream, status: u16, body: &str) {
    let response_str = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text(status),
        body.len(),
        body
    );
    let _ = socket.write_all(response_str.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a simple mock backend that returns a fixed response to every path.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let (status, body) = f().await;
                write_response(&mut socket, status, &body).await;
            });
        }
    });
    addr
}

/// Start a backend that answers with `"<request line>\n<body>"`.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Some((line, body)) = read_request(&mut socket).await {
                    write_response(&mut socket, 200, &format!("{line}\n{body}")).await;
                }
            });
        }
    });
    addr
}

/// Start a backend that accepts each connection and closes it without answering.
///
/// Every accepted connection bumps `accepted`.
pub async fn start_dropping_backend(accepted: Arc<AtomicUsize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });
    addr
}

/// Serve an axum router as a backend.
pub async fn start_router_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
