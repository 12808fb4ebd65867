//! Load testing for the balancing proxy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

mod common;

async fn counting_backend(name: &'static str, hits: Arc<AtomicUsize>) -> String {
    common::http_url(
        common::start_programmable_backend(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (200, format!("Hello from {name}"))
            }
        })
        .await,
    )
}

#[tokio::test]
async fn test_load_performance() {
    // 1. Setup mock backends
    let hits_a = Arc::new(AtomicUsize::new(0));
    let hits_b = Arc::new(AtomicUsize::new(0));
    let a = counting_backend("a", hits_a.clone()).await;
    let b = counting_backend("b", hits_b.clone()).await;

    // 2. Start proxy
    let registry = common::healthy_registry(&[a, b]).await;
    let proxy = common::start_proxy(common::test_config(), registry.clone()).await;

    // 3. Run load test
    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = proxy.url("/");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() && res.bytes().await.is_ok() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "some requests failed");
    assert_eq!(
        hits_a.load(Ordering::SeqCst) + hits_b.load(Ordering::SeqCst),
        total_requests
    );
    common::wait_for_total(&registry, 0).await;

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p95 = all_latencies[(all_latencies.len() as f64 * 0.95) as usize];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P95 Latency:    {:?}", p95);
    println!("P99 Latency:    {:?}", p99);
    println!("Backend split:  a={} b={}", hits_a.load(Ordering::SeqCst), hits_b.load(Ordering::SeqCst));
    println!("-------------------------\n");
}
