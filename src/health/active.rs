//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend's liveness path
//! - Write each result into the registry
//!
//! Probes within a round run concurrently, so one slow backend never delays
//! the verdict on another. A probe that does not get a 2xx answer within the
//! timeout marks the backend unhealthy.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::http::forward::UpstreamClient;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::Registry;

pub struct HealthMonitor {
    registry: Arc<Registry>,
    config: HealthCheckConfig,
    client: UpstreamClient,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>, config: HealthCheckConfig, client: UpstreamClient) -> Self {
        Self {
            registry,
            config,
            client,
        }
    }

    /// Run the monitor on its own task.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Probe rounds until `shutdown` fires. A round in progress is abandoned.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.check_all() => {}
                        _ = shutdown.recv() => break,
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::info!("Health monitor stopped");
    }

    /// Probe every backend currently registered, concurrently.
    pub async fn check_all(&self) {
        let targets = self.registry.targets();
        join_all(
            targets
                .iter()
                .map(|(url, generation)| self.check_one(url, *generation)),
        )
        .await;
    }

    async fn check_one(&self, url: &str, generation: u64) {
        let healthy = self.probe(url).await;
        match self.registry.record_probe(url, generation, healthy) {
            Some(previous) if previous != healthy => {
                tracing::info!(backend = %url, healthy, "Backend health changed");
            }
            Some(_) => {}
            None => tracing::debug!(backend = %url, "Backend deregistered or replaced during probe"),
        }
    }

    async fn probe(&self, url: &str) -> bool {
        let uri = format!("{}{}", url.trim_end_matches('/'), self.config.path);
        let request = match Request::get(&uri)
            .header(header::USER_AGENT, "balancing-proxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::debug!(backend = %url, error = %e, "Health check request could not be built");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(backend = %url, status = %response.status(), "Health check failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %url, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %url, "Health check failed: timeout");
                false
            }
        }
    }
}
