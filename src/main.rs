//! Balancing proxy binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                   BALANCING PROXY                     │
//!                     │                                                       │
//!  Client Request     │  ┌─────────┐   admin path?   ┌──────────────┐         │
//!  ───────────────────┼─▶│  http   │────── yes ─────▶│    admin     │         │
//!                     │  │ server  │                 └──────┬───────┘         │
//!                     │  └────┬────┘                        │ register/       │
//!                     │       │ no                          ▼ deregister      │
//!                     │       ▼                     ┌──────────────┐  persist │
//!                     │  ┌──────────────┐  acquire  │   registry   │─────────▶│ backends.json
//!                     │  │   forward    │◀──────────│ + least_conn │          │
//!                     │  │ retry ×3     │  release  └──────▲───────┘          │
//!                     │  └──────┬───────┘                  │ set_health       │
//!                     │         │                   ┌──────┴───────┐          │
//!  Client Response    │         │                   │    health    │──probe──▶│ Backends
//!  ◀──────────────────┼─────────┘◀──── stream ──────│   monitor    │          │
//!                     │                             └──────────────┘          │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use balancing_proxy::config::{load_config, ProxyConfig};
use balancing_proxy::lifecycle::{signals, Shutdown};
use balancing_proxy::observability::{logging, metrics};
use balancing_proxy::{HttpServer, Registry, RegistryStore};

#[derive(Parser)]
#[command(name = "balancing-proxy")]
#[command(about = "Least-outstanding-requests reverse proxy", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the registry file path.
    #[arg(short, long)]
    registry_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    if let Some(file) = args.registry_file {
        config.registry.file = file;
    }

    logging::init(&config.observability);
    tracing::info!("balancing-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        registry_file = %config.registry.file,
        health_interval_secs = config.health_check.interval_secs,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let registry = Arc::new(Registry::load(RegistryStore::new(&config.registry.file)).await);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry);
    let mut serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = signals::wait_for_signal() => {
            tracing::info!("Shutting down health monitor and HTTP client");
            shutdown.trigger();
            (&mut serving).await??;
        }
        result = &mut serving => result??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
