//! Shade-aware route planning HTTP microservice.
//!
//! # Endpoints
//!
//! - `POST /api/v1/route` - Shade-aware route between two points
//! - `POST /api/v1/route/direct` - Straight-line route with shade scores
//! - `POST /api/v1/route/compare` - Both routes and their differences
//! - `GET /api/v1/shade` - Shade at one point and time
//! - `GET /api/v1/shade/hourly` - Shade at one point for every hour
//! - `GET /api/v1/shade/current` - Shade at one point right now
//! - `POST /api/v1/shade/timeline` - Hourly shade along an existing route
//! - `GET /api/v1/buildings` - Buildings in a bounding box as GeoJSON
//! - `GET /api/v1/cache/stats`, `POST /api/v1/cache/clear`
//! - `GET /metrics` - Prometheus metrics endpoint
//! - `GET /health/live`, `GET /health/ready` - Kubernetes probes
//!
//! # Configuration
//!
//! - `SHADEWAY_*` - Router settings, see `ShadewayConfig::from_env`
//! - `SHADEWAY_BUILDINGS` - GeoJSON building file instead of Overpass
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `SERVICE_PORT` - HTTP port (default: 8006)

use std::env;
use std::net::SocketAddr;

use shadeway_lib::CacheSweeper;
use shadeway_service::{
    app, init_logging, init_metrics, AppState, LoggingConfig, MetricsConfig, DEFAULT_PORT,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env();
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("failed to initialise logging: {e}");
    }

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let port: u16 = env::var("SERVICE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    info!(port, "starting shadeway service");

    // The Overpass client is blocking; it is built and dropped outside the
    // async runtime.
    let state = AppState::from_env().map_err(|e| {
        error!(error = %e, "failed to load application state");
        e
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(state.clone(), port))?;
    drop(runtime);
    drop(state);

    info!("shutdown complete");
    Ok(())
}

async fn serve(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = CancellationToken::new();
    let sweeper = CacheSweeper::new(state.router().config().cache.sweep_interval())
        .with_targets(state.router().sweep_targets());
    let sweeper = tokio::spawn(sweeper.run(shutdown.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "cache sweeper did not stop cleanly");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
