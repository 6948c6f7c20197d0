//! Prometheus metrics for the HTTP service.
//!
//! [`init_metrics`] installs the global recorder once; [`metrics_handler`]
//! renders it for `/metrics`. The `record_*` helpers are the business
//! metrics emitted by the route and shade handlers.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MetricsConfig {
    /// `METRICS_ENABLED=false` disables the recorder.
    pub fn from_env() -> Self {
        let enabled = std::env::var("METRICS_ENABLED")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        Self { enabled }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    #[error("metrics are disabled")]
    Disabled,
    #[error("metrics recorder already initialized")]
    AlreadyInitialized,
    #[error("failed to install metrics recorder: {0}")]
    InstallFailed(String),
}

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if PROMETHEUS_HANDLE.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// Prometheus exposition text, or a comment when no recorder is installed.
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

/// Increments `shadeway_routes_calculated_total`.
pub fn record_route_calculated(strategy: &str, mode: &str, cache_used: bool) {
    metrics::counter!(
        "shadeway_routes_calculated_total",
        "strategy" => strategy.to_string(),
        "mode" => mode.to_string(),
        "cache" => if cache_used { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Increments `shadeway_routes_failed_total`.
pub fn record_route_failed(reason: &str, strategy: &str) {
    metrics::counter!(
        "shadeway_routes_failed_total",
        "reason" => reason.to_string(),
        "strategy" => strategy.to_string()
    )
    .increment(1);
}

/// Records the route's length and mean shade.
pub fn record_route_summary(distance_m: f64, average_shade: f64, strategy: &str) {
    metrics::histogram!(
        "shadeway_route_distance_meters",
        "strategy" => strategy.to_string()
    )
    .record(distance_m);
    metrics::histogram!(
        "shadeway_route_shade_ratio",
        "strategy" => strategy.to_string()
    )
    .record(average_shade);
}

/// Increments `shadeway_shade_queries_total`.
pub fn record_shade_query(kind: &str) {
    metrics::counter!(
        "shadeway_shade_queries_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Records the number of buildings served by `/api/v1/buildings`.
pub fn record_buildings_returned(count: usize) {
    metrics::histogram!("shadeway_buildings_returned").record(count as f64);
}
