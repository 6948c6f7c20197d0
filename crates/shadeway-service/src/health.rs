//! Health check handlers for liveness and readiness probes.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use shadeway_lib::RouterCacheStats;

use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" when serving.
    pub status: String,
    pub service: String,
    pub version: String,
    /// RFC 3339 time the probe was answered.
    pub checked_at: String,

    /// Scoring pool size (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Cache occupancy and hit rates (readiness only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caches: Option<RouterCacheStats>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            checked_at: chrono::Utc::now().to_rfc3339(),
            workers: None,
            caches: None,
        }
    }

    pub fn ready(service: &str, version: &str, workers: usize, caches: RouterCacheStats) -> Self {
        Self {
            workers: Some(workers),
            caches: Some(caches),
            ..Self::alive(service, version)
        }
    }
}

/// `GET /health/live`
pub async fn health_live() -> (StatusCode, Json<HealthStatus>) {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// `GET /health/ready`
pub async fn health_ready(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let router = state.router();
    let status = HealthStatus::ready(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        router.config().performance.max_workers,
        router.cache_stats(),
    );
    (StatusCode::OK, Json(status))
}
