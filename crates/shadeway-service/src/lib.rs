//! HTTP surface for shade-aware routing.
//!
//! The service follows a thin-handler pattern: everything that plans routes or
//! estimates shade lives in `shadeway-lib`, this crate only provides HTTP glue.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Parse request JSON / query                               │
//! │  - Validate parameters                                      │
//! │  - Call ShadeRouter on the blocking pool, bounded in time   │
//! │  - Format response or RFC 9457 problem                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`AppState`]: the shared [`shadeway_lib::ShadeRouter`] and request budget
//! - [`ProblemDetails`]: RFC 9457 error responses
//! - [`metrics`]: Prometheus recorder and business metrics
//! - [`logging`]: JSON or text tracing setup
//! - [`middleware`]: request IDs and HTTP metrics

#![deny(warnings)]

mod handlers;
mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod request;
mod response;
mod state;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub use handlers::HandlerResult;
pub use health::{health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, metrics_handler, MetricsConfig, MetricsError};
pub use middleware::{extract_or_generate_request_id, track_requests, RequestId};
pub use problem::{
    failure_reason, from_lib_error, ProblemDetails, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_ENDPOINT, PROBLEM_INVALID_REQUEST, PROBLEM_ROUTE_NOT_FOUND,
    PROBLEM_SERVICE_UNAVAILABLE, PROBLEM_TIMEOUT,
};
pub use request::{
    BuildingsQuery, CurrentShadeQuery, HourlyShadeQuery, RouteRequest, ShadeQuery,
    TimelinePoint, TimelineRequest, Validate, MAX_BUILDINGS_SPAN_DEGREES, MAX_TIMELINE_POINTS,
};
pub use response::{
    CacheResponse, CurrentShadeResponse, HourlyShadeResponse, ServiceResponse,
    ShadeTimelineResponse,
};
pub use state::{AppState, BUILDINGS_PATH_ENV};

/// Default listening port when `SERVICE_PORT` is unset.
pub const DEFAULT_PORT: u16 = 8006;

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/route", post(handlers::route_handler))
        .route("/api/v1/route/direct", post(handlers::direct_route_handler))
        .route("/api/v1/route/compare", post(handlers::compare_handler))
        .route("/api/v1/shade", get(handlers::shade_handler))
        .route("/api/v1/shade/hourly", get(handlers::hourly_shade_handler))
        .route("/api/v1/shade/current", get(handlers::current_shade_handler))
        .route("/api/v1/shade/timeline", post(handlers::shade_timeline_handler))
        .route("/api/v1/buildings", get(handlers::buildings_handler))
        .route("/api/v1/cache/stats", get(handlers::cache_stats_handler))
        .route("/api/v1/cache/clear", post(handlers::cache_clear_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route_layer(from_fn(track_requests))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
