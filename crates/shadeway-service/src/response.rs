//! Response wrapper and payloads for successful HTTP responses.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shadeway_lib::{PointShade, RouterCacheStats, ShadeTimeline, TimeOfDay};

/// Wrapper for successful responses with content type metadata.
///
/// Mirrors `ProblemDetails` by carrying the content type in the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    #[serde(flatten)]
    pub data: T,

    pub content_type: String,
}

impl<T> ServiceResponse<T> {
    pub fn new(data: T) -> Self {
        Self::with_content_type(data, "application/json")
    }

    pub fn with_content_type(data: T, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }
}

impl<T> From<T> for ServiceResponse<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: Serialize> IntoResponse for ServiceResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Payload of `GET /api/v1/shade/hourly`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyShadeResponse {
    pub longitude: f64,
    pub latitude: f64,
    pub predictions: Vec<PointShade>,
}

/// Payload of `GET /api/v1/shade/current`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentShadeResponse {
    #[serde(flatten)]
    pub shade: PointShade,
    /// When the client should ask again.
    pub next_update: TimeOfDay,
    pub update_interval_minutes: u32,
}

/// Payload of `POST /api/v1/shade/timeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadeTimelineResponse {
    pub date: String,
    #[serde(flatten)]
    pub timeline: ShadeTimeline,
}

/// Payload of the cache endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub caches: RouterCacheStats,
}
