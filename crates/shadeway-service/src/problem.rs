//! RFC 9457 Problem Details for HTTP APIs.
//!
//! Provides structured error responses following the Problem Details standard.
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use shadeway_lib::Error as LibError;

/// Problem type URI for invalid request parameters.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for endpoints that land inside a building or off the grid.
pub const PROBLEM_INVALID_ENDPOINT: &str = "/problems/invalid-endpoint";

/// Problem type URI for routes that cannot be found.
pub const PROBLEM_ROUTE_NOT_FOUND: &str = "/problems/route-not-found";

/// Problem type URI for requests that exceeded the configured time budget.
pub const PROBLEM_TIMEOUT: &str = "/problems/timeout";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// Problem type URI for service unavailable (e.g., building data unreachable).
pub const PROBLEM_SERVICE_UNAVAILABLE: &str = "/problems/service-unavailable";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use shadeway_service::{ProblemDetails, PROBLEM_ROUTE_NOT_FOUND};
/// use axum::http::StatusCode;
///
/// let problem = ProblemDetails::new(
///     PROBLEM_ROUTE_NOT_FOUND,
///     "Route Not Found",
///     StatusCode::NOT_FOUND,
/// )
/// .with_detail("No path from cell (3, 4) to cell (30, 12)")
/// .with_request_id("req-12345");
/// assert_eq!(problem.status, 404);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    /// HTTP status code for this problem.
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI reference identifying the specific occurrence (the request ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Always "application/problem+json".
    pub content_type: String,
}

impl ProblemDetails {
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            content_type: "application/problem+json".to_string(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    /// 400 Bad Request for input that failed validation.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 422 Unprocessable Entity for an endpoint inside a building.
    pub fn invalid_endpoint(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_ENDPOINT,
            "Invalid Endpoint",
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 404 Not Found when the endpoints are not connected.
    pub fn route_not_found(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_ROUTE_NOT_FOUND,
            "Route Not Found",
            StatusCode::NOT_FOUND,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 504 Gateway Timeout when planning exceeded the request budget.
    pub fn timeout(seconds: f64, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_TIMEOUT, "Request Timeout", StatusCode::GATEWAY_TIMEOUT)
            .with_detail(format!("Request did not complete within {seconds:.1}s"))
            .with_request_id(request_id)
    }

    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    pub fn service_unavailable(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_SERVICE_UNAVAILABLE,
            "Service Unavailable",
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        *response.status_mut() = status;
        response
    }
}

/// Convert library errors to ProblemDetails.
pub fn from_lib_error(error: &LibError, request_id: &str) -> ProblemDetails {
    match error {
        LibError::InvalidEndpoint { .. } => {
            ProblemDetails::invalid_endpoint(error.to_string(), request_id)
        }
        LibError::NoPath { .. } => ProblemDetails::route_not_found(
            format!("{error}; a direct route is available at /api/v1/route/direct"),
            request_id,
        ),
        LibError::InvalidTime { .. }
        | LibError::InvalidDate { .. }
        | LibError::InvalidCoordinate { .. }
        | LibError::InvalidBoundingBox { .. }
        | LibError::InvalidCellSize { .. }
        | LibError::RouteTooLong { .. }
        | LibError::MalformedGeometry { .. } => {
            ProblemDetails::bad_request(error.to_string(), request_id)
        }
        LibError::DataUnavailable { .. } => {
            ProblemDetails::service_unavailable(error.to_string(), request_id)
        }
        _ => ProblemDetails::internal_error(error.to_string(), request_id),
    }
}

/// Failure reason label for the `shadeway_routes_failed_total` counter.
pub fn failure_reason(error: &LibError) -> &'static str {
    match error {
        LibError::InvalidEndpoint { .. } => "invalid_endpoint",
        LibError::NoPath { .. } => "no_path",
        LibError::InvalidTime { .. }
        | LibError::InvalidDate { .. }
        | LibError::InvalidCoordinate { .. }
        | LibError::InvalidBoundingBox { .. }
        | LibError::InvalidCellSize { .. }
        | LibError::RouteTooLong { .. }
        | LibError::MalformedGeometry { .. } => "validation_error",
        LibError::DataUnavailable { .. } => "data_unavailable",
        _ => "internal_error",
    }
}
