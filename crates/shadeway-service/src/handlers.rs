//! Route, shade, building and cache handlers.
//!
//! Handlers stay thin: validate, run the library call on the blocking pool
//! under the request budget, then shape the response.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use serde_json::Value;
use shadeway_lib::{
    to_geojson, RouteComparison, RoutePlan, RouteStrategy, ShadeRouter,
    CURRENT_SHADE_REFRESH_MINUTES,
};
use tracing::{info, warn};

use crate::metrics::{
    record_buildings_returned, record_route_calculated, record_route_failed,
    record_route_summary, record_shade_query,
};
use crate::middleware::RequestId;
use crate::problem::{failure_reason, from_lib_error};
use crate::request::{
    BuildingsQuery, CurrentShadeQuery, HourlyShadeQuery, RouteRequest, ShadeQuery,
    TimelineRequest,
};
use crate::response::{
    CacheResponse, CurrentShadeResponse, HourlyShadeResponse, ShadeTimelineResponse,
};
use crate::{AppState, ProblemDetails, ServiceResponse};

pub type HandlerResult<T> = Result<ServiceResponse<T>, ProblemDetails>;

/// Where a blocking call failed.
enum BlockingError {
    Library(shadeway_lib::Error),
    Problem(ProblemDetails),
}

/// Run `op` against the router on the blocking pool.
///
/// When the request budget runs out the handler answers 504 and the task's
/// result is discarded when it eventually finishes.
async fn run_blocking<T, F>(state: &AppState, request_id: &str, op: F) -> Result<T, BlockingError>
where
    T: Send + 'static,
    F: FnOnce(&ShadeRouter) -> shadeway_lib::Result<T> + Send + 'static,
{
    let router = state.router_arc();
    let task = tokio::task::spawn_blocking(move || op(&router));
    let budget = state.request_timeout();

    match tokio::time::timeout(budget, task).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(BlockingError::Library(err)),
        Ok(Err(join_err)) => Err(BlockingError::Problem(ProblemDetails::internal_error(
            format!("worker task failed: {join_err}"),
            request_id,
        ))),
        Err(_) => {
            warn!(budget_ms = budget.as_millis() as u64, "request budget exhausted");
            Err(BlockingError::Problem(ProblemDetails::timeout(
                budget.as_secs_f64(),
                request_id,
            )))
        }
    }
}

/// Problem for a failed blocking call, recording a route failure when
/// `strategy` names one.
fn problem(
    error: BlockingError,
    request_id: &str,
    strategy: Option<RouteStrategy>,
) -> ProblemDetails {
    match error {
        BlockingError::Library(err) => {
            if let Some(strategy) = strategy {
                record_route_failed(failure_reason(&err), &strategy.to_string());
            }
            warn!(error = %err, "request failed");
            from_lib_error(&err, request_id)
        }
        BlockingError::Problem(problem) => {
            if let Some(strategy) = strategy {
                let reason = if problem.status == 504 {
                    "timeout"
                } else {
                    "internal_error"
                };
                record_route_failed(reason, &strategy.to_string());
            }
            problem
        }
    }
}

fn json_problem(rejection: JsonRejection, request_id: &RequestId) -> ProblemDetails {
    ProblemDetails::bad_request(rejection.body_text(), request_id.as_str())
}

fn query_problem(rejection: QueryRejection, request_id: &RequestId) -> ProblemDetails {
    ProblemDetails::bad_request(rejection.body_text(), request_id.as_str())
}

fn record_plan(plan: &RoutePlan) {
    let strategy = plan.strategy.to_string();
    record_route_calculated(&strategy, &plan.transport_mode.to_string(), plan.cache_used);
    record_route_summary(plan.total_distance_m, plan.average_shade_ratio, &strategy);
}

async fn plan(
    state: &AppState,
    request_id: &RequestId,
    body: RouteRequest,
    strategy: RouteStrategy,
) -> HandlerResult<RoutePlan> {
    let request_id = request_id.as_str();
    let request = body.to_lib(request_id).map_err(|problem| {
        record_route_failed("validation_error", &strategy.to_string());
        *problem
    })?;

    info!(
        %strategy,
        mode = %request.transport_mode,
        time = %request.time,
        "handling route request"
    );

    let plan = run_blocking(state, request_id, move |router| match strategy {
        RouteStrategy::ShadeAware => router.plan_route(&request),
        RouteStrategy::Direct => router.direct_route(&request),
    })
    .await
    .map_err(|e| problem(e, request_id, Some(strategy)))?;

    record_plan(&plan);
    info!(
        points = plan.point_count(),
        distance_m = plan.total_distance_m,
        shade = plan.average_shade_ratio,
        cache_used = plan.cache_used,
        "route computed"
    );
    Ok(ServiceResponse::new(plan))
}

/// `POST /api/v1/route`
pub async fn route_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> HandlerResult<RoutePlan> {
    let Json(body) = body.map_err(|e| json_problem(e, &request_id))?;
    plan(&state, &request_id, body, RouteStrategy::ShadeAware).await
}

/// `POST /api/v1/route/direct`
pub async fn direct_route_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> HandlerResult<RoutePlan> {
    let Json(body) = body.map_err(|e| json_problem(e, &request_id))?;
    plan(&state, &request_id, body, RouteStrategy::Direct).await
}

/// `POST /api/v1/route/compare`
pub async fn compare_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> HandlerResult<RouteComparison> {
    let Json(body) = body.map_err(|e| json_problem(e, &request_id))?;
    let request_id = request_id.as_str();
    let request = body.to_lib(request_id).map_err(|problem| *problem)?;

    let comparison = run_blocking(&state, request_id, move |router| {
        router.compare_routes(&request)
    })
    .await
    .map_err(|e| problem(e, request_id, Some(RouteStrategy::ShadeAware)))?;

    record_plan(&comparison.shade_aware);
    record_plan(&comparison.direct);
    Ok(ServiceResponse::new(comparison))
}

/// `GET /api/v1/shade?lon&lat&time`
pub async fn shade_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<ShadeQuery>, QueryRejection>,
) -> HandlerResult<shadeway_lib::PointShade> {
    let Query(query) = query.map_err(|e| query_problem(e, &request_id))?;
    let request_id = request_id.as_str();
    let point = query.point(request_id).map_err(|p| *p)?;
    let time = query.time(request_id).map_err(|p| *p)?;

    let shade = run_blocking(&state, request_id, move |router| router.shade_at(point, time))
        .await
        .map_err(|e| problem(e, request_id, None))?;

    record_shade_query("point");
    Ok(ServiceResponse::new(shade))
}

/// `GET /api/v1/shade/hourly?lon&lat`
pub async fn hourly_shade_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<HourlyShadeQuery>, QueryRejection>,
) -> HandlerResult<HourlyShadeResponse> {
    let Query(query) = query.map_err(|e| query_problem(e, &request_id))?;
    let request_id = request_id.as_str();
    let point = query.point(request_id).map_err(|p| *p)?;

    let predictions = run_blocking(&state, request_id, move |router| router.hourly_shade(point))
        .await
        .map_err(|e| problem(e, request_id, None))?;

    record_shade_query("hourly");
    Ok(ServiceResponse::new(HourlyShadeResponse {
        longitude: point.lon,
        latitude: point.lat,
        predictions,
    }))
}

/// `GET /api/v1/shade/current?lon&lat`
pub async fn current_shade_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<CurrentShadeQuery>, QueryRejection>,
) -> HandlerResult<CurrentShadeResponse> {
    let Query(query) = query.map_err(|e| query_problem(e, &request_id))?;
    let request_id = request_id.as_str();
    let point = query.point(request_id).map_err(|p| *p)?;

    let shade = run_blocking(&state, request_id, move |router| router.current_shade(point))
        .await
        .map_err(|e| problem(e, request_id, None))?;

    record_shade_query("current");
    Ok(ServiceResponse::new(CurrentShadeResponse {
        next_update: shade.time.plus_minutes(CURRENT_SHADE_REFRESH_MINUTES),
        update_interval_minutes: CURRENT_SHADE_REFRESH_MINUTES,
        shade,
    }))
}

/// `POST /api/v1/shade/timeline`
pub async fn shade_timeline_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<TimelineRequest>, JsonRejection>,
) -> HandlerResult<ShadeTimelineResponse> {
    let Json(body) = body.map_err(|e| json_problem(e, &request_id))?;
    let request_id = request_id.as_str();
    let points = body.points(request_id).map_err(|p| *p)?;
    let date = body.date(request_id).map_err(|p| *p)?;

    let timeline = run_blocking(&state, request_id, move |router| {
        router.route_shade_timeline(&points)
    })
    .await
    .map_err(|e| problem(e, request_id, None))?;

    record_shade_query("timeline");
    info!(points = timeline.point_count, %date, "shade timeline served");
    Ok(ServiceResponse::new(ShadeTimelineResponse { date, timeline }))
}

/// `GET /api/v1/buildings?south&west&north&east` as a GeoJSON
/// FeatureCollection.
pub async fn buildings_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<BuildingsQuery>, QueryRejection>,
) -> HandlerResult<Value> {
    let Query(query) = query.map_err(|e| query_problem(e, &request_id))?;
    let request_id = request_id.as_str();
    let bounds = query.bounds(request_id).map_err(|p| *p)?;

    let buildings = run_blocking(&state, request_id, move |router| router.buildings_in(&bounds))
        .await
        .map_err(|e| problem(e, request_id, None))?;

    record_buildings_returned(buildings.len());
    info!(count = buildings.len(), "buildings served");
    Ok(ServiceResponse::with_content_type(
        to_geojson(&buildings),
        "application/geo+json",
    ))
}

/// `GET /api/v1/cache/stats`
pub async fn cache_stats_handler(State(state): State<AppState>) -> ServiceResponse<CacheResponse> {
    ServiceResponse::new(CacheResponse {
        message: None,
        caches: state.router().cache_stats(),
    })
}

/// `POST /api/v1/cache/clear`
pub async fn cache_clear_handler(State(state): State<AppState>) -> ServiceResponse<CacheResponse> {
    state.router().clear_caches();
    ServiceResponse::new(CacheResponse {
        message: Some("caches cleared".to_string()),
        caches: state.router().cache_stats(),
    })
}
