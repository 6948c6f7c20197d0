//! Route point producers implementing the Strategy pattern.
//!
//! A planner turns a validated request plus the buildings around it into an
//! ordered list of route points. Caching, building lookup and plan assembly are
//! the router's job.

use tracing::debug;

use crate::building::Building;
use crate::config::ShadewayConfig;
use crate::error::Result;
use crate::fingerprint::buildings_fingerprint;
use crate::geo::{BoundingBox, LonLat};
use crate::grid::{lock_grid, GridCell, GridScorer, GridStore, ScoreStamp, ScoringContext};
use crate::path::find_path;
use crate::shade::{AmbientShade, ShadeEstimator};
use crate::simplify::{cap, simplify};

use super::{RoutePoint, RouteRequest, RouteStrategy};

/// Everything a planner may need for one request.
pub struct PlanningContext<'a> {
    pub request: &'a RouteRequest,
    /// Start/end box grown by the configured margin.
    pub bounds: BoundingBox,
    pub buildings: &'a [Building],
    pub config: &'a ShadewayConfig,
    pub estimator: &'a ShadeEstimator,
    pub grids: &'a GridStore,
    pub scorer: &'a GridScorer,
}

/// Output of a planner before it is summarized into a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
    pub points: Vec<RoutePoint>,
    pub grid_width: usize,
    pub grid_height: usize,
}

/// Trait for route planning strategies.
pub trait RoutePlanner: Send + Sync {
    fn strategy(&self) -> RouteStrategy;

    fn plan(&self, ctx: &PlanningContext<'_>) -> Result<PlannedPath>;
}

/// Dijkstra search over the shade-scored grid, then simplification and
/// capping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadeAwarePlanner;

impl RoutePlanner for ShadeAwarePlanner {
    fn strategy(&self) -> RouteStrategy {
        RouteStrategy::ShadeAware
    }

    fn plan(&self, ctx: &PlanningContext<'_>) -> Result<PlannedPath> {
        let request = ctx.request;
        let (slot, reused) = ctx
            .grids
            .checkout(ctx.bounds, ctx.config.grid.cell_size_degrees)?;

        // Held across scoring and search: no caller sees a partial score.
        let mut slot = lock_grid(&slot);
        let stamp = ScoreStamp {
            hour: request.time.hour(),
            buildings: buildings_fingerprint(ctx.buildings),
        };
        let scoring = ScoringContext {
            buildings: ctx.buildings,
            time: request.time,
            estimator: ctx.estimator,
            ambient: &ctx.config.ambient,
        };
        let rescored = slot.ensure_scored(stamp, |grid| {
            ctx.scorer.score(grid, &scoring);
        });

        let grid = slot.grid();
        debug!(
            width = grid.width(),
            height = grid.height(),
            reused,
            rescored,
            "grid ready for search"
        );

        let weights = ctx.config.transport.profile(request.transport_mode).weights();
        let path = find_path(grid, request.start, request.end, weights)?;
        let reduced = cap(&simplify(&path), ctx.config.grid.max_route_points);

        Ok(PlannedPath {
            points: reduced.iter().map(cell_point).collect(),
            grid_width: grid.width(),
            grid_height: grid.height(),
        })
    }
}

fn cell_point(cell: &GridCell) -> RoutePoint {
    RoutePoint {
        longitude: cell.lon,
        latitude: cell.lat,
        shade_ratio: (1.0 - cell.cost).clamp(0.0, 1.0),
    }
}

/// Evenly spaced points on the straight line between the endpoints, each
/// scored with the shade estimator and ambient term. Ignores buildings in the
/// way.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectPlanner;

impl RoutePlanner for DirectPlanner {
    fn strategy(&self) -> RouteStrategy {
        RouteStrategy::Direct
    }

    fn plan(&self, ctx: &PlanningContext<'_>) -> Result<PlannedPath> {
        let request = ctx.request;
        let count = ctx.config.grid.max_route_points.max(2);
        let points = (0..count)
            .map(|i| {
                let ratio = i as f64 / (count - 1) as f64;
                let coord = LonLat::new(
                    request.start.lon + (request.end.lon - request.start.lon) * ratio,
                    request.start.lat + (request.end.lat - request.start.lat) * ratio,
                );
                RoutePoint {
                    longitude: coord.lon,
                    latitude: coord.lat,
                    shade_ratio: point_shade(
                        coord,
                        request,
                        ctx.buildings,
                        ctx.estimator,
                        &ctx.config.ambient,
                    ),
                }
            })
            .collect();

        Ok(PlannedPath {
            points,
            grid_width: 0,
            grid_height: 0,
        })
    }
}

fn point_shade(
    coord: LonLat,
    request: &RouteRequest,
    buildings: &[Building],
    estimator: &ShadeEstimator,
    ambient: &AmbientShade,
) -> f64 {
    if estimator.is_occupied(coord, buildings) {
        return 0.0;
    }
    let shade =
        estimator.shade_factor(coord, request.time, buildings) + ambient.at(coord, request.time);
    if shade.is_finite() {
        shade.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Planner for a strategy.
pub fn select_planner(strategy: RouteStrategy) -> Box<dyn RoutePlanner> {
    match strategy {
        RouteStrategy::ShadeAware => Box::new(ShadeAwarePlanner),
        RouteStrategy::Direct => Box::new(DirectPlanner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shade::TimeOfDay;
    use std::time::Duration;

    struct Fixture {
        config: ShadewayConfig,
        estimator: ShadeEstimator,
        grids: GridStore,
        scorer: GridScorer,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: ShadewayConfig::default(),
                estimator: ShadeEstimator::default(),
                grids: GridStore::new(4, Duration::from_secs(60)),
                scorer: GridScorer::new(2, 100).unwrap(),
            }
        }

        fn context<'a>(
            &'a self,
            request: &'a RouteRequest,
            buildings: &'a [Building],
        ) -> PlanningContext<'a> {
            PlanningContext {
                request,
                bounds: BoundingBox::around(
                    request.start,
                    request.end,
                    self.config.grid.margin_degrees,
                ),
                buildings,
                config: &self.config,
                estimator: &self.estimator,
                grids: &self.grids,
                scorer: &self.scorer,
            }
        }
    }

    fn request() -> RouteRequest {
        RouteRequest::new(
            LonLat::new(139.7000, 35.6900),
            LonLat::new(139.7060, 35.6900),
            TimeOfDay::parse("10:00").unwrap(),
        )
    }

    #[test]
    fn selects_matching_planner() {
        assert_eq!(
            select_planner(RouteStrategy::ShadeAware).strategy(),
            RouteStrategy::ShadeAware
        );
        assert_eq!(
            select_planner(RouteStrategy::Direct).strategy(),
            RouteStrategy::Direct
        );
    }

    #[test]
    fn direct_planner_interpolates_endpoints() {
        let fixture = Fixture::new();
        let request = request();
        let planned = DirectPlanner.plan(&fixture.context(&request, &[])).unwrap();

        assert_eq!(planned.points.len(), 20);
        assert_eq!(planned.points[0].coord(), request.start);
        let last = planned.points.last().unwrap().coord();
        assert!((last.lon - request.end.lon).abs() < 1e-12);
        assert_eq!((planned.grid_width, planned.grid_height), (0, 0));
    }

    #[test]
    fn shade_aware_planner_stays_within_cap() {
        let fixture = Fixture::new();
        let request = request();
        let planned = ShadeAwarePlanner
            .plan(&fixture.context(&request, &[]))
            .unwrap();

        assert!(planned.points.len() >= 2);
        assert!(planned.points.len() <= fixture.config.grid.max_route_points);
        assert!(planned.grid_width > 0 && planned.grid_height > 0);
        assert!(planned
            .points
            .iter()
            .all(|p| (0.0..=1.0).contains(&p.shade_ratio)));
    }

    #[test]
    fn repeated_plans_reuse_the_scored_grid() {
        let fixture = Fixture::new();
        let request = request();
        ShadeAwarePlanner
            .plan(&fixture.context(&request, &[]))
            .unwrap();
        ShadeAwarePlanner
            .plan(&fixture.context(&request, &[]))
            .unwrap();

        let stats = fixture.grids.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
    }
}
