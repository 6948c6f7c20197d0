use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::building::Building;
use crate::buildings::BuildingSource;
use crate::cache::{BoundedCache, Sweep};
use crate::config::ShadewayConfig;
use crate::error::{Error, Result};
use crate::fingerprint::{bbox_fingerprint, route_fingerprint};
use crate::geo::{BoundingBox, LonLat};
use crate::grid::{GridScorer, GridStore};
use crate::shade::{ShadeEstimator, SunPosition, TimeOfDay};

use super::planner::{select_planner, PlanningContext};
use super::{
    average_shade, estimated_minutes, total_distance_m, PointShade, RouteComparison, RoutePlan,
    RouteRequest, RouteStrategy, RouterCacheStats, ShadeTimeline, TimelineHour, TIMELINE_HOURS,
};

/// How often clients are told to refresh the current shade.
pub const CURRENT_SHADE_REFRESH_MINUTES: u32 = 5;

/// Service context for shade-aware routing.
///
/// Owns the building cache, the route cache, the grid store and the scoring
/// pool. Construct one per process and share it behind an `Arc`.
pub struct ShadeRouter {
    config: ShadewayConfig,
    estimator: ShadeEstimator,
    scorer: GridScorer,
    grids: GridStore,
    source: Arc<dyn BuildingSource>,
    building_cache: Arc<BoundedCache<String, Arc<Vec<Building>>>>,
    route_cache: Arc<BoundedCache<String, RoutePlan>>,
}

impl std::fmt::Debug for ShadeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadeRouter").finish_non_exhaustive()
    }
}

impl ShadeRouter {
    pub fn new(config: ShadewayConfig, source: Arc<dyn BuildingSource>) -> Result<Self> {
        config.validate()?;
        let scorer = GridScorer::new(config.performance.max_workers, config.grid.batch_size)?;
        let grids = GridStore::new(config.cache.grid_cache_size, config.cache.building_ttl());
        let building_cache = Arc::new(BoundedCache::new(
            "buildings",
            config.cache.building_capacity(),
            config.cache.building_ttl(),
        ));
        let route_cache = Arc::new(BoundedCache::new(
            "routes",
            config.cache.route_capacity(),
            config.cache.route_ttl(),
        ));

        info!(
            workers = scorer.workers(),
            cell_size = config.grid.cell_size_degrees,
            "shade router ready"
        );

        Ok(Self {
            estimator: ShadeEstimator::new(config.shade),
            config,
            scorer,
            grids,
            source,
            building_cache,
            route_cache,
        })
    }

    pub fn config(&self) -> &ShadewayConfig {
        &self.config
    }

    /// Plan the shade-aware route for `request`.
    ///
    /// Fails with `InvalidEndpoint` when an endpoint lands inside a building
    /// and with `NoPath` when the endpoints are not connected.
    pub fn plan_route(&self, request: &RouteRequest) -> Result<RoutePlan> {
        self.plan_with(RouteStrategy::ShadeAware, request)
    }

    /// Plan the straight-line route for `request`; never fails once the
    /// request is valid.
    pub fn direct_route(&self, request: &RouteRequest) -> Result<RoutePlan> {
        self.plan_with(RouteStrategy::Direct, request)
    }

    pub fn compare_routes(&self, request: &RouteRequest) -> Result<RouteComparison> {
        let shade_aware = self.plan_route(request)?;
        let direct = self.direct_route(request)?;
        Ok(RouteComparison::new(shade_aware, direct))
    }

    fn plan_with(&self, strategy: RouteStrategy, request: &RouteRequest) -> Result<RoutePlan> {
        request.validate()?;
        self.check_span(request.span_degrees())?;
        let started = Instant::now();
        let key = format!("{strategy}:{}", route_fingerprint(request));

        if let Some(mut cached) = self.route_cache.get(&key) {
            debug!(%strategy, "route served from cache");
            cached.cache_used = true;
            return Ok(cached);
        }

        let margin = self.config.grid.margin_degrees;
        let bounds = BoundingBox::around(request.start, request.end, margin);
        let buildings = self.buildings_for(&bounds);
        let ctx = PlanningContext {
            request,
            bounds,
            buildings: &buildings,
            config: &self.config,
            estimator: &self.estimator,
            grids: &self.grids,
            scorer: &self.scorer,
        };
        let planned = select_planner(strategy).plan(&ctx)?;

        let profile = self.config.transport.profile(request.transport_mode);
        let total_distance_m = total_distance_m(&planned.points);
        let plan = RoutePlan {
            total_distance_m,
            estimated_minutes: estimated_minutes(total_distance_m, profile.speed_kmh),
            average_shade_ratio: average_shade(&planned.points),
            route_points: planned.points,
            transport_mode: request.transport_mode,
            grid_width: planned.grid_width,
            grid_height: planned.grid_height,
            cache_used: false,
            calculation_time_ms: started.elapsed().as_millis() as u64,
            strategy,
        };

        info!(
            %strategy,
            mode = %request.transport_mode,
            points = plan.point_count(),
            distance_m = plan.total_distance_m,
            shade = plan.average_shade_ratio,
            buildings = buildings.len(),
            elapsed_ms = plan.calculation_time_ms,
            "route planned"
        );
        self.route_cache.put(key, plan.clone());
        Ok(plan)
    }

    /// Refuse point sets one grid should not cover.
    fn check_span(&self, span_degrees: f64) -> Result<()> {
        let max_degrees = self.config.grid.max_route_span_degrees;
        if span_degrees > max_degrees {
            return Err(Error::RouteTooLong {
                span_degrees,
                max_degrees,
            });
        }
        Ok(())
    }

    /// Building shade, ambient shade and occupancy at one point.
    pub fn shade_at(&self, point: LonLat, time: TimeOfDay) -> Result<PointShade> {
        point.validate()?;
        let buildings = self.buildings_for(&self.surroundings(point));
        Ok(self.point_shade(point, time, &buildings))
    }

    /// [`shade_at`](Self::shade_at) for every hour of the day, on the hour.
    pub fn hourly_shade(&self, point: LonLat) -> Result<Vec<PointShade>> {
        point.validate()?;
        let buildings = self.buildings_for(&self.surroundings(point));
        (0..24)
            .map(|hour| -> Result<PointShade> {
                Ok(self.point_shade(point, TimeOfDay::new(hour, 0)?, &buildings))
            })
            .collect()
    }

    /// [`shade_at`](Self::shade_at) for the local wall-clock time.
    pub fn current_shade(&self, point: LonLat) -> Result<PointShade> {
        self.shade_at(point, TimeOfDay::now())
    }

    /// Shade ratio of each point of an existing route at every hour from
    /// 06:00 to 20:00.
    ///
    /// Buildings are looked up once for the points' box grown by the grid
    /// margin. An empty route yields an empty timeline.
    pub fn route_shade_timeline(&self, points: &[LonLat]) -> Result<ShadeTimeline> {
        for point in points {
            point.validate()?;
        }
        let Some(extent) = BoundingBox::enclosing(points, 0.0) else {
            return Ok(ShadeTimeline::default());
        };
        self.check_span(extent.span_degrees())?;

        let margin = self.config.grid.margin_degrees;
        let bounds = BoundingBox::enclosing(points, margin).unwrap_or(extent);
        let buildings = self.buildings_for(&bounds);

        let hours = TIMELINE_HOURS
            .map(|hour| -> Result<TimelineHour> {
                let time = TimeOfDay::new(hour, 0)?;
                let shade_ratios = points
                    .iter()
                    .map(|point| self.point_shade(*point, time, &buildings).shade_ratio)
                    .collect();
                Ok(TimelineHour { time, shade_ratios })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            points = points.len(),
            buildings = buildings.len(),
            "route shade timeline computed"
        );
        Ok(ShadeTimeline {
            point_count: points.len(),
            hours,
        })
    }

    fn surroundings(&self, point: LonLat) -> BoundingBox {
        BoundingBox::around(point, point, self.config.grid.margin_degrees)
    }

    fn point_shade(&self, point: LonLat, time: TimeOfDay, buildings: &[Building]) -> PointShade {
        let sun = SunPosition::at(time);
        let occupied = self.estimator.is_occupied(point, buildings);
        let building_shade = self.estimator.shade_factor(point, time, buildings);
        let ambient_shade = self.config.ambient.at(point, time);
        let shade_ratio = if occupied {
            0.0
        } else {
            (building_shade + ambient_shade).clamp(0.0, 1.0)
        };
        PointShade {
            longitude: point.lon,
            latitude: point.lat,
            time,
            sun_elevation_deg: sun.elevation_deg,
            sun_azimuth_deg: sun.azimuth_deg,
            building_shade,
            ambient_shade,
            shade_ratio,
            occupied,
        }
    }

    /// Buildings overlapping `bbox`, from the cache or the source.
    pub fn buildings_in(&self, bbox: &BoundingBox) -> Result<Vec<Building>> {
        bbox.validate()?;
        Ok(self.buildings_for(bbox).as_ref().clone())
    }

    /// Cached lookup. A failing source degrades to an empty set, which is not
    /// cached so the next request retries.
    fn buildings_for(&self, bbox: &BoundingBox) -> Arc<Vec<Building>> {
        let key = bbox_fingerprint(bbox);
        if let Some(buildings) = self.building_cache.get(&key) {
            debug!(count = buildings.len(), "buildings served from cache");
            return buildings;
        }

        match self.source.fetch(bbox) {
            Ok(buildings) => {
                let buildings = Arc::new(buildings);
                self.building_cache.put(key, Arc::clone(&buildings));
                buildings
            }
            Err(err) => {
                warn!(error = %err, "building data unavailable; scoring with ambient shade only");
                Arc::new(Vec::new())
            }
        }
    }

    pub fn cache_stats(&self) -> RouterCacheStats {
        RouterCacheStats {
            buildings: self.building_cache.stats(),
            routes: self.route_cache.stats(),
            grids: self.grids.stats(),
        }
    }

    pub fn clear_caches(&self) {
        self.building_cache.clear();
        self.route_cache.clear();
        self.grids.clear();
        info!("caches cleared");
    }

    /// The caches the background sweeper should purge.
    pub fn sweep_targets(&self) -> Vec<Arc<dyn Sweep>> {
        let buildings: Arc<dyn Sweep> = self.building_cache.clone();
        let routes: Arc<dyn Sweep> = self.route_cache.clone();
        vec![buildings, routes, self.grids.sweep_target()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::StaticSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSource(AtomicUsize);

    impl BuildingSource for FailingSource {
        fn fetch(&self, _bbox: &BoundingBox) -> Result<Vec<Building>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::DataUnavailable { attempts: 3 })
        }
    }

    fn request() -> RouteRequest {
        RouteRequest::new(
            LonLat::new(139.7000, 35.6900),
            LonLat::new(139.7030, 35.6920),
            TimeOfDay::parse("14:00").unwrap(),
        )
    }

    fn router(source: Arc<dyn BuildingSource>) -> ShadeRouter {
        ShadeRouter::new(ShadewayConfig::default(), source).unwrap()
    }

    #[test]
    fn second_plan_comes_from_the_route_cache() {
        let router = router(Arc::new(StaticSource::default()));
        let first = router.plan_route(&request()).unwrap();
        let second = router.plan_route(&request()).unwrap();

        assert!(!first.cache_used);
        assert!(second.cache_used);
        assert_eq!(first.route_points, second.route_points);
        assert_eq!(router.cache_stats().routes.hits, 1);
    }

    #[test]
    fn unavailable_buildings_degrade_to_empty_and_are_not_cached() {
        let source = Arc::new(FailingSource(AtomicUsize::new(0)));
        let router = router(source.clone());

        let plan = router.plan_route(&request()).unwrap();
        assert!(plan.point_count() >= 2);
        router.direct_route(&request()).unwrap();

        assert_eq!(source.0.load(Ordering::SeqCst), 2);
        assert_eq!(router.cache_stats().buildings.size, 0);
    }

    #[test]
    fn invalid_requests_are_rejected_before_planning() {
        let router = router(Arc::new(StaticSource::default()));
        let bad = request().with_date("yesterday");
        assert!(matches!(
            router.plan_route(&bad),
            Err(Error::InvalidDate { .. })
        ));
    }

    #[test]
    fn hourly_shade_covers_the_day() {
        let router = router(Arc::new(StaticSource::default()));
        let samples = router.hourly_shade(LonLat::new(139.7036, 35.6917)).unwrap();
        assert_eq!(samples.len(), 24);
        assert_eq!(samples[3].shade_ratio, 1.0);
        assert_eq!(samples[6].shade_ratio, 0.8);
        assert!(samples[12].shade_ratio < 0.3);
    }

    #[test]
    fn distant_endpoints_are_refused_before_any_grid_is_built() {
        let router = router(Arc::new(StaticSource::default()));
        let far = RouteRequest::new(
            LonLat::new(139.70, 35.69),
            LonLat::new(140.25, 35.69),
            TimeOfDay::parse("14:00").unwrap(),
        );

        assert!(matches!(
            router.plan_route(&far),
            Err(Error::RouteTooLong { .. })
        ));
        assert!(matches!(
            router.direct_route(&far),
            Err(Error::RouteTooLong { .. })
        ));
        assert_eq!(router.cache_stats().grids.size, 0);
    }

    #[test]
    fn timeline_samples_every_point_from_six_to_eight() {
        let router = router(Arc::new(StaticSource::default()));
        let points = [
            LonLat::new(139.7000, 35.6900),
            LonLat::new(139.7010, 35.6905),
            LonLat::new(139.7020, 35.6910),
        ];
        let timeline = router.route_shade_timeline(&points).unwrap();

        assert_eq!(timeline.point_count, 3);
        assert_eq!(timeline.hours.len(), 15);
        assert_eq!(timeline.hours[0].time.to_string(), "06:00");
        assert_eq!(timeline.hours[14].time.to_string(), "20:00");
        assert!(timeline.hours.iter().all(|h| h.shade_ratios.len() == 3));
        // Twilight and night are fixed values regardless of position.
        assert!(timeline.at_hour(6).unwrap().shade_ratios.iter().all(|r| *r == 0.8));
        assert!(timeline.at_hour(20).unwrap().shade_ratios.iter().all(|r| *r == 1.0));

        let noon = router.shade_at(points[1], TimeOfDay::new(12, 0).unwrap()).unwrap();
        assert_eq!(timeline.at_hour(12).unwrap().shade_ratios[1], noon.shade_ratio);
    }

    #[test]
    fn timeline_handles_empty_and_invalid_routes() {
        let router = router(Arc::new(StaticSource::default()));
        assert_eq!(router.route_shade_timeline(&[]).unwrap(), ShadeTimeline::default());

        let bad = [LonLat::new(139.7, 35.69), LonLat::new(139.7, 91.0)];
        assert!(matches!(
            router.route_shade_timeline(&bad),
            Err(Error::InvalidCoordinate { .. })
        ));

        let spread = [LonLat::new(139.7, 35.69), LonLat::new(139.7, 36.69)];
        assert!(matches!(
            router.route_shade_timeline(&spread),
            Err(Error::RouteTooLong { .. })
        ));
    }

    #[test]
    fn clear_caches_empties_everything() {
        let router = router(Arc::new(StaticSource::default()));
        router.plan_route(&request()).unwrap();
        router.clear_caches();

        let stats = router.cache_stats();
        assert_eq!(stats.routes.size, 0);
        assert_eq!(stats.buildings.size, 0);
        assert_eq!(stats.grids.size, 0);
        assert_eq!(router.sweep_targets().len(), 3);
    }
}
