//! Route planning over the shade-scored grid.
//!
//! This module provides:
//! - [`TransportMode`] - walk, run, bike or car, each with its own weights
//! - [`RouteRequest`] - start, end, time of day and mode
//! - [`RoutePlan`] - the planned route with distance, time and shade summary
//! - [`ShadeTimeline`] - hourly shade along an existing route
//! - [`ShadeRouter`] - the service context owning caches, grids and the
//!   scoring pool
//!
//! # Strategy Pattern
//!
//! Each way of producing route points is a [`RoutePlanner`]: the grid search
//! ([`ShadeAwarePlanner`]) and the straight-line fallback ([`DirectPlanner`]).
//! The router handles caching, building lookup and plan assembly around them.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use shadeway_lib::{ShadeRouter, ShadewayConfig, StaticSource, RouteRequest, LonLat, TimeOfDay};
//!
//! let router = ShadeRouter::new(ShadewayConfig::default(), Arc::new(StaticSource::default()))?;
//! let request = RouteRequest::new(
//!     LonLat::new(139.7006, 35.6896),
//!     LonLat::new(139.7036, 35.6917),
//!     TimeOfDay::parse("14:00")?,
//! );
//! let plan = router.plan_route(&request)?;
//! println!("{:.0} m, {:.0}% shade", plan.total_distance_m, plan.average_shade_ratio * 100.0);
//! ```

mod planner;
mod router;

pub use planner::{
    select_planner, DirectPlanner, PlannedPath, PlanningContext, RoutePlanner, ShadeAwarePlanner,
};
pub use router::{ShadeRouter, CURRENT_SHADE_REFRESH_MINUTES};

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::error::{Error, Result};
use crate::geo::{haversine_m, BoundingBox, LonLat};
use crate::shade::TimeOfDay;

/// How the traveller moves; selects search weights and speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Walk,
    Run,
    Bike,
    Car,
}

impl TransportMode {
    pub const ALL: [TransportMode; 4] = [
        TransportMode::Walk,
        TransportMode::Run,
        TransportMode::Bike,
        TransportMode::Car,
    ];
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TransportMode::Walk => "walk",
            TransportMode::Run => "run",
            TransportMode::Bike => "bike",
            TransportMode::Car => "car",
        };
        f.write_str(value)
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walk" => Ok(TransportMode::Walk),
            "run" => Ok(TransportMode::Run),
            "bike" => Ok(TransportMode::Bike),
            "car" => Ok(TransportMode::Car),
            other => Err(format!(
                "unknown transport mode '{other}', expected walk, run, bike or car"
            )),
        }
    }
}

/// Which planner produced a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    /// Weighted grid search trading distance against sun exposure.
    #[default]
    ShadeAware,
    /// Evenly spaced points on the straight line between the endpoints.
    Direct,
}

impl fmt::Display for RouteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteStrategy::ShadeAware => f.write_str("shade_aware"),
            RouteStrategy::Direct => f.write_str("direct"),
        }
    }
}

/// A route planning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: LonLat,
    pub end: LonLat,
    pub time: TimeOfDay,
    /// `YYYY-MM-DD`. Part of the cache key only; the shade model ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub transport_mode: TransportMode,
}

impl RouteRequest {
    pub fn new(start: LonLat, end: LonLat, time: TimeOfDay) -> Self {
        Self {
            start,
            end,
            time,
            date: None,
            transport_mode: TransportMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.transport_mode = mode;
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Larger of the longitude and latitude differences between the endpoints.
    pub fn span_degrees(&self) -> f64 {
        BoundingBox::around(self.start, self.end, 0.0).span_degrees()
    }

    pub fn validate(&self) -> Result<()> {
        self.start.validate()?;
        self.end.validate()?;
        if let Some(date) = &self.date {
            NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidDate {
                value: date.clone(),
            })?;
        }
        Ok(())
    }
}

/// One point of a planned route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub longitude: f64,
    pub latitude: f64,
    /// In `[0, 1]`; 1 is fully shaded.
    pub shade_ratio: f64,
}

impl RoutePoint {
    pub fn coord(&self) -> LonLat {
        LonLat::new(self.longitude, self.latitude)
    }
}

/// A planned route and its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub route_points: Vec<RoutePoint>,
    pub total_distance_m: f64,
    pub estimated_minutes: u64,
    pub average_shade_ratio: f64,
    pub transport_mode: TransportMode,
    /// Zero for strategies that do not use a grid.
    pub grid_width: usize,
    pub grid_height: usize,
    pub cache_used: bool,
    pub calculation_time_ms: u64,
    pub strategy: RouteStrategy,
}

impl RoutePlan {
    pub fn point_count(&self) -> usize {
        self.route_points.len()
    }
}

/// Sum of great-circle distances between consecutive points.
pub fn total_distance_m(points: &[RoutePoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_m(pair[0].coord(), pair[1].coord()))
        .sum()
}

/// Mean shade ratio, or zero for an empty route.
pub fn average_shade(points: &[RoutePoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(|p| p.shade_ratio).sum::<f64>() / points.len() as f64
}

/// Whole minutes to cover `distance_m` at `speed_kmh`, never less than one.
pub fn estimated_minutes(distance_m: f64, speed_kmh: f64) -> u64 {
    let minutes = (distance_m / 1000.0) / speed_kmh * 60.0;
    if minutes.is_finite() {
        (minutes as u64).max(1)
    } else {
        1
    }
}

/// Shade-aware and direct plans for the same request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteComparison {
    pub shade_aware: RoutePlan,
    pub direct: RoutePlan,
    /// Positive when the shade-aware route is shorter.
    pub distance_improvement_m: f64,
    /// Positive when the shade-aware route is shadier.
    pub shade_improvement: f64,
    pub time_difference_minutes: i64,
}

impl RouteComparison {
    pub fn new(shade_aware: RoutePlan, direct: RoutePlan) -> Self {
        Self {
            distance_improvement_m: direct.total_distance_m - shade_aware.total_distance_m,
            shade_improvement: shade_aware.average_shade_ratio - direct.average_shade_ratio,
            time_difference_minutes: shade_aware.estimated_minutes as i64
                - direct.estimated_minutes as i64,
            shade_aware,
            direct,
        }
    }
}

/// Shade report for a single point and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointShade {
    pub longitude: f64,
    pub latitude: f64,
    pub time: TimeOfDay,
    pub sun_elevation_deg: f64,
    pub sun_azimuth_deg: f64,
    pub building_shade: f64,
    pub ambient_shade: f64,
    /// Combined shade; zero inside a building.
    pub shade_ratio: f64,
    pub occupied: bool,
}

/// Hours covered by a route shade timeline, on the hour.
pub const TIMELINE_HOURS: RangeInclusive<u32> = 6..=20;

/// Shade ratio of every route point at one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineHour {
    pub time: TimeOfDay,
    /// One value per route point, in route order. Zero inside a building.
    pub shade_ratios: Vec<f64>,
}

impl TimelineHour {
    pub fn average(&self) -> f64 {
        if self.shade_ratios.is_empty() {
            return 0.0;
        }
        self.shade_ratios.iter().sum::<f64>() / self.shade_ratios.len() as f64
    }
}

/// How shade along a fixed route changes over the day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadeTimeline {
    pub point_count: usize,
    pub hours: Vec<TimelineHour>,
}

impl ShadeTimeline {
    pub fn at_hour(&self, hour: u32) -> Option<&TimelineHour> {
        self.hours.iter().find(|entry| entry.time.hour() == hour)
    }
}

/// Statistics for every cache the router owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterCacheStats {
    pub buildings: CacheStats,
    pub routes: CacheStats,
    pub grids: CacheStats,
}
