//! Shadeway library entry points.
//!
//! This crate exposes the building model, the sun and shade heuristics, the
//! shade-scored grid, weighted pathfinding, route simplification and the
//! bounded caches that back them. Higher-level consumers (CLI, HTTP service)
//! should construct a [`ShadeRouter`] and go through it instead of wiring the
//! pieces together themselves.
//!

#![deny(warnings)]

pub mod building;
pub mod buildings;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod geo;
pub mod grid;
pub mod path;
pub mod routing;
pub mod shade;
pub mod simplify;

pub use building::{is_occupied, Building};
pub use buildings::{
    load_geojson, parse_geojson, to_geojson, BuildingSource, OverpassSource, StaticSource,
};
pub use cache::sweeper::CacheSweeper;
pub use cache::{BoundedCache, CacheStats, Sweep};
pub use config::ShadewayConfig;
pub use error::{Endpoint, Error, Result, ScoringFault};
pub use geo::{haversine_m, BoundingBox, LonLat};
pub use grid::{GridCell, GridMap, GridScorer, GridStore, ScoreReport};
pub use path::{find_path, SearchWeights};
pub use routing::{
    PointShade, RouteComparison, RoutePlan, RoutePoint, RouteRequest, RouteStrategy,
    RouterCacheStats, ShadeRouter, ShadeTimeline, TimelineHour, TransportMode,
    CURRENT_SHADE_REFRESH_MINUTES, TIMELINE_HOURS,
};
pub use shade::{AmbientShade, ShadeEstimator, ShadeParameters, SunPosition, TimeOfDay};
pub use simplify::{cap, simplify};
