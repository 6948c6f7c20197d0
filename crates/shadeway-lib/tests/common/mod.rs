//! Common test utilities and fixture helpers.
//!
//! Buildings are laid out around a fixed origin in central Tokyo so that the
//! ambient shade term stays close to its reference value.

use std::sync::Arc;

use shadeway_lib::{
    BoundingBox, Building, LonLat, ShadeRouter, ShadewayConfig, StaticSource, TimeOfDay,
};

/// Longitude/latitude used as the origin for synthetic layouts.
pub const ORIGIN: LonLat = LonLat {
    lon: 139.7000,
    lat: 35.6900,
};

/// A point offset from [`ORIGIN`] by the given number of degrees.
pub fn offset(d_lon: f64, d_lat: f64) -> LonLat {
    LonLat::new(ORIGIN.lon + d_lon, ORIGIN.lat + d_lat)
}

/// Rectangular building spanning the given offsets from [`ORIGIN`].
pub fn block(west: f64, south: f64, east: f64, north: f64, height_m: f64) -> Building {
    let bounds = BoundingBox::new(
        ORIGIN.lat + south,
        ORIGIN.lon + west,
        ORIGIN.lat + north,
        ORIGIN.lon + east,
    )
    .expect("valid block bounds");
    Building::rectangle(bounds, height_m, None).expect("valid block footprint")
}

pub fn time(value: &str) -> TimeOfDay {
    TimeOfDay::parse(value).expect("valid time of day")
}

/// Router over a fixed building list with default configuration.
#[allow(dead_code)]
pub fn router_with(buildings: Vec<Building>) -> ShadeRouter {
    router_with_config(ShadewayConfig::default(), buildings)
}

#[allow(dead_code)]
pub fn router_with_config(config: ShadewayConfig, buildings: Vec<Building>) -> ShadeRouter {
    ShadeRouter::new(config, Arc::new(StaticSource::new(buildings))).expect("router")
}
