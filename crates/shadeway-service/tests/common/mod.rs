//! Shared fixtures for the HTTP tests.
//!
//! Every server runs over an in-memory building list so no test touches the
//! network.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum_test::TestServer;
use serde_json::{json, Value};
use shadeway_lib::{
    BoundingBox, Building, BuildingSource, ShadeRouter, ShadewayConfig, StaticSource,
};
use shadeway_service::{app, AppState};

pub const ORIGIN: [f64; 2] = [139.7000, 35.6900];

/// `[lon, lat]` offset from [`ORIGIN`] in degrees.
pub fn offset(d_lon: f64, d_lat: f64) -> [f64; 2] {
    [ORIGIN[0] + d_lon, ORIGIN[1] + d_lat]
}

pub fn block(west: f64, south: f64, east: f64, north: f64, height_m: f64) -> Building {
    let bounds = BoundingBox::new(
        ORIGIN[1] + south,
        ORIGIN[0] + west,
        ORIGIN[1] + north,
        ORIGIN[0] + east,
    )
    .expect("valid block bounds");
    Building::rectangle(bounds, height_m, None).expect("valid block footprint")
}

/// A building straddling the straight line from the origin to
/// `offset(0.004, 0.0)`.
#[allow(dead_code)]
pub fn midpoint_block() -> Building {
    block(0.0015, -0.0005, 0.0025, 0.0005, 30.0)
}

/// Four walls enclosing `offset(0.004, 0.0)`.
#[allow(dead_code)]
pub fn enclosure() -> Vec<Building> {
    vec![
        block(0.003, -0.001, 0.005, -0.0004, 12.0),
        block(0.003, 0.0004, 0.005, 0.001, 12.0),
        block(0.003, -0.001, 0.0036, 0.001, 12.0),
        block(0.0044, -0.001, 0.005, 0.001, 12.0),
    ]
}

/// Route body from the origin to `offset(0.004, 0.0)`.
#[allow(dead_code)]
pub fn route_body(time: &str) -> Value {
    json!({
        "start": offset(0.0, 0.0),
        "end": offset(0.004, 0.0),
        "time": time,
    })
}

fn fine_grid() -> ShadewayConfig {
    let mut config = ShadewayConfig::default();
    config.grid.cell_size_degrees = 0.0002;
    config
}

pub fn state_with(buildings: Vec<Building>) -> AppState {
    let router = ShadeRouter::new(fine_grid(), Arc::new(StaticSource::new(buildings)))
        .expect("router");
    AppState::new(router)
}

pub fn server_with(buildings: Vec<Building>) -> TestServer {
    TestServer::new(app(state_with(buildings))).expect("test server")
}

/// Source that takes longer than any test request budget.
#[allow(dead_code)]
pub struct SlowSource(pub Duration);

impl BuildingSource for SlowSource {
    fn fetch(&self, _bbox: &BoundingBox) -> shadeway_lib::Result<Vec<Building>> {
        thread::sleep(self.0);
        Ok(Vec::new())
    }
}

/// Server whose building lookups outlast a 50 ms request budget.
#[allow(dead_code)]
pub fn slow_server() -> TestServer {
    let router = ShadeRouter::new(
        ShadewayConfig::default(),
        Arc::new(SlowSource(Duration::from_millis(500))),
    )
    .expect("router");
    let state = AppState::with_request_timeout(router, Duration::from_millis(50));
    TestServer::new(app(state)).expect("test server")
}
