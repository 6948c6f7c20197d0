//! Common fixtures for CLI integration tests.
//!
//! Buildings are written to a temporary GeoJSON file so the binary never
//! queries Overpass.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const ORIGIN: (f64, f64) = (139.7000, 35.6900);

/// `LON,LAT` argument offset from [`ORIGIN`].
pub fn point_arg(d_lon: f64, d_lat: f64) -> String {
    format!("{:.6},{:.6}", ORIGIN.0 + d_lon, ORIGIN.1 + d_lat)
}

/// Rectangular Polygon feature spanning the given offsets from [`ORIGIN`].
pub fn block(west: f64, south: f64, east: f64, north: f64, height: f64) -> Value {
    let (lon, lat) = ORIGIN;
    let ring = vec![
        [lon + west, lat + south],
        [lon + east, lat + south],
        [lon + east, lat + north],
        [lon + west, lat + north],
        [lon + west, lat + south],
    ];
    json!({
        "type": "Feature",
        "geometry": { "type": "Polygon", "coordinates": [ring] },
        "properties": { "height": height },
    })
}

/// A building across the straight line from the origin to `point_arg(0.004, 0.0)`.
#[allow(dead_code)]
pub fn midpoint_block() -> Value {
    block(0.0015, -0.0005, 0.0025, 0.0005, 30.0)
}

/// Four walls enclosing `point_arg(0.004, 0.0)`.
#[allow(dead_code)]
pub fn enclosure() -> Vec<Value> {
    vec![
        block(0.003, -0.001, 0.005, -0.0004, 12.0),
        block(0.003, 0.0004, 0.005, 0.001, 12.0),
        block(0.003, -0.001, 0.0036, 0.001, 12.0),
        block(0.0044, -0.001, 0.005, 0.001, 12.0),
    ]
}

/// Temporary directory holding a building file and a fine-grid config.
pub struct TestEnv {
    _temp_dir: TempDir,
    pub buildings: PathBuf,
    pub config: PathBuf,
    pub dir: PathBuf,
}

impl TestEnv {
    pub fn new(features: Vec<Value>) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let dir = temp_dir.path().to_path_buf();
        let buildings = dir.join("buildings.geojson");
        let config = dir.join("shadeway.json");

        let collection = json!({ "type": "FeatureCollection", "features": features });
        fs::write(&buildings, collection.to_string()).expect("write buildings");
        fs::write(&config, r#"{"grid":{"cell_size_degrees":0.0002}}"#).expect("write config");

        Self {
            _temp_dir: temp_dir,
            buildings,
            config,
            dir,
        }
    }

    /// The binary with `--buildings`/`--config` set and colors disabled.
    pub fn command(&self) -> Command {
        let mut cmd = self.bare_command();
        cmd.arg("--buildings").arg(path_arg(&self.buildings));
        cmd
    }

    /// The binary with only `--config` set.
    #[allow(dead_code)]
    pub fn bare_command(&self) -> Command {
        let mut cmd = Command::cargo_bin("shadeway-cli").expect("binary exists");
        cmd.env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(path_arg(&self.config));
        cmd
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}
