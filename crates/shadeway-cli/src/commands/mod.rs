//! CLI subcommand handlers.
//!
//! Each module handles one subcommand; `main.rs` parses arguments and
//! dispatches here.

pub mod buildings;
pub mod route;
pub mod shade;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use shadeway_lib::{
    load_geojson, BoundingBox, BuildingSource, LonLat, OverpassSource, ShadeRouter,
    ShadewayConfig, StaticSource,
};
use tracing::info;

/// Where buildings and configuration come from.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// GeoJSON building file; Overpass is queried when absent.
    pub buildings: Option<PathBuf>,
    /// JSON configuration file; defaults plus `SHADEWAY_*` overrides when
    /// absent.
    pub config: Option<PathBuf>,
}

impl RouterOptions {
    pub fn load_config(&self) -> Result<ShadewayConfig> {
        match &self.config {
            Some(path) => {
                let config = ShadewayConfig::load(path)
                    .with_context(|| format!("failed to read config from {}", path.display()))?;
                config.validate().context("invalid configuration")?;
                Ok(config)
            }
            None => ShadewayConfig::from_env().context("invalid SHADEWAY_* configuration"),
        }
    }

    /// Construct the router over the selected building source.
    pub fn build_router(&self) -> Result<ShadeRouter> {
        let config = self.load_config()?;
        let source = building_source(self.buildings.as_deref(), &config)?;
        ShadeRouter::new(config, source).context("failed to construct the shade router")
    }
}

fn building_source(
    path: Option<&Path>,
    config: &ShadewayConfig,
) -> Result<Arc<dyn BuildingSource>> {
    match path {
        Some(path) => {
            let buildings = load_geojson(path)
                .with_context(|| format!("failed to load buildings from {}", path.display()))?;
            info!(path = %path.display(), buildings = buildings.len(), "using building file");
            Ok(Arc::new(StaticSource::new(buildings)))
        }
        None => {
            let source = OverpassSource::new(&config.osm, &config.performance)
                .context("failed to build the Overpass client")?;
            Ok(Arc::new(source))
        }
    }
}

/// Parse `LON,LAT` as given on the command line.
pub fn parse_lonlat(value: &str) -> Result<LonLat> {
    let [lon, lat] = parse_numbers::<2>(value)?;
    let point = LonLat::new(lon, lat);
    point.validate()?;
    Ok(point)
}

/// Parse `SOUTH,WEST,NORTH,EAST`.
pub fn parse_bbox(value: &str) -> Result<BoundingBox> {
    let [south, west, north, east] = parse_numbers::<4>(value)?;
    Ok(BoundingBox::new(south, west, north, east)?)
}

fn parse_numbers<const N: usize>(value: &str) -> Result<[f64; N]> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(anyhow!(
            "expected {N} comma-separated numbers, got '{value}'"
        ));
    }
    let mut numbers = [0.0; N];
    for (slot, part) in numbers.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .with_context(|| format!("'{part}' is not a number"))?;
    }
    Ok(numbers)
}

/// clap value parser for `LON,LAT` arguments.
pub fn lonlat_arg(value: &str) -> std::result::Result<LonLat, String> {
    parse_lonlat(value).map_err(|e| format!("{e:#}"))
}

/// clap value parser for `SOUTH,WEST,NORTH,EAST` arguments.
pub fn bbox_arg(value: &str) -> std::result::Result<BoundingBox, String> {
    parse_bbox(value).map_err(|e| format!("{e:#}"))
}
