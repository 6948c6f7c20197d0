//! Runtime configuration for the router, caches and building sources.
//!
//! Everything has a working default. [`ShadewayConfig::from_env`] layers an
//! optional JSON file and a handful of environment overrides on top:
//!
//! | Variable | Effect |
//! |---|---|
//! | `SHADEWAY_CONFIG` | Path to a JSON file with any subset of the fields below |
//! | `SHADEWAY_CACHE_TTL` | `cache.ttl_seconds` |
//! | `SHADEWAY_MAX_WORKERS` | `performance.max_workers` |
//! | `SHADEWAY_OVERPASS_URL` | `osm.overpass_url` |
//! | `SHADEWAY_CELL_SIZE` | `grid.cell_size_degrees` |

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::SearchWeights;
use crate::routing::TransportMode;
use crate::shade::{AmbientShade, ShadeParameters};

pub const CONFIG_PATH_ENV: &str = "SHADEWAY_CONFIG";
pub const CACHE_TTL_ENV: &str = "SHADEWAY_CACHE_TTL";
pub const MAX_WORKERS_ENV: &str = "SHADEWAY_MAX_WORKERS";
pub const OVERPASS_URL_ENV: &str = "SHADEWAY_OVERPASS_URL";
pub const CELL_SIZE_ENV: &str = "SHADEWAY_CELL_SIZE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadewayConfig {
    pub cache: CacheSettings,
    pub grid: GridSettings,
    pub performance: PerformanceSettings,
    pub osm: OsmSettings,
    pub shade: ShadeParameters,
    pub ambient: AmbientShade,
    pub transport: TransportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Capacity of the building cache; the route cache holds twice as many.
    pub max_cache_size: usize,
    /// TTL of the building cache; route entries live half as long.
    pub ttl_seconds: u64,
    pub building_cache_enabled: bool,
    pub route_cache_enabled: bool,
    pub sweep_interval_secs: u64,
    pub grid_cache_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_cache_size: 10,
            ttl_seconds: 3600,
            building_cache_enabled: true,
            route_cache_enabled: true,
            sweep_interval_secs: 300,
            grid_cache_size: 8,
        }
    }
}

impl CacheSettings {
    pub fn building_capacity(&self) -> usize {
        if self.building_cache_enabled {
            self.max_cache_size
        } else {
            0
        }
    }

    pub fn building_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn route_capacity(&self) -> usize {
        if self.route_cache_enabled {
            self.max_cache_size.saturating_mul(2)
        } else {
            0
        }
    }

    pub fn route_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds / 2)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub cell_size_degrees: f64,
    /// Padding added around the start/end box when building a route grid.
    pub margin_degrees: f64,
    pub max_route_points: usize,
    /// Cells per scoring task.
    pub batch_size: usize,
    /// Largest longitude or latitude difference between route endpoints. Keeps
    /// route grids, and the memory the grid store pins, bounded.
    pub max_route_span_degrees: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            cell_size_degrees: 0.0003,
            margin_degrees: 0.002,
            max_route_points: 20,
            batch_size: 100,
            max_route_span_degrees: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub max_workers: usize,
    pub external_api_timeout_secs: u64,
    pub max_request_timeout_secs: u64,
    pub max_buildings_per_request: usize,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            external_api_timeout_secs: 30,
            max_request_timeout_secs: 60,
            max_buildings_per_request: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsmSettings {
    pub overpass_url: String,
    /// Tried in order after the primary endpoint fails.
    pub backup_urls: Vec<String>,
}

impl Default for OsmSettings {
    fn default() -> Self {
        Self {
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            backup_urls: vec![
                "https://overpass.kumi.systems/api/interpreter".to_string(),
                "https://overpass.openstreetmap.ru/api/interpreter".to_string(),
            ],
        }
    }
}

impl OsmSettings {
    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.overpass_url.as_str())
            .chain(self.backup_urls.iter().map(String::as_str))
    }
}

/// Search weights and travel speed for one transport mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub weight_shade: f64,
    pub weight_distance: f64,
    pub speed_kmh: f64,
}

impl ModeProfile {
    pub const fn new(weight_shade: f64, weight_distance: f64, speed_kmh: f64) -> Self {
        Self {
            weight_shade,
            weight_distance,
            speed_kmh,
        }
    }

    pub fn weights(&self) -> SearchWeights {
        SearchWeights::new(self.weight_shade, self.weight_distance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub walk: ModeProfile,
    pub run: ModeProfile,
    pub bike: ModeProfile,
    pub car: ModeProfile,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            walk: ModeProfile::new(0.6, 0.4, 5.0),
            run: ModeProfile::new(0.7, 0.3, 8.0),
            bike: ModeProfile::new(0.5, 0.5, 15.0),
            car: ModeProfile::new(0.2, 0.8, 30.0),
        }
    }
}

impl TransportSettings {
    pub fn profile(&self, mode: TransportMode) -> &ModeProfile {
        match mode {
            TransportMode::Walk => &self.walk,
            TransportMode::Run => &self.run,
            TransportMode::Bike => &self.bike,
            TransportMode::Car => &self.car,
        }
    }
}

impl ShadewayConfig {
    /// Defaults, then `SHADEWAY_CONFIG`, then individual overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading variables through
    /// `lookup`, so tests need not touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(value) = lookup(CACHE_TTL_ENV) {
            config.cache.ttl_seconds = parse_override(CACHE_TTL_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_WORKERS_ENV) {
            config.performance.max_workers = parse_override(MAX_WORKERS_ENV, &value)?;
        }
        if let Some(value) = lookup(OVERPASS_URL_ENV) {
            config.osm.overpass_url = value;
        }
        if let Some(value) = lookup(CELL_SIZE_ENV) {
            config.grid.cell_size_degrees = parse_override(CELL_SIZE_ENV, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        let cell = self.grid.cell_size_degrees;
        if !cell.is_finite() || cell <= 0.0 {
            return Err(Error::InvalidCellSize { value: cell });
        }
        if !self.grid.margin_degrees.is_finite() || self.grid.margin_degrees < 0.0 {
            return Err(invalid("grid.margin_degrees must be a non-negative number"));
        }
        let span = self.grid.max_route_span_degrees;
        if !span.is_finite() || span <= 0.0 {
            return Err(invalid("grid.max_route_span_degrees must be a positive number"));
        }
        if self.grid.batch_size == 0 {
            return Err(invalid("grid.batch_size must be at least 1"));
        }
        if self.performance.max_workers == 0 {
            return Err(invalid("performance.max_workers must be at least 1"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(invalid("cache.sweep_interval_secs must be at least 1"));
        }
        for mode in TransportMode::ALL {
            let profile = self.transport.profile(mode);
            let weights_ok = [profile.weight_shade, profile.weight_distance]
                .iter()
                .all(|w| w.is_finite() && *w >= 0.0);
            if !weights_ok {
                return Err(invalid(&format!(
                    "transport.{mode} weights must be non-negative numbers"
                )));
            }
            if !profile.speed_kmh.is_finite() || profile.speed_kmh <= 0.0 {
                return Err(invalid(&format!("transport.{mode} speed must be positive")));
            }
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(&format!("{key}='{value}' could not be parsed")))
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfig {
        message: message.to_string(),
    }
}
