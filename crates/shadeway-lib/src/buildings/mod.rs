//! Where building footprints come from.
//!
//! The router only sees the [`BuildingSource`] trait. [`OverpassSource`]
//! queries OpenStreetMap with mirror fallback; [`StaticSource`] serves an
//! in-memory list, typically loaded from a GeoJSON file.

mod geojson;
mod overpass;

pub use geojson::{load_geojson, parse_geojson, to_geojson};
pub use overpass::{estimate_height, parse_overpass, OverpassSource, DEFAULT_HEIGHT_M};

use crate::building::Building;
use crate::error::Result;
use crate::geo::BoundingBox;

/// Supplies the buildings overlapping a bounding box.
pub trait BuildingSource: Send + Sync {
    /// Returns `Error::DataUnavailable` when no backend could be reached.
    fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<Building>>;
}

/// A fixed set of buildings, filtered per query by bounding-box overlap.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    buildings: Vec<Building>,
}

impl StaticSource {
    pub fn new(buildings: Vec<Building>) -> Self {
        Self { buildings }
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }
}

impl BuildingSource for StaticSource {
    fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<Building>> {
        Ok(self
            .buildings
            .iter()
            .filter(|building| building.bounds().intersects(bbox))
            .cloned()
            .collect())
    }
}
