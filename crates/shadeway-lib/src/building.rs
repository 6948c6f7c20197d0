//! Building footprints used for occupancy and shadow estimation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{BoundingBox, LonLat};

/// Tolerance (degrees) under which a point counts as lying on a ring edge.
const EDGE_EPSILON: f64 = 1e-12;

/// A closed simple polygon with a height estimate.
///
/// Buildings are validated on construction and immutable afterwards, so the
/// shade estimator and occupancy test never see degenerate geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BuildingRecord", into = "BuildingRecord")]
pub struct Building {
    ring: Vec<LonLat>,
    height_m: f64,
    source_id: Option<i64>,
    bounds: BoundingBox,
    centroid: LonLat,
}

impl Building {
    /// Build a footprint from a ring of `(lon, lat)` vertices.
    ///
    /// The ring may or may not repeat its first vertex at the end. It must
    /// contain at least three distinct, finite vertices and the height must be
    /// a finite, non-negative number of metres.
    pub fn new(ring: Vec<LonLat>, height_m: f64, source_id: Option<i64>) -> Result<Self> {
        if ring
            .iter()
            .any(|vertex| !vertex.lon.is_finite() || !vertex.lat.is_finite())
        {
            return Err(Error::MalformedGeometry {
                reason: "ring contains non-finite coordinates".to_string(),
            });
        }

        let distinct = distinct_vertices(&ring);
        if distinct.len() < 3 {
            return Err(Error::MalformedGeometry {
                reason: format!(
                    "ring has {} distinct vertices, at least 3 are required",
                    distinct.len()
                ),
            });
        }

        if !height_m.is_finite() || height_m < 0.0 {
            return Err(Error::MalformedGeometry {
                reason: format!("height {height_m} is not a non-negative finite number"),
            });
        }

        let count = distinct.len() as f64;
        let centroid = LonLat::new(
            distinct.iter().map(|v| v.lon).sum::<f64>() / count,
            distinct.iter().map(|v| v.lat).sum::<f64>() / count,
        );
        let bounds = BoundingBox {
            south: ring.iter().map(|v| v.lat).fold(f64::INFINITY, f64::min),
            west: ring.iter().map(|v| v.lon).fold(f64::INFINITY, f64::min),
            north: ring.iter().map(|v| v.lat).fold(f64::NEG_INFINITY, f64::max),
            east: ring.iter().map(|v| v.lon).fold(f64::NEG_INFINITY, f64::max),
        };

        Ok(Self {
            ring,
            height_m,
            source_id,
            bounds,
            centroid,
        })
    }

    /// Convenience constructor for an axis-aligned rectangular footprint.
    pub fn rectangle(bounds: BoundingBox, height_m: f64, source_id: Option<i64>) -> Result<Self> {
        Self::new(
            vec![
                LonLat::new(bounds.west, bounds.south),
                LonLat::new(bounds.east, bounds.south),
                LonLat::new(bounds.east, bounds.north),
                LonLat::new(bounds.west, bounds.north),
            ],
            height_m,
            source_id,
        )
    }

    pub fn ring(&self) -> &[LonLat] {
        &self.ring
    }

    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    pub fn source_id(&self) -> Option<i64> {
        self.source_id
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Arithmetic mean of the distinct ring vertices.
    pub fn centroid(&self) -> LonLat {
        self.centroid
    }

    /// Whether `point` lies inside or on the boundary of the footprint.
    pub fn contains(&self, point: LonLat) -> bool {
        if !self.bounds.contains(point) {
            return false;
        }

        let ring = &self.ring;
        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (a, b) = (ring[i], ring[j]);
            if on_segment(point, a, b) {
                return true;
            }
            if (a.lat > point.lat) != (b.lat > point.lat)
                && point.lon < (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

fn distinct_vertices(ring: &[LonLat]) -> &[LonLat] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

fn on_segment(p: LonLat, a: LonLat, b: LonLat) -> bool {
    let cross = (b.lon - a.lon) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lon - a.lon);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.lon >= a.lon.min(b.lon) - EDGE_EPSILON
        && p.lon <= a.lon.max(b.lon) + EDGE_EPSILON
        && p.lat >= a.lat.min(b.lat) - EDGE_EPSILON
        && p.lat <= a.lat.max(b.lat) + EDGE_EPSILON
}

/// Whether `point` lies inside any of `buildings`.
pub fn is_occupied(point: LonLat, buildings: &[Building]) -> bool {
    buildings.iter().any(|building| building.contains(point))
}

/// Serialized form of a [`Building`]; derived fields are recomputed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BuildingRecord {
    ring: Vec<LonLat>,
    height_m: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_id: Option<i64>,
}

impl TryFrom<BuildingRecord> for Building {
    type Error = Error;

    fn try_from(record: BuildingRecord) -> Result<Self> {
        Building::new(record.ring, record.height_m, record.source_id)
    }
}

impl From<Building> for BuildingRecord {
    fn from(building: Building) -> Self {
        Self {
            ring: building.ring,
            height_m: building.height_m,
            source_id: building.source_id,
        }
    }
}
