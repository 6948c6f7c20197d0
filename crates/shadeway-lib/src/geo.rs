//! Geographic primitives shared by the grid, shade model and router.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed metres-per-degree approximation used for shadow lengths and grid
/// edge lengths.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Mean Earth radius used by [`haversine_m`].
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A `(longitude, latitude)` pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Reject coordinates outside the valid WGS84 range.
    pub fn validate(&self) -> Result<()> {
        if !self.lon.is_finite() || !self.lat.is_finite() {
            return Err(self.invalid("coordinates must be finite"));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(self.invalid("longitude must be within -180..=180"));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(self.invalid("latitude must be within -90..=90"));
        }
        Ok(())
    }

    /// Planar distance in degrees. The shade heuristics work in this space.
    pub fn planar_distance(&self, other: &LonLat) -> f64 {
        ((self.lon - other.lon).powi(2) + (self.lat - other.lat).powi(2)).sqrt()
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidCoordinate {
            lon: self.lon,
            lat: self.lat,
            reason: reason.to_string(),
        }
    }
}

impl From<(f64, f64)> for LonLat {
    fn from((lon, lat): (f64, f64)) -> Self {
        Self { lon, lat }
    }
}

/// Great-circle distance between two points in metres.
pub fn haversine_m(a: LonLat, b: LonLat) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// `(south, west, north, east)` rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Build a bounding box, rejecting inverted or non-finite extents.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        let bbox = Self {
            south,
            west,
            north,
            east,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<()> {
        let values = [self.south, self.west, self.north, self.east];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidBoundingBox {
                reason: "all edges must be finite".to_string(),
            });
        }
        if self.north < self.south {
            return Err(Error::InvalidBoundingBox {
                reason: format!("north {} is below south {}", self.north, self.south),
            });
        }
        if self.east < self.west {
            return Err(Error::InvalidBoundingBox {
                reason: format!("east {} is west of west {}", self.east, self.west),
            });
        }
        Ok(())
    }

    /// Smallest box containing both points, grown by `margin` degrees on
    /// every side.
    pub fn around(a: LonLat, b: LonLat, margin: f64) -> Self {
        Self {
            south: a.lat.min(b.lat) - margin,
            west: a.lon.min(b.lon) - margin,
            north: a.lat.max(b.lat) + margin,
            east: a.lon.max(b.lon) + margin,
        }
    }

    /// Smallest box containing every point, grown by `margin` degrees. `None`
    /// for an empty slice.
    pub fn enclosing(points: &[LonLat], margin: f64) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let seed = Self::around(*first, *first, 0.0);
        let tight = rest.iter().fold(seed, |bbox, p| Self {
            south: bbox.south.min(p.lat),
            west: bbox.west.min(p.lon),
            north: bbox.north.max(p.lat),
            east: bbox.east.max(p.lon),
        });
        Some(Self {
            south: tight.south - margin,
            west: tight.west - margin,
            north: tight.north + margin,
            east: tight.east + margin,
        })
    }

    pub fn width_degrees(&self) -> f64 {
        self.east - self.west
    }

    pub fn height_degrees(&self) -> f64 {
        self.north - self.south
    }

    /// The larger of width and height.
    pub fn span_degrees(&self) -> f64 {
        self.width_degrees().max(self.height_degrees())
    }

    pub fn contains(&self, point: LonLat) -> bool {
        (self.west..=self.east).contains(&point.lon)
            && (self.south..=self.north).contains(&point.lat)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }
}
