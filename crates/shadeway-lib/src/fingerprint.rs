//! Deterministic cache keys.
//!
//! Coordinates are rendered at six decimal places (roughly 0.1 m) before
//! hashing so that requests differing only in float noise share a key.

use sha2::{Digest, Sha256};

use crate::building::Building;
use crate::geo::{BoundingBox, LonLat};
use crate::routing::RouteRequest;

/// SHA-256 hex digest of a bounding box.
pub fn bbox_fingerprint(bbox: &BoundingBox) -> String {
    digest(&format!(
        "bbox:{:.6},{:.6},{:.6},{:.6}",
        bbox.south, bbox.west, bbox.north, bbox.east
    ))
}

/// SHA-256 hex digest of everything that determines a planned route.
pub fn route_fingerprint(request: &RouteRequest) -> String {
    digest(&format!(
        "route:{}|{}|{}|{}|{}",
        point(request.start),
        point(request.end),
        request.time,
        request.date.as_deref().unwrap_or(""),
        request.transport_mode
    ))
}

/// SHA-256 hex digest identifying a set of buildings.
///
/// Buildings without a source id contribute their height and centroid.
pub fn buildings_fingerprint(buildings: &[Building]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("buildings:{}", buildings.len()));
    for building in buildings {
        match building.source_id() {
            Some(id) => hasher.update(format!("|id:{id}")),
            None => hasher.update(format!(
                "|anon:{}:{:.3}",
                point(building.centroid()),
                building.height_m()
            )),
        }
    }
    format!("{:x}", hasher.finalize())
}

fn point(p: LonLat) -> String {
    format!("{:.6},{:.6}", p.lon, p.lat)
}

fn digest(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
