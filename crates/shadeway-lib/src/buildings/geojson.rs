use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::overpass::estimate_height;
use crate::building::Building;
use crate::error::Result;
use crate::geo::LonLat;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    #[serde(other)]
    Unsupported,
}

/// Read a GeoJSON FeatureCollection of building polygons from disk.
pub fn load_geojson(path: &Path) -> Result<Vec<Building>> {
    let text = fs::read_to_string(path)?;
    let buildings = parse_geojson(&text)?;
    info!(path = %path.display(), buildings = buildings.len(), "loaded buildings");
    Ok(buildings)
}

/// Parse a FeatureCollection of `Polygon` features.
///
/// The outer ring of each polygon becomes the footprint. Height comes from a
/// numeric `height` property, otherwise from the string properties treated as
/// OpenStreetMap tags. Features that are not usable polygons are skipped.
pub fn parse_geojson(text: &str) -> Result<Vec<Building>> {
    let collection: FeatureCollection = serde_json::from_str(text)?;
    let buildings = collection
        .features
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| match feature_to_building(feature) {
            Some(building) => Some(building),
            None => {
                debug!(index, "skipping unusable GeoJSON feature");
                None
            }
        })
        .collect();
    Ok(buildings)
}

fn feature_to_building(value: Value) -> Option<Building> {
    let feature: Feature = serde_json::from_value(value).ok()?;
    let Geometry::Polygon { coordinates } = feature.geometry else {
        return None;
    };
    let ring = coordinates
        .into_iter()
        .next()?
        .into_iter()
        .map(|[lon, lat]| LonLat::new(lon, lat))
        .collect();

    let properties = feature.properties;
    let height = match properties.get("height").and_then(Value::as_f64) {
        Some(height) => height,
        None => {
            let tags: HashMap<String, String> = properties
                .iter()
                .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
                .collect();
            estimate_height(&tags)
        }
    };
    let source_id = properties.get("osm_id").and_then(Value::as_i64);

    Building::new(ring, height, source_id).ok()
}

/// Serialize buildings as a GeoJSON FeatureCollection with closed rings.
pub fn to_geojson(buildings: &[Building]) -> Value {
    let features: Vec<Value> = buildings
        .iter()
        .map(|building| {
            let mut ring: Vec<[f64; 2]> = building
                .ring()
                .iter()
                .map(|vertex| [vertex.lon, vertex.lat])
                .collect();
            if ring.first() != ring.last() {
                if let Some(first) = ring.first().copied() {
                    ring.push(first);
                }
            }
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [ring] },
                "properties": {
                    "height": building.height_m(),
                    "osm_id": building.source_id(),
                },
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}
