use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::BuildingSource;
use crate::building::Building;
use crate::config::{OsmSettings, PerformanceSettings};
use crate::error::{Error, Result};
use crate::geo::{BoundingBox, LonLat};

/// Height assumed when no tag says otherwise.
pub const DEFAULT_HEIGHT_M: f64 = 10.0;

const MIN_HEIGHT_M: f64 = 3.0;
const METRES_PER_LEVEL: f64 = 3.5;
const METRES_PER_FOOT: f64 = 0.3048;

const HEIGHT_BY_TYPE: &[(&str, f64)] = &[
    ("skyscraper", 100.0),
    ("office", 50.0),
    ("hotel", 40.0),
    ("apartments", 30.0),
    ("hospital", 25.0),
    ("commercial", 20.0),
    ("school", 15.0),
    ("house", 8.0),
    ("garage", 4.0),
    ("shed", 3.0),
];

/// Fetches building footprints from an Overpass API endpoint, falling back to
/// mirrors in order.
#[derive(Debug, Clone)]
pub struct OverpassSource {
    client: Client,
    endpoints: Vec<String>,
    timeout_secs: u64,
    max_buildings: usize,
}

impl OverpassSource {
    pub fn new(osm: &OsmSettings, performance: &PerformanceSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(performance.external_api_timeout_secs))
            .user_agent(user_agent())
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            client,
            endpoints: osm.endpoints().map(str::to_string).collect(),
            timeout_secs: performance.external_api_timeout_secs,
            max_buildings: performance.max_buildings_per_request,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Overpass QL for every building way, relation and part inside `bbox`.
    pub fn query(&self, bbox: &BoundingBox) -> String {
        let area = format!("{},{},{},{}", bbox.south, bbox.west, bbox.north, bbox.east);
        format!(
            "[out:json][timeout:{timeout}][maxsize:1073741824];\n(\n\
             \x20 way[building]({area});\n\
             \x20 relation[building]({area});\n\
             \x20 way[building:part]({area});\n\
             );\nout geom {max};\n",
            timeout = self.timeout_secs,
            max = self.max_buildings,
        )
    }

    fn fetch_from(&self, url: &str, query: &str) -> Result<Value> {
        let response = self
            .client
            .post(url)
            .body(query.to_string())
            .send()?
            .error_for_status()?;
        Ok(response.json::<Value>()?)
    }
}

impl BuildingSource for OverpassSource {
    fn fetch(&self, bbox: &BoundingBox) -> Result<Vec<Building>> {
        let query = self.query(bbox);
        for (attempt, url) in self.endpoints.iter().enumerate() {
            if attempt > 0 {
                info!(url = %url, attempt = attempt + 1, "trying backup Overpass endpoint");
            }
            match self.fetch_from(url, &query) {
                Ok(body) => {
                    let buildings = parse_overpass(&body, self.max_buildings);
                    info!(url = %url, buildings = buildings.len(), "building data fetched");
                    return Ok(buildings);
                }
                Err(err) => warn!(url = %url, error = %err, "Overpass request failed"),
            }
        }
        Err(Error::DataUnavailable {
            attempts: self.endpoints.len(),
        })
    }
}

fn user_agent() -> String {
    format!("shadeway-lib/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    geometry: Vec<OverpassNode>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassNode {
    lat: f64,
    lon: f64,
}

/// Convert an Overpass JSON response into buildings.
///
/// Only `way` elements with at least three geometry nodes are used. At most
/// `max_elements` elements are considered; malformed ones are skipped.
pub fn parse_overpass(body: &Value, max_elements: usize) -> Vec<Building> {
    let Some(elements) = body.get("elements").and_then(Value::as_array) else {
        debug!("Overpass response has no elements array");
        return Vec::new();
    };
    if elements.len() > max_elements {
        warn!(
            total = elements.len(),
            limit = max_elements,
            "limiting buildings per request"
        );
    }

    elements
        .iter()
        .take(max_elements)
        .filter_map(|element| {
            let element: OverpassElement = match serde_json::from_value(element.clone()) {
                Ok(element) => element,
                Err(err) => {
                    debug!(error = %err, "skipping unreadable Overpass element");
                    return None;
                }
            };
            if element.kind != "way" || element.geometry.len() < 3 {
                return None;
            }
            let ring = element
                .geometry
                .iter()
                .map(|node| LonLat::new(node.lon, node.lat))
                .collect();
            match Building::new(ring, estimate_height(&element.tags), element.id) {
                Ok(building) => Some(building),
                Err(err) => {
                    debug!(id = ?element.id, error = %err, "skipping malformed building");
                    None
                }
            }
        })
        .collect()
}

/// Infer a building's height in metres from its OpenStreetMap tags.
///
/// An explicit `height` wins (metres, or feet with an `ft` suffix), then
/// `building:levels`, then a per-type table, then [`DEFAULT_HEIGHT_M`].
pub fn estimate_height(tags: &HashMap<String, String>) -> f64 {
    if let Some(height) = tags.get("height").and_then(|value| parse_height(value)) {
        return height.max(MIN_HEIGHT_M);
    }

    if let Some(levels) = tags
        .get("building:levels")
        .and_then(|value| value.trim().parse::<u32>().ok())
    {
        return (levels as f64 * METRES_PER_LEVEL).max(MIN_HEIGHT_M);
    }

    tags.get("building")
        .and_then(|kind| {
            HEIGHT_BY_TYPE
                .iter()
                .find(|(name, _)| name == kind)
                .map(|(_, height)| *height)
        })
        .unwrap_or(DEFAULT_HEIGHT_M)
}

fn parse_height(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (number, scale) = if let Some(number) = raw.strip_suffix("ft") {
        (number, METRES_PER_FOOT)
    } else if let Some(number) = raw.strip_suffix('m') {
        (number, 1.0)
    } else {
        (raw, 1.0)
    };
    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn explicit_height_wins() {
        assert_eq!(estimate_height(&tags(&[("height", "42")])), 42.0);
        assert_eq!(estimate_height(&tags(&[("height", "42 m")])), 42.0);
        assert!((estimate_height(&tags(&[("height", "100ft")])) - 30.48).abs() < 1e-9);
        assert_eq!(estimate_height(&tags(&[("height", "1")])), 3.0);
    }

    #[test]
    fn levels_then_type_then_default() {
        assert_eq!(estimate_height(&tags(&[("building:levels", "10")])), 35.0);
        assert_eq!(estimate_height(&tags(&[("building:levels", "0")])), 3.0);
        assert_eq!(
            estimate_height(&tags(&[("height", "tall"), ("building", "office")])),
            50.0
        );
        assert_eq!(
            estimate_height(&tags(&[("building:levels", "3.5"), ("building", "house")])),
            8.0
        );
        assert_eq!(estimate_height(&tags(&[("building", "yes")])), DEFAULT_HEIGHT_M);
        assert_eq!(estimate_height(&HashMap::new()), DEFAULT_HEIGHT_M);
    }

    #[test]
    fn parses_ways_and_skips_everything_else() {
        let body = json!({
            "elements": [
                {
                    "type": "way",
                    "id": 7,
                    "geometry": [
                        {"lat": 35.0, "lon": 139.0},
                        {"lat": 35.0, "lon": 139.001},
                        {"lat": 35.001, "lon": 139.001},
                        {"lat": 35.0, "lon": 139.0}
                    ],
                    "tags": {"building": "hotel"}
                },
                {"type": "relation", "id": 8, "tags": {"building": "yes"}},
                {"type": "way", "id": 9, "geometry": [{"lat": 35.0, "lon": 139.0}]},
                {"type": "way", "id": 10, "geometry": "broken"}
            ]
        });

        let buildings = parse_overpass(&body, 1000);
        assert_eq!(buildings.len(), 1);
        assert_eq!(buildings[0].source_id(), Some(7));
        assert_eq!(buildings[0].height_m(), 40.0);
    }

    #[test]
    fn element_limit_is_applied_before_parsing() {
        let way = |id: i64| {
            json!({
                "type": "way",
                "id": id,
                "geometry": [
                    {"lat": 35.0, "lon": 139.0},
                    {"lat": 35.0, "lon": 139.001},
                    {"lat": 35.001, "lon": 139.001}
                ]
            })
        };
        let body = json!({ "elements": [way(1), way(2), way(3)] });
        assert_eq!(parse_overpass(&body, 2).len(), 2);
        assert!(parse_overpass(&json!({}), 10).is_empty());
    }

    #[test]
    fn query_covers_all_building_kinds() {
        let source =
            OverpassSource::new(&OsmSettings::default(), &PerformanceSettings::default()).unwrap();
        let query = source.query(&BoundingBox::new(35.68, 139.69, 35.70, 139.71).unwrap());
        assert!(query.contains("[timeout:30]"));
        assert!(query.contains("way[building](35.68,139.69,35.7,139.71)"));
        assert!(query.contains("relation[building]"));
        assert!(query.contains("way[building:part]"));
        assert!(query.contains("out geom 1000;"));
        assert_eq!(source.endpoints().len(), 3);
    }

    #[test]
    fn unreachable_endpoints_report_data_unavailable() {
        let osm = OsmSettings {
            overpass_url: "http://127.0.0.1:9/api/interpreter".to_string(),
            backup_urls: vec!["http://127.0.0.1:9/backup".to_string()],
        };
        let performance = PerformanceSettings {
            external_api_timeout_secs: 2,
            ..PerformanceSettings::default()
        };
        let source = OverpassSource::new(&osm, &performance).unwrap();
        let err = source
            .fetch(&BoundingBox::new(35.0, 139.0, 35.001, 139.001).unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { attempts: 2 }));
    }
}
