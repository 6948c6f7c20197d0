//! Request types and validation for HTTP endpoints.
//!
//! Wire types mirror what browser clients send (`[longitude, latitude]` pairs
//! and `HH:MM` strings) and convert into library types only after validation.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use shadeway_lib::{
    BoundingBox, LonLat, RouteRequest as LibRouteRequest, TimeOfDay, TransportMode,
};

use crate::ProblemDetails;

/// Validation trait for request types.
pub trait Validate {
    /// Validate the request, returning an error if invalid.
    ///
    /// The `request_id` populates the `instance` field of any returned
    /// `ProblemDetails`. The problem is boxed to keep `Result::Err` small.
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>>;
}

/// Body of the `POST /api/v1/route*` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    /// `[longitude, latitude]`.
    pub start: [f64; 2],

    /// `[longitude, latitude]`.
    pub end: [f64; 2],

    /// Time of day, `HH:MM`.
    pub time: String,

    /// `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default)]
    pub transport_mode: TransportMode,
}

impl RouteRequest {
    /// Convert to the library request, validating every field.
    pub fn to_lib(&self, request_id: &str) -> Result<LibRouteRequest, Box<ProblemDetails>> {
        let start = coordinate("start", self.start, request_id)?;
        let end = coordinate("end", self.end, request_id)?;
        let time = time_of_day(&self.time, request_id)?;

        let mut request = LibRouteRequest::new(start, end, time).with_mode(self.transport_mode);
        if let Some(date) = &self.date {
            request = request.with_date(date.trim());
        }
        request.validate().map_err(|e| bad_request(e, request_id))?;
        Ok(request)
    }
}

impl Validate for RouteRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        self.to_lib(request_id).map(|_| ())
    }
}

/// Query of `GET /api/v1/shade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadeQuery {
    pub lon: f64,
    pub lat: f64,
    /// `HH:MM`; defaults to 12:00.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl ShadeQuery {
    pub fn point(&self, request_id: &str) -> Result<LonLat, Box<ProblemDetails>> {
        coordinate("point", [self.lon, self.lat], request_id)
    }

    pub fn time(&self, request_id: &str) -> Result<TimeOfDay, Box<ProblemDetails>> {
        match &self.time {
            Some(value) => time_of_day(value, request_id),
            None => TimeOfDay::new(12, 0).map_err(|e| bad_request(e, request_id)),
        }
    }
}

impl Validate for ShadeQuery {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        self.point(request_id)?;
        self.time(request_id)?;
        Ok(())
    }
}

/// Query of `GET /api/v1/shade/hourly`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyShadeQuery {
    pub lon: f64,
    pub lat: f64,
}

impl HourlyShadeQuery {
    pub fn point(&self, request_id: &str) -> Result<LonLat, Box<ProblemDetails>> {
        coordinate("point", [self.lon, self.lat], request_id)
    }
}

impl Validate for HourlyShadeQuery {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        self.point(request_id).map(|_| ())
    }
}

/// Query of `GET /api/v1/shade/current`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentShadeQuery {
    pub lon: f64,
    pub lat: f64,
}

impl CurrentShadeQuery {
    pub fn point(&self, request_id: &str) -> Result<LonLat, Box<ProblemDetails>> {
        coordinate("point", [self.lon, self.lat], request_id)
    }
}

impl Validate for CurrentShadeQuery {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        self.point(request_id).map(|_| ())
    }
}

/// Most route points a single timeline request may carry.
pub const MAX_TIMELINE_POINTS: usize = 500;

/// One point of an existing route. Any shade ratio the client sends along is
/// ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub longitude: f64,
    pub latitude: f64,
}

/// Body of `POST /api/v1/shade/timeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineRequest {
    pub route_points: Vec<TimelinePoint>,

    /// `YYYY-MM-DD`; defaults to today. Echoed back only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl TimelineRequest {
    pub fn points(&self, request_id: &str) -> Result<Vec<LonLat>, Box<ProblemDetails>> {
        if self.route_points.len() > MAX_TIMELINE_POINTS {
            return Err(Box::new(ProblemDetails::bad_request(
                format!(
                    "A timeline covers at most {MAX_TIMELINE_POINTS} points, got {}",
                    self.route_points.len()
                ),
                request_id,
            )));
        }
        self.route_points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let field = format!("route_points[{index}]");
                coordinate(&field, [point.longitude, point.latitude], request_id)
            })
            .collect()
    }

    pub fn date(&self, request_id: &str) -> Result<String, Box<ProblemDetails>> {
        match &self.date {
            Some(value) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map(|date| date.format("%Y-%m-%d").to_string())
                .map_err(|_| {
                    Box::new(ProblemDetails::bad_request(
                        format!("invalid date '{value}', expected YYYY-MM-DD"),
                        request_id,
                    ))
                }),
            None => Ok(Local::now().format("%Y-%m-%d").to_string()),
        }
    }
}

impl Validate for TimelineRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        self.points(request_id)?;
        self.date(request_id)?;
        Ok(())
    }
}

/// Largest bounding box side, in degrees, the buildings endpoint will query.
pub const MAX_BUILDINGS_SPAN_DEGREES: f64 = 0.05;

/// Query of `GET /api/v1/buildings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingsQuery {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BuildingsQuery {
    pub fn bounds(&self, request_id: &str) -> Result<BoundingBox, Box<ProblemDetails>> {
        let bounds = BoundingBox::new(self.south, self.west, self.north, self.east)
            .map_err(|e| bad_request(e, request_id))?;
        if bounds.width_degrees() > MAX_BUILDINGS_SPAN_DEGREES
            || bounds.height_degrees() > MAX_BUILDINGS_SPAN_DEGREES
        {
            return Err(Box::new(ProblemDetails::bad_request(
                format!("Each side may span at most {MAX_BUILDINGS_SPAN_DEGREES} degrees"),
                request_id,
            )));
        }
        Ok(bounds)
    }
}

impl Validate for BuildingsQuery {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        self.bounds(request_id).map(|_| ())
    }
}

fn coordinate(
    field: &str,
    [lon, lat]: [f64; 2],
    request_id: &str,
) -> Result<LonLat, Box<ProblemDetails>> {
    let point = LonLat::new(lon, lat);
    point.validate().map_err(|e| {
        Box::new(ProblemDetails::bad_request(
            format!("The '{field}' field is invalid: {e}"),
            request_id,
        ))
    })?;
    Ok(point)
}

fn time_of_day(value: &str, request_id: &str) -> Result<TimeOfDay, Box<ProblemDetails>> {
    TimeOfDay::parse(value).map_err(|e| bad_request(e, request_id))
}

fn bad_request(error: impl std::fmt::Display, request_id: &str) -> Box<ProblemDetails> {
    Box::new(ProblemDetails::bad_request(error.to_string(), request_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(start: [f64; 2], time: &str) -> RouteRequest {
        RouteRequest {
            start,
            end: [139.7036, 35.6917],
            time: time.to_string(),
            date: Some("2024-07-15".to_string()),
            transport_mode: TransportMode::Bike,
        }
    }

    #[test]
    fn valid_route_converts() {
        let request = route([139.7006, 35.6896], "9:30").to_lib("req").unwrap();
        assert_eq!(request.start, LonLat::new(139.7006, 35.6896));
        assert_eq!(request.time.hour(), 9);
        assert_eq!(request.transport_mode, TransportMode::Bike);
        assert_eq!(request.date.as_deref(), Some("2024-07-15"));
    }

    #[test]
    fn route_validation_rejects_bad_fields() {
        let bad_lon = route([181.0, 35.0], "10:00").validate("req-1").unwrap_err();
        assert_eq!(bad_lon.status, 400);
        assert!(bad_lon.detail.unwrap().contains("'start'"));

        let bad_time = route([139.7, 35.69], "24:00").validate("req-2").unwrap_err();
        assert_eq!(bad_time.instance.as_deref(), Some("req-2"));

        let mut bad_date = route([139.7, 35.69], "10:00");
        bad_date.date = Some("2024/07/15".to_string());
        assert!(bad_date.validate("req-3").is_err());
    }

    #[test]
    fn route_body_defaults_mode_and_date() {
        let request: RouteRequest = serde_json::from_str(
            r#"{"start":[139.7006,35.6896],"end":[139.7036,35.6917],"time":"14:00"}"#,
        )
        .unwrap();
        assert_eq!(request.transport_mode, TransportMode::Walk);
        assert!(request.date.is_none());
        request.validate("req").unwrap();
    }

    #[test]
    fn shade_query_defaults_to_noon() {
        let query = ShadeQuery {
            lon: 139.7,
            lat: 35.69,
            time: None,
        };
        assert_eq!(query.time("req").unwrap(), TimeOfDay::new(12, 0).unwrap());

        let bad = ShadeQuery {
            lon: 139.7,
            lat: -91.0,
            time: None,
        };
        assert!(bad.validate("req").is_err());
    }

    #[test]
    fn timeline_request_validates_points_and_date() {
        let request: TimelineRequest = serde_json::from_str(
            r#"{"route_points":[
                {"longitude":139.7000,"latitude":35.6900,"shade_ratio":0.4},
                {"longitude":139.7010,"latitude":35.6905}
            ],"date":"2024-07-15"}"#,
        )
        .unwrap();
        let points = request.points("req").unwrap();
        assert_eq!(points[1], LonLat::new(139.7010, 35.6905));
        assert_eq!(request.date("req").unwrap(), "2024-07-15");

        let mut bad_point = request.clone();
        bad_point.route_points[1].latitude = 95.0;
        let problem = bad_point.validate("req-1").unwrap_err();
        assert!(problem.detail.unwrap().contains("route_points[1]"));

        let mut bad_date = request.clone();
        bad_date.date = Some("15.07.2024".to_string());
        assert_eq!(bad_date.validate("req-2").unwrap_err().status, 400);

        let undated = TimelineRequest {
            date: None,
            ..request
        };
        assert_eq!(undated.date("req").unwrap().len(), 10);
    }

    #[test]
    fn timeline_request_limits_the_point_count() {
        let request = TimelineRequest {
            route_points: vec![
                TimelinePoint {
                    longitude: 139.7,
                    latitude: 35.69,
                };
                MAX_TIMELINE_POINTS + 1
            ],
            date: None,
        };
        assert_eq!(request.validate("req").unwrap_err().status, 400);
    }

    #[test]
    fn buildings_query_limits_the_span() {
        let small = BuildingsQuery {
            south: 35.68,
            west: 139.69,
            north: 35.70,
            east: 139.71,
        };
        small.validate("req").unwrap();

        let huge = BuildingsQuery {
            south: 35.0,
            west: 139.0,
            north: 36.0,
            east: 140.0,
        };
        assert!(huge.validate("req").is_err());

        let inverted = BuildingsQuery {
            south: 35.70,
            west: 139.69,
            north: 35.68,
            east: 139.71,
        };
        assert_eq!(inverted.validate("req").unwrap_err().status, 400);
    }
}
