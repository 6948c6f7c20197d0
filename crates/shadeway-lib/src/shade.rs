//! Coarse time-of-day shade model.
//!
//! The sun position is a linear function of the hour, not an ephemeris. Each
//! building casts a single shadow segment from its centroid away from the sun;
//! a point close enough to the end of that segment is considered shaded by the
//! building. The constants of that heuristic live in [`ShadeParameters`] so
//! they can be tuned without touching the estimator.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::building::{self, Building};
use crate::error::{Error, Result};
use crate::geo::{LonLat, METERS_PER_DEGREE};

/// First hour treated as daylight.
pub const DAYLIGHT_START_HOUR: u32 = 6;
/// Last hour treated as daylight.
pub const DAYLIGHT_END_HOUR: u32 = 18;

/// Wall-clock time of day, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|_| Self { hour, minute })
            .ok_or_else(|| Error::InvalidTime {
                value: format!("{hour}:{minute:02}"),
            })
    }

    /// Parse an `HH:MM` (or `H:MM`) string.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let parsed =
            NaiveTime::parse_from_str(trimmed, "%H:%M").map_err(|_| Error::InvalidTime {
                value: value.to_string(),
            })?;
        Ok(Self {
            hour: parsed.hour(),
            minute: parsed.minute(),
        })
    }

    /// Local wall-clock time, truncated to the minute.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            hour: now.hour(),
            minute: now.minute(),
        }
    }

    /// This time moved forward by `minutes`, wrapping past midnight.
    pub fn plus_minutes(&self, minutes: u32) -> Self {
        let total = (self.hour * 60 + self.minute + minutes % 1440) % 1440;
        Self {
            hour: total / 60,
            minute: total % 60,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Whether the hour falls inside the 06:00–18:00 daylight window.
    pub fn is_daylight(&self) -> bool {
        (DAYLIGHT_START_HOUR..=DAYLIGHT_END_HOUR).contains(&self.hour)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Linear sun model derived from the hour only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    /// Degrees above the horizon, never negative.
    pub elevation_deg: f64,
    /// Degrees, 0 at noon, negative in the morning.
    pub azimuth_deg: f64,
}

impl SunPosition {
    pub fn at(time: TimeOfDay) -> Self {
        let offset = time.hour() as f64 - 12.0;
        Self {
            elevation_deg: (90.0 - offset.abs() * 7.5).max(0.0),
            azimuth_deg: offset * 15.0,
        }
    }

    pub fn is_up(&self) -> bool {
        self.elevation_deg > 0.0
    }
}

/// Tunable constants of the building shadow heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadeParameters {
    /// Metres per degree used to convert shadow lengths.
    pub meters_per_degree: f64,
    /// Buildings whose centroid is further than this multiple of the shadow
    /// length from the query point are skipped.
    pub prune_multiplier: f64,
    /// A point within this multiple of the shadow length from the shadow's
    /// terminal point is shaded.
    pub terminal_radius_multiplier: f64,
    /// Height (metres) that maps to full building shade before capping.
    pub height_divisor: f64,
    /// Upper bound on the shade a single building can contribute.
    pub max_building_shade: f64,
}

impl Default for ShadeParameters {
    fn default() -> Self {
        Self {
            meters_per_degree: METERS_PER_DEGREE,
            prune_multiplier: 1.5,
            terminal_radius_multiplier: 0.6,
            height_divisor: 40.0,
            max_building_shade: 0.9,
        }
    }
}

/// Shade contributed by the environment rather than by buildings.
///
/// A small daytime term that varies with the hour and with the offset from a
/// fixed reference location, capped well below full shade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientShade {
    pub reference: LonLat,
    /// Shade applied at the first and last daylight hour.
    pub twilight_shade: f64,
    pub base: f64,
    pub amplitude: f64,
    pub latitude_weight: f64,
    pub longitude_weight: f64,
    pub position_scale: f64,
    pub cap: f64,
}

impl Default for AmbientShade {
    fn default() -> Self {
        Self {
            // Shinjuku station.
            reference: LonLat::new(139.7036, 35.6917),
            twilight_shade: 0.8,
            base: 0.1,
            amplitude: 0.05,
            latitude_weight: 1.0,
            longitude_weight: 0.3,
            position_scale: 0.05,
            cap: 0.3,
        }
    }
}

impl AmbientShade {
    pub fn at(&self, point: LonLat, time: TimeOfDay) -> f64 {
        let hour = time.hour();
        if !time.is_daylight() {
            return 1.0;
        }
        if hour == DAYLIGHT_START_HOUR || hour == DAYLIGHT_END_HOUR {
            return self.twilight_shade;
        }

        let time_factor = self.base
            + self.amplitude * ((hour as f64 - 12.0) * std::f64::consts::PI / 6.0).sin();
        let position_factor = ((point.lat - self.reference.lat) * self.latitude_weight
            + (point.lon - self.reference.lon) * self.longitude_weight)
            * self.position_scale;

        (time_factor + position_factor).clamp(0.0, self.cap)
    }
}

/// Reports building-caused shade and occupancy for a point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShadeEstimator {
    params: ShadeParameters,
}

impl ShadeEstimator {
    pub fn new(params: ShadeParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ShadeParameters {
        &self.params
    }

    /// Building shade at `point`, in `[0, 1]`.
    ///
    /// Outside daylight hours, or whenever the sun is not above the horizon,
    /// the point is fully shaded regardless of `buildings`.
    pub fn shade_factor(&self, point: LonLat, time: TimeOfDay, buildings: &[Building]) -> f64 {
        if !time.is_daylight() {
            return 1.0;
        }
        let sun = SunPosition::at(time);
        if !sun.is_up() {
            return 1.0;
        }

        let strongest = buildings
            .iter()
            .filter_map(|building| self.building_shade(point, sun, building))
            .fold(0.0_f64, f64::max);

        strongest.min(1.0)
    }

    /// Shade cast on `point` by a single building, or `None` when the building
    /// is pruned, does not reach the point, or produces unusable numbers.
    pub fn building_shade(
        &self,
        point: LonLat,
        sun: SunPosition,
        building: &Building,
    ) -> Option<f64> {
        let params = &self.params;
        let centroid = building.centroid();
        let shadow_length = (building.height_m() / params.meters_per_degree)
            / sun.elevation_deg.to_radians().tan();
        if !shadow_length.is_finite() || shadow_length <= 0.0 {
            trace!(
                source_id = ?building.source_id(),
                "skipping building with unusable shadow length"
            );
            return None;
        }

        if point.planar_distance(&centroid) > shadow_length * params.prune_multiplier {
            return None;
        }

        let direction = (sun.azimuth_deg + 180.0).to_radians();
        let terminal = LonLat::new(
            centroid.lon + shadow_length * direction.cos(),
            centroid.lat + shadow_length * direction.sin(),
        );

        if point.planar_distance(&terminal) < shadow_length * params.terminal_radius_multiplier {
            let shade =
                (building.height_m() / params.height_divisor).min(params.max_building_shade);
            shade.is_finite().then_some(shade.max(0.0))
        } else {
            None
        }
    }

    /// Whether `point` lies inside any building footprint.
    pub fn is_occupied(&self, point: LonLat, buildings: &[Building]) -> bool {
        building::is_occupied(point, buildings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;

    #[test]
    fn plus_minutes_wraps_past_midnight() {
        let time = TimeOfDay::parse("23:58").unwrap();
        assert_eq!(time.plus_minutes(5).to_string(), "00:03");
        assert_eq!(time.plus_minutes(1440), time);
        assert_eq!(TimeOfDay::parse("09:30").unwrap().plus_minutes(45).to_string(), "10:15");
    }

    #[test]
    fn now_is_a_valid_time() {
        let now = TimeOfDay::now();
        assert!(now.hour() < 24 && now.minute() < 60);
    }

    fn tower(lon: f64, lat: f64, height: f64) -> Building {
        Building::rectangle(
            BoundingBox {
                south: lat - 0.00005,
                west: lon - 0.00005,
                north: lat + 0.00005,
                east: lon + 0.00005,
            },
            height,
            None,
        )
        .unwrap()
    }

    fn time(value: &str) -> TimeOfDay {
        TimeOfDay::parse(value).unwrap()
    }

    #[test]
    fn parses_valid_times() {
        assert_eq!(time("09:30"), TimeOfDay::new(9, 30).unwrap());
        assert_eq!(time("9:05").to_string(), "09:05");
        assert_eq!(time("23:59").hour(), 23);
    }

    #[test]
    fn rejects_invalid_times() {
        for value in ["24:00", "12:60", "noon", "", "12"] {
            assert!(TimeOfDay::parse(value).is_err(), "{value} should fail");
        }
    }

    #[test]
    fn sun_model_is_linear_in_hour() {
        let noon = SunPosition::at(time("12:00"));
        assert_eq!(noon.elevation_deg, 90.0);
        assert_eq!(noon.azimuth_deg, 0.0);

        let morning = SunPosition::at(time("08:00"));
        assert_eq!(morning.elevation_deg, 60.0);
        assert_eq!(morning.azimuth_deg, -60.0);
    }

    #[test]
    fn night_is_fully_shaded_regardless_of_buildings() {
        let estimator = ShadeEstimator::default();
        let point = LonLat::new(139.7, 35.69);
        assert_eq!(estimator.shade_factor(point, time("03:00"), &[]), 1.0);
        let buildings = vec![tower(139.7, 35.69, 80.0)];
        assert_eq!(estimator.shade_factor(point, time("03:00"), &buildings), 1.0);
        assert_eq!(estimator.shade_factor(point, time("19:00"), &buildings), 1.0);
    }

    #[test]
    fn no_buildings_means_no_building_shade_by_day() {
        let estimator = ShadeEstimator::default();
        let point = LonLat::new(139.7, 35.69);
        assert_eq!(estimator.shade_factor(point, time("10:00"), &[]), 0.0);
    }

    #[test]
    fn point_at_shadow_terminal_is_shaded() {
        let estimator = ShadeEstimator::default();
        let building = tower(139.7, 35.69, 20.0);
        let t = time("09:00");
        let sun = SunPosition::at(t);
        let length = (20.0 / METERS_PER_DEGREE) / sun.elevation_deg.to_radians().tan();
        let direction = (sun.azimuth_deg + 180.0).to_radians();
        let terminal = LonLat::new(
            139.7 + length * direction.cos(),
            35.69 + length * direction.sin(),
        );

        let shade = estimator.shade_factor(terminal, t, std::slice::from_ref(&building));
        assert!((shade - 0.5).abs() < 1e-12, "expected 20/40, got {shade}");
    }

    #[test]
    fn tall_buildings_cap_at_max_building_shade() {
        let estimator = ShadeEstimator::default();
        let building = tower(139.7, 35.69, 120.0);
        let t = time("09:00");
        let sun = SunPosition::at(t);
        let length = (120.0 / METERS_PER_DEGREE) / sun.elevation_deg.to_radians().tan();
        let direction = (sun.azimuth_deg + 180.0).to_radians();
        let terminal = LonLat::new(
            139.7 + length * direction.cos(),
            35.69 + length * direction.sin(),
        );
        assert_eq!(estimator.shade_factor(terminal, t, &[building]), 0.9);
    }

    #[test]
    fn distant_buildings_are_pruned() {
        let estimator = ShadeEstimator::default();
        let building = tower(139.8, 35.79, 50.0);
        let shade = estimator.shade_factor(LonLat::new(139.7, 35.69), time("10:00"), &[building]);
        assert_eq!(shade, 0.0);
    }

    #[test]
    fn strongest_building_wins() {
        let estimator = ShadeEstimator::default();
        let t = time("09:00");
        // Both towers share a centroid, so the taller shadow reaches further;
        // query the midpoint region covered by both terminal discs.
        let short = tower(139.7, 35.69, 16.0);
        let tall = tower(139.7, 35.69, 24.0);
        let sun = SunPosition::at(t);
        let length = (20.0 / METERS_PER_DEGREE) / sun.elevation_deg.to_radians().tan();
        let direction = (sun.azimuth_deg + 180.0).to_radians();
        let probe = LonLat::new(
            139.7 + length * direction.cos(),
            35.69 + length * direction.sin(),
        );
        let shade = estimator.shade_factor(probe, t, &[short, tall]);
        assert!((shade - 0.6).abs() < 1e-12, "got {shade}");
    }

    #[test]
    fn custom_parameters_change_the_heuristic() {
        let estimator = ShadeEstimator::new(ShadeParameters {
            height_divisor: 30.0,
            ..ShadeParameters::default()
        });
        let building = tower(139.7, 35.69, 15.0);
        let t = time("09:00");
        let sun = SunPosition::at(t);
        let length = (15.0 / METERS_PER_DEGREE) / sun.elevation_deg.to_radians().tan();
        let direction = (sun.azimuth_deg + 180.0).to_radians();
        let terminal = LonLat::new(
            139.7 + length * direction.cos(),
            35.69 + length * direction.sin(),
        );
        let shade = estimator.shade_factor(terminal, t, &[building]);
        assert!((shade - 0.5).abs() < 1e-12);
    }

    #[test]
    fn occupancy_uses_footprints() {
        let estimator = ShadeEstimator::default();
        let buildings = vec![tower(139.7, 35.69, 10.0)];
        assert!(estimator.is_occupied(LonLat::new(139.7, 35.69), &buildings));
        assert!(!estimator.is_occupied(LonLat::new(139.701, 35.69), &buildings));
    }

    #[test]
    fn ambient_shade_follows_the_clock() {
        let ambient = AmbientShade::default();
        let at_reference = ambient.reference;
        assert_eq!(ambient.at(at_reference, time("03:00")), 1.0);
        assert_eq!(ambient.at(at_reference, time("06:30")), 0.8);
        assert_eq!(ambient.at(at_reference, time("18:10")), 0.8);
        assert!((ambient.at(at_reference, time("12:00")) - 0.1).abs() < 1e-12);
        let afternoon = ambient.at(at_reference, time("15:00"));
        assert!((afternoon - 0.15).abs() < 1e-12, "got {afternoon}");
    }

    #[test]
    fn ambient_shade_is_capped() {
        let ambient = AmbientShade::default();
        let far_north = LonLat::new(139.7036, 45.0);
        assert_eq!(ambient.at(far_north, time("12:00")), 0.3);
        let far_south = LonLat::new(139.7036, 25.0);
        assert_eq!(ambient.at(far_south, time("12:00")), 0.0);
    }
}
