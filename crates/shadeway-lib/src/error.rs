use std::fmt;

use thiserror::Error;

/// Convenient result alias for the shadeway library.
pub type Result<T> = std::result::Result<T, Error>;

/// Which end of a route an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => f.write_str("start"),
            Endpoint::End => f.write_str("end"),
        }
    }
}

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised when a route endpoint snaps to a blocked cell or cannot be
    /// placed on the grid at all.
    #[error("invalid {endpoint} point: {reason}")]
    InvalidEndpoint { endpoint: Endpoint, reason: String },

    /// Raised when the search frontier empties before reaching the goal cell.
    #[error("no path found from cell {start:?} to cell {goal:?}")]
    NoPath {
        start: (usize, usize),
        goal: (usize, usize),
    },

    /// Raised when a building polygon cannot be used for shade or occupancy.
    #[error("malformed building geometry: {reason}")]
    MalformedGeometry { reason: String },

    /// Raised when no building source endpoint produced usable data.
    #[error("building data unavailable after {attempts} attempt(s)")]
    DataUnavailable { attempts: usize },

    /// Raised when a time-of-day string is not `HH:MM`.
    #[error("invalid time of day '{value}', expected HH:MM")]
    InvalidTime { value: String },

    /// Raised when a date string is not `YYYY-MM-DD`.
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// Raised when a coordinate lies outside the valid longitude/latitude range.
    #[error("invalid coordinate ({lon}, {lat}): {reason}")]
    InvalidCoordinate { lon: f64, lat: f64, reason: String },

    /// Raised when a bounding box is empty, inverted or not finite.
    #[error("invalid bounding box: {reason}")]
    InvalidBoundingBox { reason: String },

    /// Raised when the endpoints of a route, or the points of a timeline, lie
    /// further apart than one grid is allowed to cover.
    #[error("points span {span_degrees:.4} degrees; at most {max_degrees} degrees are supported")]
    RouteTooLong { span_degrees: f64, max_degrees: f64 },

    /// Raised when a grid is requested with a non-positive cell size.
    #[error("invalid cell size {value}; must be a positive finite number of degrees")]
    InvalidCellSize { value: f64 },

    /// Raised when configuration values cannot be used.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Raised when the scoring worker pool cannot be created.
    #[error("failed to build scoring worker pool: {message}")]
    WorkerPool { message: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Failure while computing the cost of a single grid cell.
///
/// Never aborts a scoring pass: the scorer applies the neutral cost instead and
/// counts the fault.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ScoringFault {
    #[error("building shade at cell ({x}, {y}) was not finite")]
    NonFiniteShade { x: usize, y: usize },

    #[error("ambient shade at cell ({x}, {y}) was not finite")]
    NonFiniteAmbient { x: usize, y: usize },
}
