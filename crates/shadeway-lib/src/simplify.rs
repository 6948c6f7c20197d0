//! Path reduction: collinear point removal and uniform downsampling.

use crate::geo::LonLat;
use crate::grid::GridCell;

/// Cross products below this magnitude count as collinear.
pub const COLLINEAR_EPSILON: f64 = 1e-10;

/// A point on a path that can be tested for collinearity.
pub trait Waypoint {
    /// Position in the plane used for the collinearity test.
    fn plane(&self) -> (f64, f64);
}

impl Waypoint for GridCell {
    fn plane(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

impl Waypoint for LonLat {
    fn plane(&self) -> (f64, f64) {
        (self.lon, self.lat)
    }
}

/// Drop interior points that lie on the line through their immediate
/// neighbours in the input. Endpoints are always kept.
pub fn simplify<T: Waypoint + Clone>(path: &[T]) -> Vec<T> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut reduced = Vec::with_capacity(path.len());
    reduced.push(path[0].clone());
    for window in path.windows(3) {
        if !is_collinear(&window[0], &window[1], &window[2]) {
            reduced.push(window[1].clone());
        }
    }
    reduced.push(path[path.len() - 1].clone());
    reduced
}

/// Downsample `path` by a uniform stride so it holds at most `max_points`
/// points, always keeping the first and last point.
///
/// A `max_points` below two is treated as two.
pub fn cap<T: Clone>(path: &[T], max_points: usize) -> Vec<T> {
    let max_points = max_points.max(2);
    if path.len() <= max_points {
        return path.to_vec();
    }

    let last = path.len() - 1;
    let stride = last.div_ceil(max_points - 1);
    let mut capped: Vec<T> = (0..last).step_by(stride).map(|i| path[i].clone()).collect();
    capped.push(path[last].clone());
    capped
}

fn is_collinear<T: Waypoint>(a: &T, b: &T, c: &T) -> bool {
    let (ax, ay) = a.plane();
    let (bx, by) = b.plane();
    let (cx, cy) = c.plane();
    let cross = (cy - ay) * (bx - ax) - (by - ay) * (cx - ax);
    cross.abs() < COLLINEAR_EPSILON
}
