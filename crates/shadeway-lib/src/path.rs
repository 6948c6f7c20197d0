use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Endpoint, Error, Result};
use crate::geo::LonLat;
use crate::grid::{GridCell, GridMap};

/// Scale applied to a cell's shade cost so it is comparable to edge lengths in
/// metres.
pub const SHADE_COST_SCALE: f64 = 1000.0;

/// Relative importance of shade and distance in the search objective.
///
/// The weights need not sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWeights {
    pub shade: f64,
    pub distance: f64,
}

impl SearchWeights {
    pub fn new(shade: f64, distance: f64) -> Self {
        Self { shade, distance }
    }

    /// Cost of stepping from `from` onto `to`.
    pub fn edge_cost(&self, grid: &GridMap, from: (usize, usize), to: &GridCell) -> f64 {
        self.distance * grid.metric_distance(from, to.position())
            + self.shade * (to.cost * SHADE_COST_SCALE)
    }
}

/// Find the cheapest 8-connected path between the cells nearest `start` and
/// `end` using Dijkstra's algorithm.
///
/// The search stops the moment the goal is popped from the frontier. Entries
/// with equal cumulative cost are expanded in the order they were discovered.
pub fn find_path(
    grid: &GridMap,
    start: LonLat,
    end: LonLat,
    weights: SearchWeights,
) -> Result<Vec<GridCell>> {
    let start_cell = endpoint_cell(grid, start, Endpoint::Start)?;
    let goal_cell = endpoint_cell(grid, end, Endpoint::End)?;
    let (start, goal) = (start_cell.position(), goal_cell.position());

    if start == goal {
        return Ok(vec![*start_cell]);
    }

    let mut distances: HashMap<(usize, usize), f64> = HashMap::new();
    let mut parents: HashMap<(usize, usize), Option<(usize, usize)>> = HashMap::new();
    let mut visited: HashSet<(usize, usize)> = HashSet::new();
    let mut queue = BinaryHeap::new();
    let mut sequence = 0_u64;

    distances.insert(start, 0.0);
    parents.insert(start, None);
    queue.push(QueueEntry::new(start, 0.0, sequence));

    while let Some(entry) = queue.pop() {
        if !visited.insert(entry.node) {
            continue;
        }

        if entry.node == goal {
            return Ok(reconstruct_path(grid, &parents, start, goal));
        }

        let current_distance = entry.cost.0;
        for next in grid.neighbours(entry.node.0, entry.node.1) {
            if visited.contains(&next) {
                continue;
            }
            let Some(cell) = grid.cell(next.0, next.1) else {
                continue;
            };

            let next_cost = current_distance + weights.edge_cost(grid, entry.node, cell);
            if next_cost < *distances.get(&next).unwrap_or(&f64::INFINITY) {
                distances.insert(next, next_cost);
                parents.insert(next, Some(entry.node));
                sequence += 1;
                queue.push(QueueEntry::new(next, next_cost, sequence));
            }
        }
    }

    Err(Error::NoPath { start, goal })
}

/// Sum of edge costs along `path` under `weights`.
pub fn path_cost(grid: &GridMap, path: &[GridCell], weights: SearchWeights) -> f64 {
    path.windows(2)
        .map(|pair| weights.edge_cost(grid, pair[0].position(), &pair[1]))
        .sum()
}

fn endpoint_cell(grid: &GridMap, point: LonLat, endpoint: Endpoint) -> Result<&GridCell> {
    let (x, y) = grid.snap(point).ok_or_else(|| Error::InvalidEndpoint {
        endpoint,
        reason: format!("({}, {}) cannot be placed on the grid", point.lon, point.lat),
    })?;
    let cell = grid.cell(x, y).ok_or_else(|| Error::InvalidEndpoint {
        endpoint,
        reason: format!("cell ({x}, {y}) is outside the grid"),
    })?;
    if cell.blocked {
        return Err(Error::InvalidEndpoint {
            endpoint,
            reason: format!("cell ({x}, {y}) is inside a building"),
        });
    }
    Ok(cell)
}

fn reconstruct_path(
    grid: &GridMap,
    parents: &HashMap<(usize, usize), Option<(usize, usize)>>,
    start: (usize, usize),
    goal: (usize, usize),
) -> Vec<GridCell> {
    let mut path = Vec::new();
    let mut current = Some(goal);
    while let Some(node) = current {
        if let Some(cell) = grid.cell(node.0, node.1) {
            path.push(*cell);
        }
        if node == start {
            break;
        }
        current = parents.get(&node).copied().flatten();
    }
    path.reverse();
    path
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    node: (usize, usize),
    cost: FloatOrd,
    sequence: u64,
}

impl QueueEntry {
    fn new(node: (usize, usize), cost: f64, sequence: u64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
            sequence,
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by cost, then by
        // discovery order.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
