//! Regular lattice over a bounding box and its shade-driven cost surface.
//!
//! A [`GridMap`] is built once per (bounding box, cell size) and scored in
//! place for a given hour and building set by a [`GridScorer`]. Scoring runs on
//! a bounded rayon pool and returns only once every cell has a cost, so a grid
//! handed to the path search is never partially scored.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::building::Building;
use crate::cache::{BoundedCache, CacheStats, Sweep};
use crate::error::{Error, Result, ScoringFault};
use crate::geo::{BoundingBox, LonLat, METERS_PER_DEGREE};
use crate::shade::{AmbientShade, ShadeEstimator, TimeOfDay};

/// Cost applied to a cell whose scoring failed.
pub const NEUTRAL_COST: f64 = 0.5;

/// Grids larger than this are refused rather than allocated.
pub const MAX_GRID_CELLS: usize = 4_000_000;

/// Absorbs floating-point error when an extent is an exact multiple of the
/// cell size.
const DIMENSION_EPSILON: f64 = 1e-9;

const NEIGHBOUR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// One lattice cell. Identity is its `(x, y)` position; cost may be rescored.
#[derive(Debug, Clone, Copy)]
pub struct GridCell {
    pub x: usize,
    pub y: usize,
    pub lon: f64,
    pub lat: f64,
    /// Traversal cost in `[0, +inf)`; lower means more shade.
    pub cost: f64,
    pub blocked: bool,
}

impl GridCell {
    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    pub fn coord(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }
}

impl PartialEq for GridCell {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for GridCell {}

impl Hash for GridCell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.position().hash(state);
    }
}

/// Dense row-major lattice of [`GridCell`]s.
#[derive(Debug, Clone)]
pub struct GridMap {
    bounds: BoundingBox,
    cell_size: f64,
    width: usize,
    height: usize,
    cells: Vec<GridCell>,
}

impl GridMap {
    /// Rasterize `bounds` into cells of `cell_size` degrees.
    ///
    /// Width is `floor((east - west) / cell_size) + 1` and height likewise, so
    /// even a degenerate box yields a single cell.
    pub fn build(bounds: BoundingBox, cell_size: f64) -> Result<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(Error::InvalidCellSize { value: cell_size });
        }
        bounds.validate()?;

        let width = dimension(bounds.width_degrees(), cell_size);
        let height = dimension(bounds.height_degrees(), cell_size);
        let total = width
            .checked_mul(height)
            .filter(|total| *total <= MAX_GRID_CELLS)
            .ok_or_else(|| Error::InvalidBoundingBox {
                reason: format!(
                    "a {width}x{height} grid exceeds the {MAX_GRID_CELLS} cell limit"
                ),
            })?;

        let mut cells = Vec::with_capacity(total);
        for y in 0..height {
            for x in 0..width {
                cells.push(GridCell {
                    x,
                    y,
                    lon: bounds.west + x as f64 * cell_size,
                    lat: bounds.south + y as f64 * cell_size,
                    cost: 1.0,
                    blocked: false,
                });
            }
        }

        debug!(width, height, cell_size, "grid built");
        Ok(Self {
            bounds,
            cell_size,
            width,
            height,
            cells,
        })
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&GridCell> {
        if x < self.width && y < self.height {
            self.cells.get(y * self.width + x)
        } else {
            None
        }
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut GridCell> {
        if x < self.width && y < self.height {
            self.cells.get_mut(y * self.width + x)
        } else {
            None
        }
    }

    pub fn cell_to_coord(&self, x: usize, y: usize) -> LonLat {
        LonLat::new(
            self.bounds.west + x as f64 * self.cell_size,
            self.bounds.south + y as f64 * self.cell_size,
        )
    }

    /// Nearest cell to `point`, clamped onto the grid. `None` only for
    /// non-finite coordinates.
    pub fn snap(&self, point: LonLat) -> Option<(usize, usize)> {
        if !point.lon.is_finite() || !point.lat.is_finite() {
            return None;
        }
        let x = clamp_index((point.lon - self.bounds.west) / self.cell_size, self.width);
        let y = clamp_index((point.lat - self.bounds.south) / self.cell_size, self.height);
        Some((x, y))
    }

    /// Unblocked cells among the eight around `(x, y)`.
    pub fn neighbours(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        NEIGHBOUR_OFFSETS.iter().filter_map(move |&(dx, dy)| {
            let nx = x.checked_add_signed(dx)?;
            let ny = y.checked_add_signed(dy)?;
            let cell = self.cell(nx, ny)?;
            (!cell.blocked).then_some((nx, ny))
        })
    }

    /// Metres between two adjacent cells.
    pub fn metric_distance(&self, a: (usize, usize), b: (usize, usize)) -> f64 {
        let step = self.cell_size * METERS_PER_DEGREE;
        if a.0 != b.0 && a.1 != b.1 {
            std::f64::consts::SQRT_2 * step
        } else {
            step
        }
    }

    pub fn blocked_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.blocked).count()
    }
}

fn dimension(extent: f64, cell_size: f64) -> usize {
    (extent / cell_size + DIMENSION_EPSILON).floor() as usize + 1
}

fn clamp_index(raw: f64, len: usize) -> usize {
    raw.round().clamp(0.0, (len - 1) as f64) as usize
}

/// Outcome of scoring a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellScore {
    Blocked,
    Open { cost: f64 },
}

/// Counters from one scoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub cells: usize,
    pub blocked: usize,
    /// Cells that fell back to [`NEUTRAL_COST`].
    pub faults: usize,
}

impl ScoreReport {
    fn merge(self, other: Self) -> Self {
        Self {
            cells: self.cells + other.cells,
            blocked: self.blocked + other.blocked,
            faults: self.faults + other.faults,
        }
    }
}

/// Everything a scoring pass needs besides the grid itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub buildings: &'a [Building],
    pub time: TimeOfDay,
    pub estimator: &'a ShadeEstimator,
    pub ambient: &'a AmbientShade,
}

/// Compute the cost of the cell at `cell`'s coordinates.
pub fn score_cell(
    cell: &GridCell,
    ctx: &ScoringContext<'_>,
) -> std::result::Result<CellScore, ScoringFault> {
    let point = cell.coord();
    if ctx.estimator.is_occupied(point, ctx.buildings) {
        return Ok(CellScore::Blocked);
    }

    let shade = ctx.estimator.shade_factor(point, ctx.time, ctx.buildings);
    if !shade.is_finite() {
        return Err(ScoringFault::NonFiniteShade {
            x: cell.x,
            y: cell.y,
        });
    }
    let ambient = ctx.ambient.at(point, ctx.time);
    if !ambient.is_finite() {
        return Err(ScoringFault::NonFiniteAmbient {
            x: cell.x,
            y: cell.y,
        });
    }

    Ok(CellScore::Open {
        cost: 1.0 - (shade + ambient).min(1.0),
    })
}

/// Scores grids on a dedicated, bounded worker pool.
pub struct GridScorer {
    pool: ThreadPool,
    batch_size: usize,
}

impl std::fmt::Debug for GridScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridScorer")
            .field("workers", &self.pool.current_num_threads())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl GridScorer {
    pub fn new(max_workers: usize, batch_size: usize) -> Result<Self> {
        if max_workers == 0 || batch_size == 0 {
            return Err(Error::InvalidConfig {
                message: format!(
                    "scorer needs at least one worker and a positive batch size \
                     (got {max_workers} workers, batch {batch_size})"
                ),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|index| format!("shadeway-score-{index}"))
            .build()
            .map_err(|err| Error::WorkerPool {
                message: err.to_string(),
            })?;
        Ok(Self { pool, batch_size })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Score every cell of `grid` in place, returning once all batches finish.
    pub fn score(&self, grid: &mut GridMap, ctx: &ScoringContext<'_>) -> ScoreReport {
        let started = Instant::now();
        let batch_size = self.batch_size;
        let report = self.pool.install(|| {
            grid.cells
                .par_chunks_mut(batch_size)
                .map(|batch| score_batch(batch, ctx))
                .reduce(ScoreReport::default, ScoreReport::merge)
        });

        if report.faults > 0 {
            warn!(faults = report.faults, "neutral cost applied to faulted cells");
        }
        debug!(
            cells = report.cells,
            blocked = report.blocked,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "grid scored"
        );
        report
    }
}

fn score_batch(batch: &mut [GridCell], ctx: &ScoringContext<'_>) -> ScoreReport {
    let mut report = ScoreReport::default();
    for cell in batch {
        report.cells += 1;
        match score_cell(cell, ctx) {
            Ok(CellScore::Blocked) => {
                cell.cost = f64::INFINITY;
                cell.blocked = true;
                report.blocked += 1;
            }
            Ok(CellScore::Open { cost }) => {
                cell.cost = cost;
                cell.blocked = false;
            }
            Err(fault) => {
                debug!(%fault, "cell scoring fault");
                cell.cost = NEUTRAL_COST;
                cell.blocked = false;
                report.faults += 1;
            }
        }
    }
    report
}

/// Cache key for a grid: bounding box and cell size at micro-degree precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    south: i64,
    west: i64,
    north: i64,
    east: i64,
    cell: i64,
}

impl GridKey {
    pub fn new(bounds: &BoundingBox, cell_size: f64) -> Self {
        let q = |value: f64| (value * 1e6).round() as i64;
        Self {
            south: q(bounds.south),
            west: q(bounds.west),
            north: q(bounds.north),
            east: q(bounds.east),
            // Cell sizes are small; keep more precision.
            cell: (cell_size * 1e9).round() as i64,
        }
    }
}

/// What a grid slot was last scored for. Only the hour feeds the shade model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreStamp {
    pub hour: u32,
    pub buildings: String,
}

/// A cached grid and the inputs of its most recent scoring pass.
#[derive(Debug)]
pub struct GridSlot {
    grid: GridMap,
    scored_for: Option<ScoreStamp>,
}

impl GridSlot {
    pub fn new(grid: GridMap) -> Self {
        Self {
            grid,
            scored_for: None,
        }
    }

    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    pub fn scored_for(&self) -> Option<&ScoreStamp> {
        self.scored_for.as_ref()
    }

    /// Re-score the grid with `score` unless it was already scored for
    /// `stamp`. Returns whether a scoring pass ran.
    pub fn ensure_scored(&mut self, stamp: ScoreStamp, score: impl FnOnce(&mut GridMap)) -> bool {
        if self.scored_for.as_ref() == Some(&stamp) {
            return false;
        }
        score(&mut self.grid);
        self.scored_for = Some(stamp);
        true
    }
}

/// Shared handle to a cached grid. Hold the lock across scoring and search.
pub type SharedGrid = Arc<Mutex<GridSlot>>;

/// Lock a shared grid, recovering from poisoning.
pub fn lock_grid(slot: &SharedGrid) -> MutexGuard<'_, GridSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded cache of built grids keyed by (bounding box, cell size).
pub struct GridStore {
    cache: Arc<BoundedCache<GridKey, SharedGrid>>,
}

impl GridStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Arc::new(BoundedCache::new("grids", capacity, ttl)),
        }
    }

    /// Return the cached grid for this key, building it if absent. The flag is
    /// `true` when an existing grid was reused.
    pub fn checkout(&self, bounds: BoundingBox, cell_size: f64) -> Result<(SharedGrid, bool)> {
        let key = GridKey::new(&bounds, cell_size);
        if let Some(slot) = self.cache.get(&key) {
            return Ok((slot, true));
        }
        let slot = Arc::new(Mutex::new(GridSlot::new(GridMap::build(bounds, cell_size)?)));
        self.cache.put(key, Arc::clone(&slot));
        Ok((slot, false))
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn sweep_target(&self) -> Arc<dyn Sweep> {
        self.cache.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(south: f64, west: f64, north: f64, east: f64) -> BoundingBox {
        BoundingBox::new(south, west, north, east).unwrap()
    }

    fn noon() -> TimeOfDay {
        TimeOfDay::parse("12:00").unwrap()
    }

    #[test]
    fn dimensions_follow_floor_plus_one() {
        let grid = GridMap::build(bbox(35.0, 139.0, 35.0012, 139.0009), 0.0003).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 5);
        assert_eq!(grid.cells().len(), 20);

        let grid = GridMap::build(bbox(35.0, 139.0, 35.0010, 139.0010), 0.0003).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 4);
    }

    #[test]
    fn degenerate_box_has_one_cell() {
        let grid = GridMap::build(bbox(35.0, 139.0, 35.0, 139.0), 0.0003).unwrap();
        assert_eq!((grid.width(), grid.height()), (1, 1));
    }

    #[test]
    fn rejects_bad_cell_sizes() {
        let bounds = bbox(35.0, 139.0, 35.001, 139.001);
        for size in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                GridMap::build(bounds, size),
                Err(Error::InvalidCellSize { .. })
            ));
        }
    }

    #[test]
    fn rejects_oversized_grids() {
        let err = GridMap::build(bbox(0.0, 0.0, 10.0, 10.0), 0.0001).unwrap_err();
        assert!(matches!(err, Error::InvalidBoundingBox { .. }));
    }

    #[test]
    fn snapping_rounds_and_clamps() {
        let grid = GridMap::build(bbox(35.0, 139.0, 35.003, 139.003), 0.001).unwrap();
        assert_eq!(grid.snap(LonLat::new(139.0014, 35.0016)), Some((1, 2)));
        assert_eq!(grid.snap(LonLat::new(138.0, 36.0)), Some((0, 3)));
        assert_eq!(grid.snap(LonLat::new(140.0, 34.0)), Some((3, 0)));
        assert_eq!(grid.snap(LonLat::new(f64::NAN, 35.0)), None);
    }

    #[test]
    fn snapped_cells_lie_within_one_cell_of_the_query() {
        let cell_size = 0.0003;
        let grid = GridMap::build(bbox(35.68, 139.69, 35.69, 139.70), cell_size).unwrap();
        for i in 0..40 {
            let point = LonLat::new(139.69 + i as f64 * 0.00025, 35.68 + i as f64 * 0.00021);
            let (x, y) = grid.snap(point).unwrap();
            let coord = grid.cell_to_coord(x, y);
            assert!((coord.lon - point.lon).abs() <= cell_size);
            assert!((coord.lat - point.lat).abs() <= cell_size);
        }
    }

    #[test]
    fn neighbours_skip_edges_and_blocked_cells() {
        let mut grid = GridMap::build(bbox(0.0, 0.0, 0.002, 0.002), 0.001).unwrap();
        assert_eq!(grid.neighbours(0, 0).count(), 3);
        assert_eq!(grid.neighbours(1, 1).count(), 8);

        grid.cell_mut(2, 2).unwrap().blocked = true;
        let around_centre: Vec<_> = grid.neighbours(1, 1).collect();
        assert_eq!(around_centre.len(), 7);
        assert!(!around_centre.contains(&(2, 2)));
    }

    #[test]
    fn metric_distance_distinguishes_diagonals() {
        let grid = GridMap::build(bbox(0.0, 0.0, 0.002, 0.002), 0.001).unwrap();
        assert!((grid.metric_distance((0, 0), (1, 0)) - 111.0).abs() < 1e-9);
        assert!((grid.metric_distance((0, 0), (1, 1)) - 111.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn cell_identity_ignores_cost() {
        let mut a = GridMap::build(bbox(0.0, 0.0, 0.001, 0.001), 0.001)
            .unwrap()
            .cells()[0];
        let b = a;
        a.cost = 0.1;
        assert_eq!(a, b);
    }

    #[test]
    fn scoring_blocks_occupied_cells_and_bounds_costs() {
        let bounds = bbox(35.0, 139.0, 35.003, 139.003);
        let mut grid = GridMap::build(bounds, 0.0003).unwrap();
        let building =
            Building::rectangle(bbox(35.0011, 139.0011, 35.0019, 139.0019), 30.0, None).unwrap();
        let buildings = vec![building];
        let estimator = ShadeEstimator::default();
        let ambient = AmbientShade::default();
        let ctx = ScoringContext {
            buildings: &buildings,
            time: noon(),
            estimator: &estimator,
            ambient: &ambient,
        };

        let scorer = GridScorer::new(2, 7).unwrap();
        let report = scorer.score(&mut grid, &ctx);

        assert_eq!(report.cells, grid.cells().len());
        assert_eq!(report.faults, 0);
        assert!(report.blocked > 0);
        assert_eq!(report.blocked, grid.blocked_count());
        for cell in grid.cells() {
            if cell.blocked {
                assert_eq!(cell.cost, f64::INFINITY);
                assert!(buildings[0].contains(cell.coord()));
            } else {
                assert!((0.0..=1.0).contains(&cell.cost), "cost {}", cell.cost);
            }
        }
    }

    #[test]
    fn scoring_at_night_gives_zero_cost() {
        let mut grid = GridMap::build(bbox(35.0, 139.0, 35.001, 139.001), 0.0003).unwrap();
        let estimator = ShadeEstimator::default();
        let ambient = AmbientShade::default();
        let ctx = ScoringContext {
            buildings: &[],
            time: TimeOfDay::parse("03:00").unwrap(),
            estimator: &estimator,
            ambient: &ambient,
        };
        GridScorer::new(1, 100).unwrap().score(&mut grid, &ctx);
        assert!(grid.cells().iter().all(|cell| cell.cost == 0.0));
    }

    #[test]
    fn faulted_cells_get_neutral_cost() {
        let mut grid = GridMap::build(bbox(35.0, 139.0, 35.001, 139.001), 0.0003).unwrap();
        let estimator = ShadeEstimator::default();
        let ambient = AmbientShade {
            base: f64::NAN,
            ..AmbientShade::default()
        };
        let ctx = ScoringContext {
            buildings: &[],
            time: noon(),
            estimator: &estimator,
            ambient: &ambient,
        };

        let cell = grid.cells()[0];
        assert_eq!(
            score_cell(&cell, &ctx),
            Err(ScoringFault::NonFiniteAmbient { x: 0, y: 0 })
        );

        let report = GridScorer::new(2, 3).unwrap().score(&mut grid, &ctx);
        assert_eq!(report.faults, grid.cells().len());
        assert!(grid.cells().iter().all(|cell| cell.cost == NEUTRAL_COST));
    }

    #[test]
    fn scorer_rejects_empty_pool() {
        assert!(GridScorer::new(0, 100).is_err());
        assert!(GridScorer::new(2, 0).is_err());
    }

    #[test]
    fn slot_rescores_only_when_inputs_change() {
        let grid = GridMap::build(bbox(35.0, 139.0, 35.001, 139.001), 0.0003).unwrap();
        let mut slot = GridSlot::new(grid);
        let stamp = ScoreStamp {
            hour: 12,
            buildings: "none".to_string(),
        };

        let mut passes = 0;
        assert!(slot.ensure_scored(stamp.clone(), |_| passes += 1));
        assert!(!slot.ensure_scored(stamp.clone(), |_| passes += 1));
        assert!(slot.ensure_scored(
            ScoreStamp {
                hour: 13,
                ..stamp
            },
            |_| passes += 1
        ));
        assert_eq!(passes, 2);
    }

    #[test]
    fn store_reuses_grids_by_key() {
        let store = GridStore::new(4, Duration::from_secs(60));
        let bounds = bbox(35.0, 139.0, 35.001, 139.001);

        let (first, reused) = store.checkout(bounds, 0.0003).unwrap();
        assert!(!reused);
        let (second, reused) = store.checkout(bounds, 0.0003).unwrap();
        assert!(reused);
        assert!(Arc::ptr_eq(&first, &second));

        let (_, reused) = store.checkout(bounds, 0.0002).unwrap();
        assert!(!reused);
        assert_eq!(store.stats().size, 2);
    }
}
