//! Cost-distance analysis
//!
//! Computes the accumulated cost of travelling from source cells across a
//! cost surface using multi-source Dijkstra on a 4- or 8-connected grid.
//! Each reached cell also records a D8 backlink pointing one step back
//! towards its source, so least-cost paths can be traced afterwards.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::Array2;
use wildpath_core::raster::{d8, Connectivity, Raster};
use wildpath_core::{Algorithm, CancelToken, Error, Result};

/// Backlink code of a source cell
pub const SOURCE: u8 = 0;
/// Backlink code of a cell no source can reach
pub const UNREACHED: u8 = u8::MAX;

/// Heap pops between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Parameters for cost distance
#[derive(Debug, Clone, Default)]
pub struct CostDistanceParams {
    /// Source cell locations as (row, col) pairs
    pub sources: Vec<(usize, usize)>,
    pub connectivity: Connectivity,
}

/// Accumulated cost plus the backlinks that produced it.
#[derive(Debug, Clone)]
pub struct CostSurface {
    /// Least accumulated cost from any source; NaN where unreachable
    pub accumulated: Raster<f64>,
    /// D8 code towards the predecessor; [`SOURCE`] on sources,
    /// [`UNREACHED`] where no path exists
    pub backlink: Raster<u8>,
}

impl CostSurface {
    /// Accumulated cost at a cell, `None` when unreachable
    pub fn cost_at(&self, row: usize, col: usize) -> Option<f64> {
        self.accumulated.valid_value(row, col)
    }

    /// Cells from the source reached by `(row, col)` to `(row, col)`.
    ///
    /// Empty when the cell is unreachable.
    pub fn trace(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        let (rows, cols) = self.backlink.shape();
        let mut cells = Vec::new();
        let mut current = (row, col);
        // A path can never be longer than the number of cells.
        for _ in 0..rows * cols {
            let Ok(dir) = self.backlink.get(current.0, current.1) else {
                return Vec::new();
            };
            if dir == UNREACHED {
                return Vec::new();
            }
            cells.push(current);
            if dir == SOURCE {
                cells.reverse();
                return cells;
            }
            match d8::step(current.0, current.1, dir, rows, cols) {
                Some(next) => current = next,
                None => return Vec::new(),
            }
        }
        Vec::new()
    }
}

/// Cost distance as an [`Algorithm`].
#[derive(Debug, Clone, Default)]
pub struct CostDistance;

impl Algorithm for CostDistance {
    type Input = Raster<f64>;
    type Output = CostSurface;
    type Params = CostDistanceParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CostDistance"
    }

    fn description(&self) -> &'static str {
        "Accumulated least cost and backlinks from source cells"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        cost_distance(&input, &params.sources, params.connectivity)
    }
}

/// State in the priority queue (min-heap via reversed ordering).
#[derive(Debug, Clone, Copy, PartialEq)]
struct State {
    cost: f64,
    index: usize,
}

impl Eq for State {}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; row-major index breaks ties so runs
        // are deterministic.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Compute accumulated cost distance from source cells.
///
/// The cost of a step between two neighbours is the mean of their cost
/// values times the step length (1 or √2 cells) times the cell size.
/// NaN and negative cells are impassable; sources lying on them are
/// ignored.
///
/// # Errors
/// `InvalidParameter` when `sources` is empty or a source is off the raster.
pub fn cost_distance(
    cost: &Raster<f64>,
    sources: &[(usize, usize)],
    connectivity: Connectivity,
) -> Result<CostSurface> {
    accumulate(cost, sources, connectivity, &CancelToken::new())
}

/// [`cost_distance`] polling `cancel` between batches of heap pops.
pub(crate) fn accumulate(
    cost: &Raster<f64>,
    sources: &[(usize, usize)],
    connectivity: Connectivity,
    cancel: &CancelToken,
) -> Result<CostSurface> {
    let (rows, cols) = cost.shape();
    if sources.is_empty() {
        return Err(Error::invalid_parameter(
            "sources",
            0,
            "cost distance needs at least one source cell",
        ));
    }
    if let Some(&(r, c)) = sources.iter().find(|&&(r, c)| r >= rows || c >= cols) {
        return Err(Error::invalid_parameter(
            "sources",
            format!("({r}, {c})"),
            format!("source outside the {rows}x{cols} raster"),
        ));
    }

    let cell_size = cost.cell_size();
    let passable = |v: f64| !cost.is_nodata(v) && v >= 0.0;

    let mut dist = vec![f64::INFINITY; rows * cols];
    let mut backlink = vec![UNREACHED; rows * cols];
    let mut heap = BinaryHeap::new();

    for &(r, c) in sources {
        let v = unsafe { cost.get_unchecked(r, c) };
        if !passable(v) {
            continue;
        }
        let index = r * cols + c;
        dist[index] = 0.0;
        backlink[index] = SOURCE;
        heap.push(State { cost: 0.0, index });
    }

    let mut pops = 0usize;
    while let Some(State { cost: acc, index }) = heap.pop() {
        pops += 1;
        if pops % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }
        // Skip if we already found a better path
        if acc > dist[index] {
            continue;
        }

        let (row, col) = (index / cols, index % cols);
        let cost_here = unsafe { cost.get_unchecked(row, col) };

        for &dir in connectivity.directions() {
            let Some((nr, nc)) = d8::step(row, col, dir, rows, cols) else {
                continue;
            };
            let cost_neighbor = unsafe { cost.get_unchecked(nr, nc) };
            if !passable(cost_neighbor) {
                continue;
            }

            let step = (cost_here + cost_neighbor) / 2.0 * d8::DISTANCES[dir as usize] * cell_size;
            let candidate = acc + step;
            let n_index = nr * cols + nc;
            if candidate < dist[n_index] {
                dist[n_index] = candidate;
                backlink[n_index] = d8::opposite(dir);
                heap.push(State {
                    cost: candidate,
                    index: n_index,
                });
            }
        }
    }
    cancel.check()?;

    for d in &mut dist {
        if d.is_infinite() {
            *d = f64::NAN;
        }
    }

    let mut accumulated = cost.with_same_meta::<f64>(rows, cols);
    accumulated.set_nodata(Some(f64::NAN));
    *accumulated.data_mut() =
        Array2::from_shape_vec((rows, cols), dist).map_err(|e| Error::Other(e.to_string()))?;

    let mut backlinks = cost.with_same_meta::<u8>(rows, cols);
    backlinks.set_nodata(Some(UNREACHED));
    *backlinks.data_mut() =
        Array2::from_shape_vec((rows, cols), backlink).map_err(|e| Error::Other(e.to_string()))?;

    Ok(CostSurface {
        accumulated,
        backlink: backlinks,
    })
}
