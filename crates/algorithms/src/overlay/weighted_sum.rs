//! Weighted-sum fusion
//!
//! ```text
//! cost(r, c) = w_1 * s_1(r, c) + w_2 * s_2(r, c) + ... + w_n * s_n(r, c)
//! ```
//!
//! Terms are added in criterion order starting from the first product, so
//! a run is bit-reproducible and a lone criterion of weight 1 comes back
//! unchanged.

use wildpath_core::raster::Raster;
use wildpath_core::{Algorithm, Error, Grid, Result};

use crate::maybe_rayon::*;

/// A named score raster and its weight.
#[derive(Debug, Clone)]
pub struct WeightedCriterion {
    pub name: String,
    pub score: Raster<f64>,
    pub weight: f64,
}

impl WeightedCriterion {
    /// Criterion with the default weight of 1.
    pub fn new(name: impl Into<String>, score: Raster<f64>) -> Self {
        Self {
            name: name.into(),
            score,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Weighted sum as an [`Algorithm`].
#[derive(Debug, Clone)]
pub struct WeightedSum {
    pub grid: Grid,
}

impl Algorithm for WeightedSum {
    type Input = Vec<WeightedCriterion>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "WeightedSum"
    }

    fn description(&self) -> &'static str {
        "Cell-wise weighted sum of score rasters"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        weighted_sum(&self.grid, &input)
    }
}

/// Fuse `criteria` into a cost raster on `grid`.
///
/// A cell is no-data when it is outside the mask or when any criterion is
/// no-data there.
///
/// # Errors
/// - `InvalidParameter` for an empty list or a negative or non-finite weight
/// - `GridMismatch`, named after the criterion, for a score raster that is
///   not on `grid`
pub fn weighted_sum(grid: &Grid, criteria: &[WeightedCriterion]) -> Result<Raster<f64>> {
    if criteria.is_empty() {
        return Err(Error::invalid_parameter(
            "criteria",
            0,
            "weighted sum needs at least one criterion",
        ));
    }
    for criterion in criteria {
        if !criterion.weight.is_finite() || criterion.weight < 0.0 {
            return Err(Error::invalid_parameter(
                "weight",
                format!("{} = {}", criterion.name, criterion.weight),
                "weights must be finite and non-negative",
            ));
        }
        grid.conforms(&criterion.score, &criterion.name)?;
    }

    tracing::debug!(
        criteria = criteria.len(),
        weights = ?criteria.iter().map(|c| c.weight).collect::<Vec<_>>(),
        "weighted sum"
    );

    let (rows, cols) = grid.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            'cells: for (col, cell) in row_data.iter_mut().enumerate() {
                if !grid.in_mask(row, col) {
                    continue;
                }
                let mut sum: Option<f64> = None;
                for criterion in criteria {
                    let v = unsafe { criterion.score.get_unchecked(row, col) };
                    if criterion.score.is_nodata(v) {
                        continue 'cells;
                    }
                    let term = criterion.weight * v;
                    sum = Some(sum.map_or(term, |s| s + term));
                }
                if let Some(total) = sum {
                    *cell = total;
                }
            }
            row_data
        })
        .collect();

    grid.raster_from_vec(data)
}
