//! Rescale-by-function onto a bounded score range
//!
//! The input is passed through a transform, then the lowest transformed
//! value is mapped to `from_scale` and the highest to `to_scale`, linearly
//! in between. Swapping the two bounds flips the direction of the score.
//!
//! Sigmoid transforms (after ArcGIS's TfLarge / TfSmall):
//! ```text
//! large(x) = 1 / (1 + (x / midpoint)^-spread)
//! small(x) = 1 / (1 + (x / midpoint)^spread)
//! ```

use serde::{Deserialize, Serialize};
use wildpath_core::raster::Raster;
use wildpath_core::{Error, Result};

use crate::maybe_rayon::*;

/// Spread used by the sigmoid transforms when none is given
pub const DEFAULT_SPREAD: f64 = 5.0;

/// Monotonic transform applied before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    Linear,
    /// Increasing sigmoid; large inputs approach 1.
    TfLarge {
        /// Defaults to the mean of the valid input cells
        #[serde(default)]
        midpoint: Option<f64>,
        #[serde(default = "default_spread")]
        spread: f64,
    },
    /// Decreasing sigmoid; small inputs approach 1.
    TfSmall {
        #[serde(default)]
        midpoint: Option<f64>,
        #[serde(default = "default_spread")]
        spread: f64,
    },
}

fn default_spread() -> f64 {
    DEFAULT_SPREAD
}

impl Transform {
    pub fn tf_large() -> Self {
        Transform::TfLarge {
            midpoint: None,
            spread: DEFAULT_SPREAD,
        }
    }

    pub fn tf_small() -> Self {
        Transform::TfSmall {
            midpoint: None,
            spread: DEFAULT_SPREAD,
        }
    }

    fn is_sigmoid(&self) -> bool {
        !matches!(self, Transform::Linear)
    }

    fn evaluate(&self, x: f64, mean: f64) -> f64 {
        match *self {
            Transform::Linear => x,
            Transform::TfLarge { midpoint, spread } => {
                1.0 / (1.0 + (x / midpoint.unwrap_or(mean)).powf(-spread))
            }
            Transform::TfSmall { midpoint, spread } => {
                1.0 / (1.0 + (x / midpoint.unwrap_or(mean)).powf(spread))
            }
        }
    }
}

/// A transform plus the score bounds it is stretched to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleFunction {
    pub transform: Transform,
    pub from_scale: f64,
    pub to_scale: f64,
}

impl RescaleFunction {
    pub fn new(transform: Transform, from_scale: f64, to_scale: f64) -> Self {
        Self {
            transform,
            from_scale,
            to_scale,
        }
    }

    /// Lower and upper bound regardless of direction
    pub fn bounds(&self) -> (f64, f64) {
        (
            self.from_scale.min(self.to_scale),
            self.from_scale.max(self.to_scale),
        )
    }

    fn validate(&self) -> Result<()> {
        if !self.from_scale.is_finite() || !self.to_scale.is_finite() {
            return Err(Error::invalid_parameter(
                "scale",
                format!("{} -> {}", self.from_scale, self.to_scale),
                "score bounds must be finite",
            ));
        }
        match self.transform {
            Transform::TfLarge { midpoint, spread } | Transform::TfSmall { midpoint, spread } => {
                if !spread.is_finite() || spread <= 0.0 {
                    return Err(Error::invalid_parameter("spread", spread, "must be positive"));
                }
                if let Some(m) = midpoint
                    && (!m.is_finite() || m <= 0.0)
                {
                    return Err(Error::invalid_parameter("midpoint", m, "must be positive"));
                }
                Ok(())
            }
            Transform::Linear => Ok(()),
        }
    }
}

impl Default for RescaleFunction {
    /// Increasing sigmoid from 1 to 10: low inputs score 1.
    fn default() -> Self {
        Self::new(Transform::tf_large(), 1.0, 10.0)
    }
}

/// Rescale the valid cells of `raster` with `function`.
///
/// Statistics (min, max, mean) are taken over valid cells only and
/// no-data stays no-data. A constant raster maps entirely to
/// `from_scale`.
///
/// # Errors
/// `InvalidParameter` for non-finite bounds, a non-positive spread or
/// midpoint, or negative input under a sigmoid transform.
pub fn rescale(raster: &Raster<f64>, function: &RescaleFunction) -> Result<Raster<f64>> {
    function.validate()?;

    let stats = raster.statistics();
    let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) else {
        tracing::debug!("rescale input has no valid cells");
        return Ok(raster.map_valid(|v| v));
    };

    if function.transform.is_sigmoid() && min < 0.0 {
        return Err(Error::invalid_parameter(
            "rescale input",
            min,
            "sigmoid transforms need non-negative values",
        ));
    }

    let from = function.from_scale;
    let to = function.to_scale;
    let (lo, hi) = function.bounds();

    // Both sigmoids and the linear transform are monotonic, so the
    // transformed extremes sit at the input extremes.
    let t_min = function.transform.evaluate(min, mean);
    let t_max = function.transform.evaluate(max, mean);
    let (t_low, t_high) = (t_min.min(t_max), t_min.max(t_max));
    let span = t_high - t_low;

    tracing::debug!(min, max, mean, t_low, t_high, from, to, "rescaling");

    let (rows, cols) = raster.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                let v = unsafe { raster.get_unchecked(row, col) };
                if raster.is_nodata(v) {
                    continue;
                }
                *cell = if span > 0.0 && span.is_finite() {
                    let t = function.transform.evaluate(v, mean);
                    (from + (t - t_low) / span * (to - from)).clamp(lo, hi)
                } else {
                    from
                };
            }
            row_data
        })
        .collect();

    let mut output = raster.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = ndarray::Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}
