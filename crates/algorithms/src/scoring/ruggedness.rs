//! Terrain ruggedness as focal elevation range
//!
//! Ruggedness at a cell is `max - min` of the elevations in a square window
//! centred on it. Only window cells that are inside the grid mask and hold
//! valid elevation take part, so the window shrinks at the raster edge and
//! along the study-area boundary.

use serde::{Deserialize, Serialize};
use wildpath_core::raster::{Raster, Window};
use wildpath_core::{Algorithm, Error, Grid, Result};

use super::rescale::{rescale, RescaleFunction};
use crate::maybe_rayon::*;

/// Parameters for ruggedness scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuggednessParams {
    /// Window side in cells (odd, at least 3)
    pub window_size: usize,
    /// Mapping from elevation range to score
    pub rescale: RescaleFunction,
}

impl Default for RuggednessParams {
    fn default() -> Self {
        Self {
            window_size: 3,
            rescale: RescaleFunction::default(),
        }
    }
}

/// Ruggedness scoring as an [`Algorithm`].
#[derive(Debug, Clone)]
pub struct Ruggedness {
    pub grid: Grid,
}

impl Algorithm for Ruggedness {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = RuggednessParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Ruggedness"
    }

    fn description(&self) -> &'static str {
        "Focal elevation range rescaled to a score"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        ruggedness(&input, &self.grid, &params)
    }
}

/// Focal range of `elevation` over a `window_size` square window.
///
/// # Errors
/// - `InvalidParameter` for an even or too small window
/// - `GridMismatch` when `elevation` is not on `grid`
pub fn terrain_ruggedness(
    elevation: &Raster<f64>,
    grid: &Grid,
    window_size: usize,
) -> Result<Raster<f64>> {
    let window = Window::square(window_size)?;
    grid.conforms(elevation, "elevation")?;

    let (rows, cols) = grid.shape();
    let r = window.radius() as isize;
    let offsets = window.offsets();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                if !grid.in_mask(row, col) {
                    continue;
                }
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if !grid.in_mask(nr, nc) {
                        continue;
                    }
                    let v = unsafe { elevation.get_unchecked(nr, nc) };
                    if elevation.is_nodata(v) {
                        continue;
                    }
                    min = min.min(v);
                    max = max.max(v);
                }
                if min <= max {
                    *cell = max - min;
                }
            }
            row_data
        })
        .collect();

    tracing::debug!(window = window.size(), radius = r, "focal range computed");
    grid.raster_from_vec(data)
}

/// Focal range followed by rescaling to the score range.
pub fn ruggedness(
    elevation: &Raster<f64>,
    grid: &Grid,
    params: &RuggednessParams,
) -> Result<Raster<f64>> {
    let range = terrain_ruggedness(elevation, grid, params.window_size)?;
    rescale(&range, &params.rescale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo_types::{polygon, MultiPolygon};
    use wildpath_core::grid::Extent;
    use wildpath_core::CRS;

    fn grid() -> Grid {
        Grid::new(
            CRS::from_epsg(26911),
            10.0,
            Extent::new(0.0, 0.0, 50.0, 50.0).unwrap(),
        )
        .unwrap()
    }

    /// Elevation rising 10 m per column
    fn slope(grid: &Grid) -> Raster<f64> {
        let mut dem = grid.raster_filled(0.0);
        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                dem.set(row, col, col as f64 * 10.0).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_focal_range_interior_and_edge() {
        let g = grid();
        let tr = terrain_ruggedness(&slope(&g), &g, 3).unwrap();
        assert_relative_eq!(tr.get(2, 2).unwrap(), 20.0);
        // West edge sees only columns 0 and 1.
        assert_relative_eq!(tr.get(2, 0).unwrap(), 10.0);
    }

    #[test]
    fn test_flat_terrain_has_zero_range() {
        let g = grid();
        let tr = terrain_ruggedness(&g.raster_filled(1200.0), &g, 5).unwrap();
        assert!(tr.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_nodata_neighbours_skipped() {
        let g = grid();
        let mut dem = slope(&g);
        dem.set(2, 3, f64::NAN).unwrap();
        dem.set(1, 3, f64::NAN).unwrap();
        dem.set(3, 3, f64::NAN).unwrap();
        let tr = terrain_ruggedness(&dem, &g, 3).unwrap();
        assert_relative_eq!(tr.get(2, 2).unwrap(), 10.0);
    }

    #[test]
    fn test_outside_mask_is_nodata() {
        let boundary = MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 50.0), (x: 0.0, y: 50.0),
        ]]);
        let g = Grid::with_boundary(CRS::from_epsg(26911), 10.0, boundary, None).unwrap();
        let mut dem = g.raster_filled(0.0);
        for row in 0..g.rows() {
            for col in 0..g.cols() {
                dem.set(row, col, col as f64 * 10.0).unwrap();
            }
        }
        let tr = terrain_ruggedness(&dem, &g, 3).unwrap();
        assert_eq!(tr.shape(), (5, 2));
        assert!(tr.data().iter().all(|&v| v == 10.0));
    }

    #[test]
    fn test_even_window_rejected() {
        let g = grid();
        let err = terrain_ruggedness(&slope(&g), &g, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "window_size", .. }));
    }

    #[test]
    fn test_off_grid_elevation_rejected() {
        let g = grid();
        let dem = Raster::filled(5, 5, 1.0);
        let err = terrain_ruggedness(&dem, &g, 3).unwrap_err();
        assert!(matches!(err, Error::GridMismatch { .. }));
    }

    #[test]
    fn test_scores_increase_with_range() {
        let g = grid();
        let mut dem = g.raster_filled(0.0);
        dem.set(0, 0, 100.0).unwrap();
        let scores = ruggedness(&dem, &g, &RuggednessParams::default()).unwrap();
        assert_relative_eq!(scores.get(0, 0).unwrap(), 10.0);
        assert_relative_eq!(scores.get(4, 4).unwrap(), 1.0);
    }
}
