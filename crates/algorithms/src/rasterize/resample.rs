//! Resampling pre-existing rasters onto the grid
//!
//! Each in-mask grid cell centre is carried into the source raster's CRS
//! and sampled there. Cells that fall outside the source, or outside the
//! mask, become no-data.

use wildpath_core::crs::CoordinateTransform;
use wildpath_core::raster::{Raster, RasterElement};
use wildpath_core::{Error, Grid, Result};

use crate::maybe_rayon::*;

/// Nearest-neighbour resampling. Suitable for categorical rasters.
pub fn resample_to_grid<T: RasterElement>(
    source: &Raster<T>,
    grid: &Grid,
    dataset: &str,
) -> Result<Raster<T>> {
    let transform = source_transform(source, grid, dataset)?;
    let (rows, cols) = grid.shape();

    let data: Vec<T> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![T::default_nodata(); cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                if !grid.in_mask(row, col) {
                    continue;
                }
                let (x, y) = grid.cell_center(row, col);
                let (sx, sy) = transform.apply(x, y);
                if let Some(v) = nearest(source, sx, sy) {
                    *cell = v;
                }
            }
            row_data
        })
        .collect();

    grid.raster_from_vec(data)
}

/// Bilinear resampling for continuous rasters.
///
/// Where one of the four surrounding source cells is no-data or outside
/// the source, the nearest source cell is used instead.
pub fn resample_bilinear(source: &Raster<f64>, grid: &Grid, dataset: &str) -> Result<Raster<f64>> {
    let transform = source_transform(source, grid, dataset)?;
    let (rows, cols) = grid.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                if !grid.in_mask(row, col) {
                    continue;
                }
                let (x, y) = grid.cell_center(row, col);
                let (sx, sy) = transform.apply(x, y);
                if let Some(v) = bilinear(source, sx, sy).or_else(|| nearest(source, sx, sy)) {
                    *cell = v;
                }
            }
            row_data
        })
        .collect();

    grid.raster_from_vec(data)
}

/// Grid-to-source coordinate transform; fails fast on an unknown CRS.
fn source_transform<T: RasterElement>(
    source: &Raster<T>,
    grid: &Grid,
    dataset: &str,
) -> Result<CoordinateTransform> {
    let crs = source
        .crs()
        .filter(|c| !c.is_unknown())
        .ok_or_else(|| Error::UnknownSpatialReference {
            dataset: dataset.to_string(),
        })?;
    let transform = CoordinateTransform::new(grid.crs(), crs)?;
    tracing::debug!(
        dataset,
        source_crs = %crs,
        reproject = !transform.is_identity(),
        source_cell = source.cell_size(),
        grid_cell = grid.cell_size(),
        "resampling onto grid"
    );
    Ok(transform)
}

fn nearest<T: RasterElement>(source: &Raster<T>, x: f64, y: f64) -> Option<T> {
    let (row, col) = source.cell_at(x, y)?;
    source.valid_value(row, col)
}

fn bilinear(source: &Raster<f64>, x: f64, y: f64) -> Option<f64> {
    let (fc, fr) = source.geo_to_pixel(x, y);
    // Continuous index relative to cell centres.
    let (cx, cy) = (fc - 0.5, fr - 0.5);
    if !(cx.is_finite() && cy.is_finite()) || cx < 0.0 || cy < 0.0 {
        return None;
    }
    let (c0, r0) = (cx.floor() as usize, cy.floor() as usize);
    let (tx, ty) = (cx - c0 as f64, cy - r0 as f64);

    let v00 = source.valid_value(r0, c0)?;
    let v01 = source.valid_value(r0, c0 + 1)?;
    let v10 = source.valid_value(r0 + 1, c0)?;
    let v11 = source.valid_value(r0 + 1, c0 + 1)?;

    let top = v00 + (v01 - v00) * tx;
    let bottom = v10 + (v11 - v10) * tx;
    Some(top + (bottom - top) * ty)
}
