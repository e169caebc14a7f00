//! North-up affine transform between cell indices and map coordinates

use serde::{Deserialize, Serialize};

/// Affine georeferencing for north-up rasters.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative: row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Usually negative
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Square cells of `cell_size` anchored at the upper-left corner.
    pub fn north_up(origin_x: f64, origin_y: f64, cell_size: f64) -> Self {
        Self::new(origin_x, origin_y, cell_size, -cell_size)
    }

    /// Build from GeoTIFF ModelPixelScale `[sx, sy, sz]` and
    /// ModelTiepoint `[i, j, k, x, y, z]` tags.
    pub fn from_geotiff_tags(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return None;
        }
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        Some(Self::new(origin_x, origin_y, scale[0], -scale[1]))
    }

    /// Map coordinates of the centre of cell (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the upper-left corner of cell (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64, row as f64)
    }

    /// Map coordinates of a fractional cell position.
    pub fn fractional_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Fractional (col, row) of a map coordinate; use `.floor()` for indices.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.pixel_width == 0.0 || self.pixel_height == 0.0 {
            return (f64::NAN, f64::NAN);
        }
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// (row, col) of the cell containing `(x, y)` in a `rows × cols` raster.
    pub fn cell_at(&self, x: f64, y: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col.floor() as usize, row.floor() as usize);
        (row < rows && col < cols).then_some((row, col))
    }

    /// Cell size (square cells)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of a `width × height` raster
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, height);
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Same lattice up to `tolerance` (a fraction of a cell).
    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        let tol = tolerance * self.cell_size().max(f64::MIN_POSITIVE);
        (self.origin_x - other.origin_x).abs() <= tol
            && (self.origin_y - other.origin_y).abs() <= tol
            && (self.pixel_width - other.pixel_width).abs() <= tol
            && (self.pixel_height - other.pixel_height).abs() <= tol
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
