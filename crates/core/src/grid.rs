//! The fixed spatial framing shared by every raster of a run.
//!
//! A [`Grid`] is built once from a CRS, a cell size and a study-area boundary
//! (or an explicit extent) and then handed to every stage by reference.
//! It never changes afterwards.

use std::sync::Arc;

use geo::{BoundingRect, Intersects};
use geo_types::{MultiPolygon, Point, Rect};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};

/// Cell-fraction tolerance used when comparing raster lattices
const LATTICE_TOLERANCE: f64 = 1e-6;

/// Axis-aligned bounding rectangle in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let extent = Self { min_x, min_y, max_x, max_y };
        extent.validate()?;
        Ok(extent)
    }

    fn validate(&self) -> Result<()> {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.max_x <= self.min_x || self.max_y <= self.min_y {
            return Err(Error::invalid_parameter(
                "extent",
                format!("{self:?}"),
                "must be finite with max > min on both axes",
            ));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl From<Rect<f64>> for Extent {
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }
}

/// CRS, cell size, snapped extent and in-mask cells of a run.
///
/// Cloning is cheap: the mask is shared.
#[derive(Debug, Clone)]
pub struct Grid {
    crs: CRS,
    cell_size: f64,
    extent: Extent,
    transform: GeoTransform,
    rows: usize,
    cols: usize,
    boundary: Option<Arc<MultiPolygon<f64>>>,
    mask: Arc<Array2<bool>>,
}

impl Grid {
    /// Unmasked grid covering `extent`. Every cell is in the mask.
    pub fn new(crs: CRS, cell_size: f64, extent: Extent) -> Result<Self> {
        Self::build(crs, cell_size, extent, None)
    }

    /// Grid masked by a study-area boundary. The extent defaults to the
    /// boundary's bounding rectangle.
    pub fn with_boundary(
        crs: CRS,
        cell_size: f64,
        boundary: MultiPolygon<f64>,
        extent: Option<Extent>,
    ) -> Result<Self> {
        let extent = match extent {
            Some(extent) => extent,
            None => boundary
                .bounding_rect()
                .map(Extent::from)
                .ok_or_else(|| {
                    Error::invalid_parameter("boundary", "empty", "boundary has no geometry")
                })?,
        };
        Self::build(crs, cell_size, extent, Some(boundary))
    }

    /// Unmasked grid sharing a raster's lattice.
    pub fn from_raster<T: RasterElement>(raster: &Raster<T>, dataset: &str) -> Result<Self> {
        let crs = raster.crs().cloned().unwrap_or_default();
        let (min_x, min_y, max_x, max_y) = raster.bounds();
        let grid = Self::build(
            crs,
            raster.cell_size(),
            Extent::new(min_x, min_y, max_x, max_y)?,
            None,
        )?;
        grid.conforms(raster, dataset)?;
        Ok(grid)
    }

    fn build(
        crs: CRS,
        cell_size: f64,
        extent: Extent,
        boundary: Option<MultiPolygon<f64>>,
    ) -> Result<Self> {
        crs.require_known("grid")?;
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(Error::invalid_parameter(
                "cell_size",
                cell_size,
                "must be a positive finite distance",
            ));
        }
        extent.validate()?;

        // Snap from the upper-left corner to whole cells.
        let cols = snapped_cells(extent.width(), cell_size);
        let rows = snapped_cells(extent.height(), cell_size);
        let transform = GeoTransform::north_up(extent.min_x, extent.max_y, cell_size);
        let snapped = Extent {
            min_x: extent.min_x,
            min_y: extent.max_y - rows as f64 * cell_size,
            max_x: extent.min_x + cols as f64 * cell_size,
            max_y: extent.max_y,
        };

        let mask = match &boundary {
            None => Array2::from_elem((rows, cols), true),
            Some(polygons) => Array2::from_shape_fn((rows, cols), |(row, col)| {
                let (x, y) = transform.pixel_to_geo(col, row);
                polygons.intersects(&Point::new(x, y))
            }),
        };

        tracing::debug!(
            rows,
            cols,
            cell_size,
            crs = %crs,
            masked = boundary.is_some(),
            "grid established"
        );

        Ok(Self {
            crs,
            cell_size,
            extent: snapped,
            transform,
            rows,
            cols,
            boundary: boundary.map(Arc::new),
            mask: Arc::new(mask),
        })
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Extent after snapping to whole cells
    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn boundary(&self) -> Option<&MultiPolygon<f64>> {
        self.boundary.as_deref()
    }

    /// Per-cell mask, `true` where the cell centre lies in the boundary
    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn in_mask(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).copied().unwrap_or(false)
    }

    pub fn mask_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Map coordinates of a cell centre
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// (row, col) of the cell containing a map coordinate
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        self.transform.cell_at(x, y, self.rows, self.cols)
    }

    /// Linear unit of the grid CRS, used for reporting lengths
    pub fn linear_unit(&self) -> &'static str {
        self.crs.linear_unit()
    }

    /// Raster on this grid with every cell set to `value` and the type's
    /// default no-data registered.
    pub fn raster_filled<T: RasterElement>(&self, value: T) -> Raster<T> {
        let mut raster = Raster::filled(self.rows, self.cols, value);
        raster.set_transform(self.transform);
        raster.set_crs(Some(self.crs.clone()));
        raster.set_nodata(Some(T::default_nodata()));
        raster
    }

    /// All-no-data raster on this grid
    pub fn nodata_raster<T: RasterElement>(&self) -> Raster<T> {
        self.raster_filled(T::default_nodata())
    }

    /// Wrap a row-major buffer as a raster on this grid.
    pub fn raster_from_vec<T: RasterElement>(&self, data: Vec<T>) -> Result<Raster<T>> {
        let mut raster = Raster::from_vec(data, self.rows, self.cols)?;
        raster.set_transform(self.transform);
        raster.set_crs(Some(self.crs.clone()));
        raster.set_nodata(Some(T::default_nodata()));
        Ok(raster)
    }

    /// Fail with `GridMismatch` unless `raster` has this grid's shape,
    /// lattice and CRS.
    pub fn conforms<T: RasterElement>(&self, raster: &Raster<T>, dataset: &str) -> Result<()> {
        let mismatch = |reason: String| Error::GridMismatch {
            dataset: dataset.to_string(),
            reason,
        };

        if raster.shape() != self.shape() {
            let (rows, cols) = raster.shape();
            return Err(mismatch(format!(
                "shape {rows}x{cols} differs from grid {}x{}",
                self.rows, self.cols
            )));
        }
        if !self.transform.approx_eq(raster.transform(), LATTICE_TOLERANCE) {
            return Err(mismatch(format!(
                "geotransform {:?} differs from grid {:?}",
                raster.transform(),
                self.transform
            )));
        }
        match raster.crs() {
            Some(crs) if crs.is_equivalent(&self.crs) => Ok(()),
            Some(crs) => Err(mismatch(format!("CRS {crs} differs from grid CRS {}", self.crs))),
            None => Err(mismatch("raster has no CRS".to_string())),
        }
    }
}

fn snapped_cells(span: f64, cell_size: f64) -> usize {
    // Absorb floating-point noise so an exact multiple does not gain a cell.
    let n = (span / cell_size - 1e-9).ceil();
    (n as usize).max(1)
}
