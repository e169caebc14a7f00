//! Bringing heterogeneous criterion inputs onto the shared [`Grid`].
//!
//! - **polygon**: vector polygons with a class field → categorical raster
//! - **resample**: pre-existing rasters → nearest or bilinear resampling
//!
//! [`Grid`]: wildpath_core::Grid

mod index;
pub mod polygon;
pub mod resample;

pub(crate) use index::{polygon_parts, PolygonIndex};
pub use polygon::{polygon_to_raster, PolygonAssignment, PolygonToRaster};
pub use resample::{resample_bilinear, resample_to_grid};
