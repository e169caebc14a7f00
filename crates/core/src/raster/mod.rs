//! Raster data structures and cell-neighbourhood helpers

mod array;
mod element;
mod geotransform;
mod window;

pub use array::{Raster, RasterStatistics};
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use window::{d8, Connectivity, Window};
