//! Reading and writing rasters, features and scratch intermediates

mod geojson;
mod geotiff;
mod scratch;

pub use self::geojson::{parse_geojson, read_geojson, to_geojson, write_geojson};
pub use self::geotiff::{read_geotiff, write_geotiff, write_geotiff_f64};
pub use self::scratch::ScratchSpace;
