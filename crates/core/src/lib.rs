//! # wildpath core
//!
//! Core types, traits and I/O shared by every wildpath stage.
//!
//! This crate provides:
//! - `Raster<T>`: generic georeferenced raster
//! - `Grid`: the fixed CRS / cell size / extent / mask framing of a run
//! - `CRS`: coordinate reference systems and the small set of
//!   reprojections wildpath understands
//! - `FeatureCollection`: vector features with attributes
//! - I/O for GeoTIFF rasters, GeoJSON features and scratch intermediates

pub mod cancel;
pub mod crs;
pub mod error;
pub mod grid;
pub mod io;
pub mod raster;
pub mod vector;

pub use cancel::CancelToken;
pub use crs::CRS;
pub use error::{Error, Result};
pub use grid::{Extent, Grid};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::grid::{Extent, Grid};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
    pub use crate::Algorithm;
}

/// Core trait for the algorithms of a wildpath run.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
