//! # wildpath algorithms
//!
//! Raster kernels behind a wildpath run, from heterogeneous inputs to
//! habitat corridors.
//!
//! ## Algorithm Categories
//!
//! - **rasterize**: polygons to categorical rasters, resampling onto the grid
//! - **scoring**: reclassification, distance, ruggedness and rescaling
//! - **overlay**: weighted-sum fusion into a cost surface
//! - **corridor**: cost distance, habitat regions, least-cost corridors
//! - **statistics**: zonal statistics and class area summaries
//!
//! Row-parallel kernels use rayon when the `parallel` feature is on (the
//! default) and run sequentially otherwise.

pub mod corridor;
pub(crate) mod maybe_rayon;
pub mod overlay;
pub mod rasterize;
pub mod scoring;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::corridor::{
        cost_distance, extract_corridors, Corridor, CorridorParams, CorridorSet, CostSurface,
        DisconnectedRegions, PruningPolicy, RegionSet,
    };
    pub use crate::overlay::{weighted_sum, WeightedCriterion};
    pub use crate::rasterize::{
        polygon_to_raster, resample_bilinear, resample_to_grid, PolygonAssignment,
    };
    pub use crate::scoring::{
        distance_accumulation, distance_and_rescale, reclassify, rescale, ruggedness,
        terrain_ruggedness, ReclassificationMap, RescaleFunction, RuggednessParams, Transform,
    };
    pub use crate::statistics::{
        class_area_summary, study_area_statistics, zonal_statistics,
        zonal_statistics_by_features, ZonalResult,
    };
    pub use wildpath_core::prelude::*;
}
