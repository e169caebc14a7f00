//! Descriptive statistics for reporting
//!
//! - **zonal**: statistics of a value raster per zone or over the study area
//! - **summary**: total polygon area per class

pub mod summary;
pub mod zonal;

pub use summary::class_area_summary;
pub use zonal::{study_area_statistics, zonal_statistics, zonal_statistics_by_features, ZonalResult};
