//! Turning grid-aligned inputs into score rasters
//!
//! Scores run from 1 (most desirable) to 10 by convention; no-data stays
//! NaN throughout.
//!
//! - **reclassify**: class code → score lookup
//! - **distance**: distance to source features, optionally rescaled
//! - **ruggedness**: focal elevation range, rescaled
//! - **rescale**: linear and sigmoid stretch onto a score range

pub mod distance;
pub mod reclassify;
pub mod rescale;
pub mod ruggedness;

pub use distance::{distance_accumulation, distance_and_rescale};
pub use reclassify::{reclassify, ReclassificationMap, Reclassify};
pub use rescale::{rescale, RescaleFunction, Transform};
pub use ruggedness::{ruggedness, terrain_ruggedness, Ruggedness, RuggednessParams};
