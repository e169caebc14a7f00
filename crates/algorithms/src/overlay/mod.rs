//! Combining score rasters into a single cost surface

pub mod weighted_sum;

pub use weighted_sum::{weighted_sum, WeightedCriterion, WeightedSum};
