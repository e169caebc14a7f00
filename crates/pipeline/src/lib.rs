//! # wildpath pipeline
//!
//! Runs a complete corridor analysis from one JSON configuration:
//!
//! 1. frame the [`Grid`](wildpath_core::Grid) from the study-area boundary
//! 2. score every criterion onto the grid (in parallel)
//! 3. fuse the scores into a cost raster by weighted sum
//! 4. extract least-cost corridors between habitat regions
//! 5. optionally summarise the study area
//!
//! ```no_run
//! use wildpath_pipeline::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_path("run.json")?;
//! let report = Pipeline::new(config).run()?;
//! print!("{report}");
//! # Ok::<(), wildpath_pipeline::PipelineError>(())
//! ```

pub mod config;
pub mod error;
pub mod report;
pub mod run;

pub use config::{
    ClassAreaConfig, CriterionConfig, CriterionPolicy, CriterionSource, GridConfig, PipelineConfig,
    RegionsConfig, StatisticsConfig,
};
pub use error::PipelineError;
pub use report::{format_number, RunOutputs, RunReport, SkippedCriterion, StatisticsReport};
pub use run::{build_grid, score_criterion, Pipeline};
