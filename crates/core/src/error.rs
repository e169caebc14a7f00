//! Error types for wildpath

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wildpath operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("{dataset} has an unknown spatial reference")]
    UnknownSpatialReference { dataset: String },

    #[error("{dataset} does not conform to the grid: {reason}")]
    GridMismatch { dataset: String, reason: String },

    #[error("Cannot reproject from {from} to {to}")]
    UnsupportedReprojection { from: String, to: String },

    #[error("Regions {first} and {second} overlap at cell ({row}, {col})")]
    OverlappingRegions {
        first: i64,
        second: i64,
        row: usize,
        col: usize,
    },

    #[error("Class value {value} at cell ({row}, {col}) has no reclassification entry")]
    UnmappedClass { value: i64, row: usize, col: usize },

    #[error("Invalid attribute {field} on feature {feature}: {reason}")]
    InvalidAttribute {
        field: String,
        feature: usize,
        reason: String,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to release intermediate {}: {source}", path.display())]
    ResourceCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means the run was set up wrongly, as opposed to a
    /// failure while processing valid inputs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownSpatialReference { .. }
                | Error::GridMismatch { .. }
                | Error::UnsupportedReprojection { .. }
                | Error::OverlappingRegions { .. }
                | Error::InvalidParameter { .. }
        )
    }

    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for wildpath operations
pub type Result<T> = std::result::Result<T, Error>;
