//! Run-level errors, one variant per stage

use thiserror::Error;
use wildpath_core::Error;

/// Failure of a wildpath run, tagged with the stage it came from.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(#[source] Error),

    #[error("Criterion '{name}' failed: {source}")]
    Criterion {
        name: String,
        #[source]
        source: Error,
    },

    #[error("Surface fusion failed: {0}")]
    Fusion(#[source] Error),

    #[error("Corridor extraction failed: {0}")]
    Corridor(#[source] Error),

    #[error("Writing outputs failed: {0}")]
    Output(#[source] Error),

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap a criterion failure; cancellation and configuration problems
    /// keep their own variants.
    pub fn criterion(name: &str, source: Error) -> Self {
        match source {
            Error::Cancelled => PipelineError::Cancelled,
            source => PipelineError::Criterion {
                name: name.to_string(),
                source,
            },
        }
    }

    pub fn fusion(source: Error) -> Self {
        Self::staged(source, PipelineError::Fusion)
    }

    pub fn corridor(source: Error) -> Self {
        Self::staged(source, PipelineError::Corridor)
    }

    pub fn output(source: Error) -> Self {
        Self::staged(source, PipelineError::Output)
    }

    fn staged(source: Error, stage: fn(Error) -> PipelineError) -> Self {
        if matches!(source, Error::Cancelled) {
            PipelineError::Cancelled
        } else if source.is_configuration() {
            PipelineError::Configuration(source)
        } else {
            stage(source)
        }
    }

    /// Whether rerunning with a corrected configuration could succeed
    pub fn is_configuration(&self) -> bool {
        match self {
            PipelineError::Configuration(_) => true,
            PipelineError::Criterion { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

impl From<Error> for PipelineError {
    fn from(source: Error) -> Self {
        match source {
            Error::Cancelled => PipelineError::Cancelled,
            source => PipelineError::Configuration(source),
        }
    }
}
