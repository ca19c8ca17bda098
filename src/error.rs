//! Pipeline error taxonomy

use thiserror::Error;

/// Fatal pipeline errors. Non-convergence of the EM fit is deliberately not
/// represented here: it is reported through [`crate::models::FitSummary`] and
/// a warning log, and the partially-optimized model stays usable.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("data format error: {0}")]
    DataFormat(String),

    #[error("insufficient data: need at least {needed} rows, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("degenerate feature column '{column}': zero variance, standardization undefined")]
    DegenerateFeature { column: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model has not been fitted")]
    ModelNotFitted,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
