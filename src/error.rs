//! Error types for rust_stager

use thiserror::Error;

/// Main error type for stage-wise testing
#[derive(Error, Debug)]
pub enum StageRError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Unit '{unit_id}' has confirmation data but no screening p-value")]
    MissingUnit { unit_id: String },

    #[error("Invalid adjustment vector: {reason}")]
    InvalidAdjustment { reason: String },

    #[error("Invalid significance level {alpha}: must lie strictly between 0 and 1")]
    InvalidAlpha { alpha: f64 },

    #[error("Invalid p-value for '{id}': {value} is not in [0, 1]")]
    InvalidPValue { id: String, value: f64 },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for stage-wise testing operations
pub type Result<T> = std::result::Result<T, StageRError>;
