//! Error types for churnkit

use thiserror::Error;

/// Result type alias for churnkit operations
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Main error type
#[derive(Error, Debug)]
pub enum ChurnError {
    #[error("Unknown category for field '{field}': '{value}' (allowed: {})", .allowed.join(", "))]
    UnknownCategory {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Unknown code for field '{field}': {code}")]
    UnknownCode { field: String, code: usize },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field '{field}': '{value}', {reason}")]
    InvalidFieldValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Degenerate column '{column}': zero variance")]
    DegenerateColumn { column: String },

    #[error("{0} is not fitted")]
    NotFitted(String),

    #[error("Bundle not found at {path}: missing {artifact}")]
    BundleNotFound { path: String, artifact: String },

    #[error("Bundle version mismatch: {0}")]
    BundleVersionMismatch(String),

    #[error("Bundle artifact '{artifact}' is corrupted: {reason}")]
    BundleCorrupted { artifact: String, reason: String },

    #[error("Candidate '{model}' failed to fit: {reason}")]
    CandidateFit { model: String, reason: String },

    #[error("No candidate classifier could be fitted: {0}")]
    NoViableCandidate(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ChurnError {
    /// True for errors caused by a rejected input record rather than a broken model or bundle.
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            ChurnError::UnknownCategory { .. }
                | ChurnError::MissingField(_)
                | ChurnError::InvalidFieldValue { .. }
        )
    }
}

impl From<polars::error::PolarsError> for ChurnError {
    fn from(err: polars::error::PolarsError) -> Self {
        ChurnError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ChurnError {
    fn from(err: serde_json::Error) -> Self {
        ChurnError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ChurnError {
    fn from(err: bincode::Error) -> Self {
        ChurnError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ChurnError {
    fn from(err: ndarray::ShapeError) -> Self {
        ChurnError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
