//! Error types for the cultivar pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CultivarError>;

/// Main error type for the pipeline
///
/// Every variant carries enough context to identify the offending stage
/// and parameters, not just that "an error occurred".
#[derive(Error, Debug)]
pub enum CultivarError {
    /// Loaded table is missing expected columns or has wrong types. Fatal.
    #[error("Data schema error: {0}")]
    DataSchema(String),

    #[error("Data error: {0}")]
    Data(String),

    /// A class has too few samples for the requested split. Fatal.
    #[error("Partition error: {0}")]
    Partition(String),

    /// Every hyperparameter candidate failed within one fold-repeat.
    /// Fatal for that model family only.
    #[error("Fitting failure for {family}: all candidates failed in repeat {repeat}, fold {fold}")]
    FittingFailure {
        family: String,
        repeat: usize,
        fold: usize,
    },

    /// Tuning results being compared were produced under different
    /// resampling plans. Signals misuse at the comparison stage.
    #[error("Mismatched resampling plan: expected {expected}, got {actual}")]
    MismatchedResamplingPlan { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polars::error::PolarsError> for CultivarError {
    fn from(err: polars::error::PolarsError) -> Self {
        CultivarError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for CultivarError {
    fn from(err: serde_json::Error) -> Self {
        CultivarError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CultivarError::DataSchema("missing column 'area'".to_string());
        assert_eq!(err.to_string(), "Data schema error: missing column 'area'");
    }

    #[test]
    fn test_fitting_failure_names_stage() {
        let err = CultivarError::FittingFailure {
            family: "rbf_svm".to_string(),
            repeat: 2,
            fold: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("rbf_svm"));
        assert!(msg.contains("repeat 2"));
        assert!(msg.contains("fold 4"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CultivarError = io_err.into();
        assert!(matches!(err, CultivarError::Io(_)));
    }
}
