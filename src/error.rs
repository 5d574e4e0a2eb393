//! Error types for the clinpred framework

use thiserror::Error;

/// Result type alias for clinpred operations
pub type Result<T> = std::result::Result<T, ClinpredError>;

/// Main error type for the clinpred framework
#[derive(Error, Debug)]
pub enum ClinpredError {
    #[error("duplicate registration: {category}.{name}")]
    DuplicateRegistration {
        category: &'static str,
        name: String,
    },

    #[error("unknown component {category}.{name} at '{path}'")]
    UnknownComponent {
        category: &'static str,
        name: String,
        path: String,
    },

    #[error("config error at '{path}': {message}")]
    ConfigValidation { path: String, message: String },

    #[error("invalid search space: {0}")]
    InvalidSearchSpace(String),

    #[error("no search space found anywhere in the config tree")]
    NoSuggester,

    #[error("data error: {0}")]
    Data(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("study error: {0}")]
    Study(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ClinpredError {
    /// Error for a misconfigured node, carrying the dotted config path.
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        ClinpredError::ConfigValidation {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<polars::error::PolarsError> for ClinpredError {
    fn from(err: polars::error::PolarsError) -> Self {
        ClinpredError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ClinpredError {
    fn from(err: serde_json::Error) -> Self {
        ClinpredError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClinpredError::at("trainer.metric", "missing required parameter");
        assert_eq!(
            err.to_string(),
            "config error at 'trainer.metric': missing required parameter"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ClinpredError = io_err.into();
        assert!(matches!(err, ClinpredError::Io(_)));
    }
}
