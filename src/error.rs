// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Required column '{0}' not found")]
    MissingColumn(String),

    #[error("Row {row}: {reason}")]
    RowData { row: usize, reason: String },

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Row store error: {0}")]
    RowStore(String),

    #[error("Artifact error for {path}: {message}")]
    Artifact { path: PathBuf, message: String },

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Row-level errors never abort a batch.
    pub fn is_row_level(&self) -> bool {
        matches!(self, Self::RowData { .. } | Self::Transport(_))
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        Self::RowStore(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = PipelineError::not_found("Spreadsheet", "Guests 2026");
        assert_eq!(err.to_string(), "Spreadsheet 'Guests 2026' not found");
    }

    #[test]
    fn test_row_level_classification() {
        assert!(PipelineError::Transport("timeout".to_string()).is_row_level());
        assert!(
            PipelineError::RowData {
                row: 3,
                reason: "missing email".to_string()
            }
            .is_row_level()
        );
        assert!(!PipelineError::MissingColumn("email".to_string()).is_row_level());
        assert!(!PipelineError::RowStore("offline".to_string()).is_row_level());
    }
}
