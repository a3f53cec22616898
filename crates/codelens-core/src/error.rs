//! Core error types for Codelens.

use codelens_indexer::IndexerError;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Indexing, query or snapshot failure
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pipeline was stopped and accepts no more work
    #[error("Pipeline stopped")]
    PipelineStopped,

    /// Lookup of an unknown file or report target
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_yaml::Error> for CoreError {
    fn from(e: serde_yaml::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<codelens_analytics::AnalyticsError> for CoreError {
    fn from(e: codelens_analytics::AnalyticsError) -> Self {
        match e {
            codelens_analytics::AnalyticsError::UnknownFile(path) => CoreError::NotFound(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexer_error_is_transparent() {
        let err: CoreError = IndexerError::QueryNotFound("daily".to_string()).into();
        assert_eq!(err.to_string(), "Saved query not found: daily");
    }

    #[test]
    fn test_unknown_file_maps_to_not_found() {
        let err: CoreError = codelens_analytics::AnalyticsError::UnknownFile("a.rs".into()).into();
        assert!(matches!(err, CoreError::NotFound(path) if path == "a.rs"));
    }
}
