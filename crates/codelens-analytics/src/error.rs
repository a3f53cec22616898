//! Error types for the analytics engine.

use thiserror::Error;

/// Errors that can occur while querying analytics state.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("No analytics recorded for file: {0}")]
    UnknownFile(String),
}
