//! Error types for scheduler operations

use thiserror::Error;

/// A target selector that cannot be mapped onto the registry.
///
/// This is the only fatal resolution outcome. A selector that matches
/// registered targets which are then all removed by tag filtering is a
/// valid empty set, not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("selector '{selector}' matches no registered target")]
pub struct ResolutionError {
    pub selector: String,
}

impl ResolutionError {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Invalid chain transition: {current} -> {requested}")]
    InvalidTransition { current: String, requested: String },

    #[error("Invalid registry: {0}")]
    InvalidRegistry(String),

    #[error("Runner infrastructure failure: {0}")]
    Runner(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
