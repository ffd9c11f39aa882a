use std::path::PathBuf;

use thiserror::Error;

use crate::domain::TimestampError;
use crate::storage::StoreError;

/// Errors surfaced by tracker operations
///
/// Every variant renders as a single user-facing line.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Task '{0}' already exists")]
    AlreadyExists(String),

    #[error("Task '{0}' does not exist")]
    NotFound(String),

    #[error("Task '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Task '{0}' is not running")]
    NotActive(String),

    #[error("File '{}' already exists, the report was not overwritten", .0.display())]
    DestinationExists(PathBuf),

    #[error("Template file '{}' was not found", .0.display())]
    TemplateMissing(PathBuf),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("No sessions found")]
    NoMatchingSessions,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TimestampError> for TrackerError {
    fn from(err: TimestampError) -> Self {
        TrackerError::InvalidArgument(err.to_string())
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
