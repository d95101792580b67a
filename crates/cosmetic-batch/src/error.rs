//! Error types for batch runs.
//!
//! Only [`BatchError::Config`] and [`BatchError::Fatal`] ever leave
//! [`BatchRunner::run`](crate::BatchRunner::run). Item and task failures are
//! logged, reported as events and counted.

use cosmetic_io::IoError;
use cosmetic_ops::OpsError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while configuring or running a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Configuration rejected before the run starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Run-wide failure, such as an unusable calibration frame.
    #[error("fatal: {0}")]
    Fatal(String),

    /// A target could not be processed and is skipped.
    #[error("{path}: {reason}")]
    Item {
        /// Target path.
        path: PathBuf,
        /// Skip cause.
        reason: String,
    },

    /// Detection or correction failed for one sub-image.
    #[error("task failed: {0}")]
    Task(String),

    /// Codec error.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Processing error.
    #[error(transparent)]
    Ops(#[from] OpsError),

    /// YAML parse error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BatchError {
    /// Creates an item skip error.
    pub fn item(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Item {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error stops the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Fatal(_))
    }
}
