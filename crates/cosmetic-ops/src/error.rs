//! Error types for detection and correction.

use thiserror::Error;

/// Error type for detection and correction operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// Invalid dimensions specified.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Images or maps have incompatible sizes.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Stopped at a cancellation check.
    #[error("operation aborted")]
    Aborted,

    /// Buffer construction failed.
    #[error(transparent)]
    Core(#[from] cosmetic_core::Error),
}

/// Result type for detection and correction operations.
pub type OpsResult<T> = Result<T, OpsError>;
