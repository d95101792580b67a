//! Error types for I/O operations.
//!
//! Every codec reports failures through [`IoError`]. Callers that schedule
//! batches treat these as per-file problems, never as run-wide ones.

use std::io;
use thiserror::Error;

/// I/O operation error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid or corrupted file.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// File opened but holds no images.
    #[error("empty file: {0}")]
    EmptyFile(String),

    /// Sub-image index out of range.
    #[error("no such image: index {index}, file has {count}")]
    NoSuchImage {
        /// Requested index.
        index: usize,
        /// Number of images in the file.
        count: usize,
    },

    /// Decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Handle used after close, or in the wrong order.
    #[error("handle closed: {0}")]
    Closed(String),

    /// Buffer could not be built from decoded samples.
    #[error(transparent)]
    Core(#[from] cosmetic_core::Error),
}

/// Result type for I/O operations.
pub type IoResult<T> = Result<T, IoError>;

#[cfg(feature = "tiff")]
impl From<tiff::TiffError> for IoError {
    fn from(e: tiff::TiffError) -> Self {
        match e {
            tiff::TiffError::IoError(e) => IoError::Io(e),
            other => IoError::DecodeError(other.to_string()),
        }
    }
}
