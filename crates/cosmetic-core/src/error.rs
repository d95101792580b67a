//! Buffer errors.

use thiserror::Error;

/// Result type for buffer construction and access.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or addressing [`Image`](crate::Image) and
/// [`DefectMask`](crate::DefectMask) buffers.
#[derive(Debug, Error)]
pub enum Error {
    /// A channel that the buffer does not have.
    #[error("channel {channel} out of range, image has {channels} channel(s)")]
    ChannelOutOfRange {
        /// Requested channel.
        channel: u32,
        /// Channels present.
        channels: u32,
    },

    /// Zero-sized buffer, or a sample count that disagrees with the
    /// declared geometry.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// What is wrong.
        reason: String,
    },
}

impl Error {
    /// Builds [`Error::InvalidDimensions`].
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }
}
