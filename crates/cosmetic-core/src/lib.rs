//! # cosmetic-core
//!
//! Core types for defect (hot/cold pixel) correction of astronomical frames.
//!
//! This crate provides the foundational types used throughout the workspace:
//!
//! - [`Image`] - Planar `f32` sample buffer, one plane per channel
//! - [`DefectMask`] - Boolean map flagging defective pixel locations
//! - [`Rect`] - Frame geometry used to validate targets against a calibration frame
//! - [`Error`] - Buffer construction and access errors
//!
//! ## Sample Convention
//!
//! Samples are normalized to `[0, 1]`. Integer sources are divided by their
//! maximum code value on load (65535 for 16-bit data), so a 16-bit level `L`
//! maps to `L / 65535`.
//!
//! ## Crate Structure
//!
//! ```text
//! cosmetic-core (this crate)
//!    ^
//!    |
//!    +-- cosmetic-io (codecs)
//!    +-- cosmetic-ops (filters, statistics, maps, correction)
//!    +-- cosmetic-batch (scheduler)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod image;
pub mod mask;
pub mod rect;

pub use error::*;
pub use image::Image;
pub use mask::DefectMask;
pub use rect::Rect;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use cosmetic_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::image::Image;
    pub use crate::mask::DefectMask;
    pub use crate::rect::Rect;
}
