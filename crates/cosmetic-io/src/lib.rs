//! # cosmetic-io
//!
//! Frame codecs for the cosmetic correction pipeline.
//!
//! Batch processing never touches file bytes itself; it goes through the
//! codec traits defined here:
//!
//! - [`ImageCodec`] - Opens files for reading, creates files for writing
//! - [`FrameReader`] - Lists sub-images, reads pixels, keywords, ICC profile
//! - [`FrameWriter`] - Writes one image with options, keywords and profile
//!
//! # Codecs
//!
//! | Codec | Read | Write | Notes |
//! |-------|------|-------|-------|
//! | [`TiffCodec`] | Yes | Yes | Multi-page read, 8/16/32-bit, keywords in `ImageDescription` |
//! | [`MemoryCodec`] | Yes | Yes | Shared in-process store, failure injection |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cosmetic_io::codec_for_path;
//! use std::path::Path;
//!
//! let path = Path::new("dark_master.tif");
//! let codec = codec_for_path(path)?;
//! let mut reader = codec.open(path)?;
//! reader.select(0)?;
//! let dark = reader.read()?;
//! let keywords = reader.read_keywords()?;
//! # Ok::<(), cosmetic_io::IoError>(())
//! ```
//!
//! # Feature Flags
//!
//! - `tiff` - TIFF support (default)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod detect;
pub mod memory;
pub mod metadata;
pub mod traits;

#[cfg(feature = "tiff")]
pub mod tiff;

pub use detect::{Format, codec_for_path};
pub use error::{IoError, IoResult};
pub use memory::{MemoryCodec, MemoryPage};
pub use metadata::{IccProfile, ImageOptions, Keyword, SubImageDescriptor};
pub use traits::{FrameReader, FrameWriter, ImageCodec};

#[cfg(feature = "tiff")]
pub use crate::tiff::TiffCodec;
