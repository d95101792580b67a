//! Codec traits.
//!
//! A codec opens multi-image files for reading and creates single-image
//! files for writing. Batch code talks to files only through these traits,
//! so any container format can be plugged in.
//!
//! # Example
//!
//! ```rust
//! use cosmetic_core::Image;
//! use cosmetic_io::{ImageCodec, ImageOptions, Keyword, MemoryCodec};
//! use std::path::Path;
//!
//! let codec = MemoryCodec::new();
//! let path = Path::new("/frames/light_001.tif");
//!
//! let mut writer = codec.create(path).unwrap();
//! writer.set_options(&ImageOptions::default()).unwrap();
//! writer.write_keywords(&[Keyword::new("EXPTIME", "30", "")]).unwrap();
//! writer.write_image(&Image::filled(8, 8, 1, 0.5).unwrap()).unwrap();
//! writer.close().unwrap();
//!
//! let mut reader = codec.open(path).unwrap();
//! assert_eq!(reader.images().len(), 1);
//! reader.select(0).unwrap();
//! assert_eq!(reader.read().unwrap().width(), 8);
//! assert_eq!(reader.read_keywords().unwrap().len(), 1);
//! ```

use crate::{IccProfile, ImageOptions, IoResult, Keyword, SubImageDescriptor};
use cosmetic_core::Image;
use std::path::Path;

/// Entry point of a file format.
pub trait ImageCodec: Send + Sync {
    /// Short format name for logs.
    fn name(&self) -> &str;

    /// Opens an existing file and lists its sub-images.
    fn open(&self, path: &Path) -> IoResult<Box<dyn FrameReader>>;

    /// Creates a new file for writing, replacing any existing one.
    fn create(&self, path: &Path) -> IoResult<Box<dyn FrameWriter>>;

    /// Returns `true` if `path` already holds a file.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Deletes a file, used to discard incomplete output.
    fn remove(&self, path: &Path) -> IoResult<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }
}

/// Read handle over an opened file.
///
/// All per-image accessors act on the image chosen with [`select`](Self::select).
pub trait FrameReader: Send {
    /// Sub-images in file order.
    fn images(&self) -> &[SubImageDescriptor];

    /// Selects the sub-image to read.
    fn select(&mut self, index: usize) -> IoResult<()>;

    /// Decodes the selected image into normalized samples.
    fn read(&mut self) -> IoResult<Image>;

    /// Header keywords of the selected image.
    fn read_keywords(&mut self) -> IoResult<Vec<Keyword>>;

    /// Embedded color profile of the selected image.
    fn read_icc_profile(&mut self) -> IoResult<Option<IccProfile>>;

    /// Opaque format-specific data for the selected image.
    fn format_specific_data(&mut self) -> IoResult<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Releases the file.
    fn close(self: Box<Self>) -> IoResult<()>;
}

/// Write handle over a created file.
///
/// Options, keywords and profile are set before [`write_image`](Self::write_image).
pub trait FrameWriter: Send {
    /// Storage options for the image to be written.
    fn set_options(&mut self, options: &ImageOptions) -> IoResult<()>;

    /// Opaque format-specific data obtained from a reader of the same format.
    fn set_format_specific_data(&mut self, _data: &[u8]) -> IoResult<()> {
        Ok(())
    }

    /// Header keywords for the image.
    fn write_keywords(&mut self, keywords: &[Keyword]) -> IoResult<()>;

    /// Color profile for the image.
    fn write_icc_profile(&mut self, profile: &IccProfile) -> IoResult<()>;

    /// Encodes the image.
    fn write_image(&mut self, image: &Image) -> IoResult<()>;

    /// Flushes and releases the file.
    fn close(self: Box<Self>) -> IoResult<()>;
}
