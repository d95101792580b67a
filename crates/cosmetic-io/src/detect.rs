//! Frame format lookup.
//!
//! Existing files are identified by their leading bytes; paths that do not
//! exist yet (outputs) by extension.

use crate::traits::ImageCodec;
use crate::{IoError, IoResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Frame file formats known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Tagged Image File Format, classic or BigTIFF header.
    Tiff,
    /// Anything else.
    Unknown,
}

// (signature, format) pairs checked against the start of a file.
const SIGNATURES: &[(&[u8], Format)] = &[
    (b"II*\0", Format::Tiff),
    (b"MM\0*", Format::Tiff),
    (b"II+\0", Format::Tiff),
    (b"MM\0+", Format::Tiff),
];

const EXTENSIONS: &[(&str, Format)] = &[("tif", Format::Tiff), ("tiff", Format::Tiff)];

const PROBE_LEN: u64 = 8;

impl Format {
    /// Identifies `path` by content, then by extension.
    pub fn detect<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        match Self::sniff_file(path)? {
            Format::Unknown => Ok(Self::from_extension(path)),
            known => Ok(known),
        }
    }

    /// Format implied by the extension, case-insensitive.
    ///
    /// ```rust
    /// use cosmetic_io::Format;
    ///
    /// assert_eq!(Format::from_extension("m42_0001.TIFF"), Format::Tiff);
    /// assert_eq!(Format::from_extension("m42_0001.xisf"), Format::Unknown);
    /// ```
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        let Some(ext) = path.as_ref().extension().and_then(|e| e.to_str()) else {
            return Format::Unknown;
        };
        EXTENSIONS
            .iter()
            .find(|(known, _)| ext.eq_ignore_ascii_case(known))
            .map_or(Format::Unknown, |&(_, format)| format)
    }

    /// Reads the head of `path` and matches it against known signatures.
    pub fn sniff_file<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let mut head = Vec::with_capacity(PROBE_LEN as usize);
        File::open(path)?.take(PROBE_LEN).read_to_end(&mut head)?;
        Ok(Self::sniff(&head))
    }

    /// Matches `head` against known signatures.
    pub fn sniff(head: &[u8]) -> Self {
        SIGNATURES
            .iter()
            .find(|(magic, _)| head.starts_with(magic))
            .map_or(Format::Unknown, |&(_, format)| format)
    }

    /// Codec that reads and writes this format.
    pub fn codec(self) -> IoResult<Box<dyn ImageCodec>> {
        match self {
            #[cfg(feature = "tiff")]
            Format::Tiff => Ok(Box::new(crate::TiffCodec)),
            other => Err(IoError::UnsupportedFormat(format!("{:?}", other))),
        }
    }
}

/// Codec for `path`: by content when the file exists, by extension otherwise.
pub fn codec_for_path<P: AsRef<Path>>(path: P) -> IoResult<Box<dyn ImageCodec>> {
    let path = path.as_ref();
    let format = if path.is_file() {
        Format::detect(path)?
    } else {
        Format::from_extension(path)
    };
    match format {
        Format::Unknown => Err(IoError::UnsupportedFormat(path.display().to_string())),
        known => known.codec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        assert_eq!(Format::sniff(b"II*\0rest"), Format::Tiff);
        assert_eq!(Format::sniff(b"MM\0*"), Format::Tiff);
        assert_eq!(Format::sniff(b"MM\0+\0\x08"), Format::Tiff);
        assert_eq!(Format::sniff(b"SIMPLE  = T"), Format::Unknown);
        assert_eq!(Format::sniff(b"II"), Format::Unknown);
    }

    #[test]
    fn test_content_wins_over_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.dat");
        std::fs::write(&path, b"II*\0\x08\0\0\0").unwrap();
        assert_eq!(Format::detect(&path).unwrap(), Format::Tiff);

        let text = dir.path().join("notes.tif");
        std::fs::write(&text, b"hello").unwrap();
        assert_eq!(Format::detect(&text).unwrap(), Format::Tiff);
        assert!(Format::detect(dir.path().join("missing.tif")).is_err());
    }

    #[test]
    fn test_codec_for_unknown_extension() {
        assert!(codec_for_path("frame.fits").is_err());
    }
}
