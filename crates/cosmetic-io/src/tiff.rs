//! TIFF codec.
//!
//! Every IFD of a file is one sub-image. Header keywords live in the
//! `ImageDescription` tag as newline-separated cards, the color profile in
//! the ICC tag (34675).
//!
//! # Features
//!
//! - 8-bit, 16-bit and 32-bit integer input
//! - 32-bit and 64-bit float input
//! - Gray and RGB
//! - Output keeps the sample format of the source image
//!
//! # Example
//!
//! ```rust,no_run
//! use cosmetic_io::{ImageCodec, TiffCodec};
//! use std::path::Path;
//!
//! let mut reader = TiffCodec.open(Path::new("light_001.tif"))?;
//! for (i, desc) in reader.images().to_vec().iter().enumerate() {
//!     reader.select(i)?;
//!     let image = reader.read()?;
//!     println!("{}: {}x{}", desc.id, image.width(), image.height());
//! }
//! # Ok::<(), cosmetic_io::IoError>(())
//! ```

use crate::metadata::{format_cards, parse_cards};
use crate::traits::{FrameReader, FrameWriter, ImageCodec};
use crate::{IccProfile, ImageOptions, IoError, IoResult, Keyword, SubImageDescriptor};
use cosmetic_core::Image;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, ColorType as EncodeColor};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, trace};

/// ICC profile tag number.
pub const ICC_PROFILE_TAG: u16 = 34675;

/// TIFF codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffCodec;

impl ImageCodec for TiffCodec {
    fn name(&self) -> &str {
        "TIFF"
    }

    fn open(&self, path: &Path) -> IoResult<Box<dyn FrameReader>> {
        Ok(Box::new(TiffReader::open(path)?))
    }

    fn create(&self, path: &Path) -> IoResult<Box<dyn FrameWriter>> {
        Ok(Box::new(TiffWriter::create(path)?))
    }
}

/// `SampleFormat` value for IEEE floating point samples.
const SAMPLE_FORMAT_FLOAT: u16 = 3;

fn describe(color: ColorType, float: bool) -> IoResult<(u32, ImageOptions)> {
    let (channels, bits) = match color {
        ColorType::Gray(bits) => (1, bits),
        ColorType::RGB(bits) => (3, bits),
        other => {
            return Err(IoError::UnsupportedFormat(format!(
                "TIFF color type {:?}",
                other
            )));
        }
    };
    let supported = match (bits, float) {
        (8 | 16 | 32, false) => true,
        (32 | 64, true) => true,
        _ => false,
    };
    if !supported {
        let kind = if float { "float" } else { "integer" };
        return Err(IoError::UnsupportedFormat(format!("{}-bit {} TIFF samples", bits, kind)));
    }
    let options = ImageOptions {
        bits_per_sample: bits.min(32),
        float_sample: float,
    };
    Ok((channels, options))
}

// Missing tag means unsigned integer samples.
fn float_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> IoResult<bool> {
    Ok(match decoder.find_tag(Tag::SampleFormat)? {
        Some(value) => value.into_u16_vec()?.first() == Some(&SAMPLE_FORMAT_FLOAT),
        None => false,
    })
}

/// Reader over all pages of a TIFF file.
pub struct TiffReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    images: Vec<SubImageDescriptor>,
    selected: usize,
}

impl TiffReader {
    /// Opens `path` and walks its IFD chain.
    pub fn open(path: &Path) -> IoResult<Self> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        let mut images = Vec::new();
        loop {
            let (width, height) = decoder.dimensions()?;
            let float = float_samples(&mut decoder)?;
            let (channels, options) = describe(decoder.colortype()?, float)?;
            images.push(SubImageDescriptor {
                id: format!("page{}", images.len() + 1),
                width,
                height,
                channels,
                options,
            });
            if !decoder.more_images() {
                break;
            }
            decoder.next_image()?;
        }
        decoder.seek_to_image(0)?;

        debug!(path = %path.display(), pages = images.len(), "Opened TIFF");
        Ok(Self {
            path: path.to_path_buf(),
            decoder,
            images,
            selected: 0,
        })
    }
}

impl FrameReader for TiffReader {
    fn images(&self) -> &[SubImageDescriptor] {
        &self.images
    }

    fn select(&mut self, index: usize) -> IoResult<()> {
        if index >= self.images.len() {
            return Err(IoError::NoSuchImage {
                index,
                count: self.images.len(),
            });
        }
        if index != self.selected {
            self.decoder.seek_to_image(index)?;
            self.selected = index;
        }
        Ok(())
    }

    fn read(&mut self) -> IoResult<Image> {
        let desc = &self.images[self.selected];
        trace!(path = %self.path.display(), page = self.selected, "read");
        let samples: Vec<f32> = match self.decoder.read_image()? {
            DecodingResult::U8(buf) => buf.iter().map(|&v| v as f32 / 255.0).collect(),
            DecodingResult::U16(buf) => buf.iter().map(|&v| v as f32 / 65535.0).collect(),
            DecodingResult::U32(buf) => buf
                .iter()
                .map(|&v| (v as f64 / u32::MAX as f64) as f32)
                .collect(),
            DecodingResult::F32(buf) => buf,
            DecodingResult::F64(buf) => buf.iter().map(|&v| v as f32).collect(),
            _ => {
                return Err(IoError::DecodeError(format!(
                    "{}: unsupported sample format",
                    self.path.display()
                )));
            }
        };
        Ok(Image::from_interleaved(
            desc.width,
            desc.height,
            desc.channels,
            &samples,
        )?)
    }

    fn read_keywords(&mut self) -> IoResult<Vec<Keyword>> {
        match self.decoder.find_tag(Tag::ImageDescription)? {
            Some(value) => Ok(parse_cards(&value.into_string()?)),
            None => Ok(Vec::new()),
        }
    }

    fn read_icc_profile(&mut self) -> IoResult<Option<IccProfile>> {
        match self
            .decoder
            .find_tag(Tag::from_u16_exhaustive(ICC_PROFILE_TAG))?
        {
            Some(value) => Ok(Some(IccProfile(value.into_u8_vec()?))),
            None => Ok(None),
        }
    }

    fn close(self: Box<Self>) -> IoResult<()> {
        Ok(())
    }
}

/// Single-page TIFF writer.
pub struct TiffWriter {
    path: PathBuf,
    file: Option<File>,
    options: ImageOptions,
    description: String,
    icc: Option<IccProfile>,
    written: bool,
}

impl TiffWriter {
    /// Creates (or truncates) `path`.
    pub fn create(path: &Path) -> IoResult<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(File::create(path)?),
            options: ImageOptions::default(),
            description: String::new(),
            icc: None,
            written: false,
        })
    }
}

fn write_page<W, C>(
    encoder: &mut TiffEncoder<W>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    description: &str,
    icc: Option<&IccProfile>,
) -> IoResult<()>
where
    W: Write + Seek,
    C: EncodeColor,
    [C::Inner]: TiffValue,
{
    let mut page = encoder
        .new_image::<C>(width, height)
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    if !description.is_empty() {
        page.encoder()
            .write_tag(Tag::ImageDescription, description)
            .map_err(|e| IoError::EncodeError(e.to_string()))?;
    }
    if let Some(icc) = icc {
        page.encoder()
            .write_tag(Tag::from_u16_exhaustive(ICC_PROFILE_TAG), icc.as_bytes())
            .map_err(|e| IoError::EncodeError(e.to_string()))?;
    }
    page.write_data(data)
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    Ok(())
}

fn quantize_u32(samples: &[f32]) -> Vec<u32> {
    samples
        .iter()
        .map(|&v| (v.clamp(0.0, 1.0) as f64 * u32::MAX as f64).round() as u32)
        .collect()
}

fn quantize_u8(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect()
}

fn quantize_u16(samples: &[f32]) -> Vec<u16> {
    samples
        .iter()
        .map(|&v| (v.clamp(0.0, 1.0) * 65535.0).round() as u16)
        .collect()
}

impl FrameWriter for TiffWriter {
    fn set_options(&mut self, options: &ImageOptions) -> IoResult<()> {
        self.options = *options;
        Ok(())
    }

    fn write_keywords(&mut self, keywords: &[Keyword]) -> IoResult<()> {
        self.description = format_cards(keywords);
        Ok(())
    }

    fn write_icc_profile(&mut self, profile: &IccProfile) -> IoResult<()> {
        self.icc = Some(profile.clone());
        Ok(())
    }

    fn write_image(&mut self, image: &Image) -> IoResult<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| IoError::Closed(format!("{}: image already written", self.path.display())))?;
        let mut encoder = TiffEncoder::new(file).map_err(|e| IoError::EncodeError(e.to_string()))?;

        let (w, h) = (image.width(), image.height());
        let samples = image.to_interleaved();
        let desc = self.description.as_str();
        let icc = self.icc.as_ref();
        let float = self.options.float_sample;

        match (image.channels(), float, self.options.bits_per_sample) {
            (1, true, _) => write_page::<_, colortype::Gray32Float>(&mut encoder, w, h, &samples, desc, icc)?,
            (3, true, _) => write_page::<_, colortype::RGB32Float>(&mut encoder, w, h, &samples, desc, icc)?,
            (1, false, 32) => write_page::<_, colortype::Gray32>(&mut encoder, w, h, &quantize_u32(&samples), desc, icc)?,
            (3, false, 32) => write_page::<_, colortype::RGB32>(&mut encoder, w, h, &quantize_u32(&samples), desc, icc)?,
            (1, false, 8) => write_page::<_, colortype::Gray8>(&mut encoder, w, h, &quantize_u8(&samples), desc, icc)?,
            (3, false, 8) => write_page::<_, colortype::RGB8>(&mut encoder, w, h, &quantize_u8(&samples), desc, icc)?,
            (1, false, _) => write_page::<_, colortype::Gray16>(&mut encoder, w, h, &quantize_u16(&samples), desc, icc)?,
            (3, false, _) => write_page::<_, colortype::RGB16>(&mut encoder, w, h, &quantize_u16(&samples), desc, icc)?,
            (channels, _, _) => {
                return Err(IoError::EncodeError(format!(
                    "unsupported channel count: {}",
                    channels
                )));
            }
        }

        self.written = true;
        debug!(path = %self.path.display(), width = w, height = h, "Wrote TIFF");
        Ok(())
    }

    fn close(self: Box<Self>) -> IoResult<()> {
        if !self.written {
            return Err(IoError::Closed(format!(
                "{}: closed without an image",
                self.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let (ch, opts) = describe(ColorType::RGB(16), false).unwrap();
        assert_eq!(ch, 3);
        assert_eq!(opts.bits_per_sample, 16);
        assert!(!opts.float_sample);

        let (_, opts) = describe(ColorType::Gray(32), true).unwrap();
        assert!(opts.float_sample);

        assert!(describe(ColorType::RGBA(8), false).is_err());
        assert!(describe(ColorType::Gray(16), true).is_err());
        assert!(describe(ColorType::Gray(64), false).is_err());
    }

    #[test]
    fn test_integer_32_bit_stays_integer() {
        let (_, opts) = describe(ColorType::Gray(32), false).unwrap();
        assert_eq!(opts.bits_per_sample, 32);
        assert!(!opts.float_sample);

        let (_, opts) = describe(ColorType::Gray(64), true).unwrap();
        assert_eq!(opts.bits_per_sample, 32);
        assert!(opts.float_sample);
    }

    #[test]
    fn test_quantize_clamps() {
        assert_eq!(quantize_u16(&[-0.5, 0.0, 1.0, 2.0]), vec![0, 0, 65535, 65535]);
        assert_eq!(quantize_u8(&[0.5]), vec![128]);
        assert_eq!(quantize_u32(&[0.0, 1.0, 3.0]), vec![0, u32::MAX, u32::MAX]);
    }
}
