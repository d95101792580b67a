//! Planar sample buffer.
//!
//! [`Image`] stores normalized `f32` samples one channel plane after another:
//!
//! ```text
//! Memory: [c0 row 0][c0 row 1] ... [c0 row h-1][c1 row 0] ... [cN row h-1]
//! ```
//!
//! Planar storage keeps every per-channel pass (filters, statistics, maps)
//! working on a contiguous `&[f32]` of `width * height` samples.
//!
//! # Usage
//!
//! ```rust
//! use cosmetic_core::Image;
//!
//! let mut img = Image::filled(64, 32, 1, 0.25).unwrap();
//! img.set_pixel(10, 5, 0, 1.0);
//! assert_eq!(img.pixel(10, 5, 0), 1.0);
//! assert_eq!(img.channel(0).len(), 64 * 32);
//! ```

use crate::{Error, Rect, Result};

/// Owned planar image with `f32` samples normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<f32>,
}

impl Image {
    /// Creates a zero-filled image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if any dimension is zero.
    pub fn new(width: u32, height: u32, channels: u32) -> Result<Self> {
        Self::filled(width, height, channels, 0.0)
    }

    /// Creates an image with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u32, value: f32) -> Result<Self> {
        validate(width, height, channels)?;
        let len = width as usize * height as usize * channels as usize;
        Ok(Self {
            width,
            height,
            channels,
            data: vec![value; len],
        })
    }

    /// Wraps an existing planar buffer.
    ///
    /// `data.len()` must equal `width * height * channels`.
    pub fn from_planar(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Result<Self> {
        validate(width, height, channels)?;
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("expected {} samples, got {}", expected, data.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Builds a planar image from interleaved samples (`[c0 c1 c2 c0 c1 c2 ...]`).
    pub fn from_interleaved(width: u32, height: u32, channels: u32, src: &[f32]) -> Result<Self> {
        let mut img = Self::new(width, height, channels)?;
        if src.len() != img.data.len() {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("expected {} samples, got {}", img.data.len(), src.len()),
            ));
        }
        let plane = img.plane_len();
        let ch = channels as usize;
        for (i, px) in src.chunks_exact(ch).enumerate() {
            for (c, &v) in px.iter().enumerate() {
                img.data[c * plane + i] = v;
            }
        }
        Ok(img)
    }

    /// Returns the samples interleaved per pixel.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let plane = self.plane_len();
        let ch = self.channels as usize;
        let mut out = vec![0.0f32; self.data.len()];
        for c in 0..ch {
            let src = &self.data[c * plane..(c + 1) * plane];
            for (i, &v) in src.iter().enumerate() {
                out[i * ch + c] = v;
            }
        }
        out
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of channel planes.
    #[inline]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Returns `true` for images with more than one channel.
    #[inline]
    pub fn is_color(&self) -> bool {
        self.channels > 1
    }

    /// Samples per channel plane.
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Full-frame rectangle.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Returns `true` when both images have the same width and height.
    ///
    /// Channel count is not compared.
    #[inline]
    pub fn same_geometry(&self, other: &Image) -> bool {
        self.bounds() == other.bounds()
    }

    /// All samples, plane after plane.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to all samples.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the image, returning the planar buffer.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// One channel plane.
    ///
    /// # Panics
    ///
    /// Panics if `c >= channels`.
    #[inline]
    pub fn channel(&self, c: u32) -> &[f32] {
        let plane = self.plane_len();
        let start = c as usize * plane;
        &self.data[start..start + plane]
    }

    /// Mutable channel plane.
    #[inline]
    pub fn channel_mut(&mut self, c: u32) -> &mut [f32] {
        let plane = self.plane_len();
        let start = c as usize * plane;
        &mut self.data[start..start + plane]
    }

    /// Checked channel access.
    pub fn try_channel(&self, c: u32) -> Result<&[f32]> {
        if c >= self.channels {
            return Err(Error::ChannelOutOfRange {
                channel: c,
                channels: self.channels,
            });
        }
        Ok(self.channel(c))
    }

    #[inline]
    fn index(&self, x: u32, y: u32, c: u32) -> usize {
        c as usize * self.plane_len() + y as usize * self.width as usize + x as usize
    }

    /// Sample at `(x, y)` in channel `c`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32, c: u32) -> f32 {
        self.data[self.index(x, y, c)]
    }

    /// Sets the sample at `(x, y)` in channel `c`.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, c: u32, value: f32) {
        let i = self.index(x, y, c);
        self.data[i] = value;
    }
}

fn validate(width: u32, height: u32, channels: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_dimensions(width, height, "zero-sized image"));
    }
    if channels == 0 {
        return Err(Error::invalid_dimensions(width, height, "no channels"));
    }
    Ok(())
}
