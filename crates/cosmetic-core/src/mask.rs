//! Boolean defect maps.
//!
//! A [`DefectMask`] flags pixel locations to correct. Like [`Image`](crate::Image)
//! it is planar. A mask with fewer channels than the image it is applied to
//! is broadcast: channel `c` of the image reads mask plane
//! `min(c, channels - 1)`, so a single-plane map covers every color channel.

use crate::{Error, Rect, Result};

/// Planar boolean map with the geometry of the frame it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectMask {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<bool>,
}

impl DefectMask {
    /// Creates an empty (all clear) mask.
    pub fn new(width: u32, height: u32, channels: u32) -> Result<Self> {
        if width == 0 || height == 0 || channels == 0 {
            return Err(Error::invalid_dimensions(
                width,
                height,
                format!("{} channel(s)", channels),
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            data: vec![false; width as usize * height as usize * channels as usize],
        })
    }

    /// Mask width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of mask planes.
    #[inline]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Full-frame rectangle.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    #[inline]
    fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Plane used for image channel `c`, broadcasting the last plane.
    #[inline]
    pub fn channel(&self, c: u32) -> &[bool] {
        let c = c.min(self.channels - 1) as usize;
        let plane = self.plane_len();
        &self.data[c * plane..(c + 1) * plane]
    }

    /// Mutable mask plane. `c` is clamped like [`channel`](Self::channel).
    #[inline]
    pub fn channel_mut(&mut self, c: u32) -> &mut [bool] {
        let c = c.min(self.channels - 1) as usize;
        let plane = self.plane_len();
        &mut self.data[c * plane..(c + 1) * plane]
    }

    /// Reads the flag at `(x, y)` for image channel `c`.
    #[inline]
    pub fn get(&self, x: u32, y: u32, c: u32) -> bool {
        self.channel(c)[y as usize * self.width as usize + x as usize]
    }

    /// Sets the flag at `(x, y)` in plane `c`.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, c: u32, flagged: bool) {
        let w = self.width as usize;
        self.channel_mut(c)[y as usize * w + x as usize] = flagged;
    }

    /// Number of flagged entries across all planes.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&f| f).count()
    }

    /// Returns `true` if nothing is flagged.
    pub fn is_clear(&self) -> bool {
        !self.data.iter().any(|&f| f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_count() {
        let mut m = DefectMask::new(4, 3, 2).unwrap();
        assert!(m.is_clear());
        m.set(1, 2, 0, true);
        m.set(3, 0, 1, true);
        assert_eq!(m.count(), 2);
        assert!(m.get(1, 2, 0));
        assert!(!m.get(1, 2, 1));
    }

    #[test]
    fn test_single_plane_broadcast() {
        let mut m = DefectMask::new(2, 2, 1).unwrap();
        m.set(0, 1, 0, true);
        assert!(m.get(0, 1, 0));
        assert!(m.get(0, 1, 1));
        assert!(m.get(0, 1, 2));
    }

    #[test]
    fn test_zero_dims() {
        assert!(DefectMask::new(0, 2, 1).is_err());
        assert!(DefectMask::new(2, 2, 0).is_err());
    }
}
