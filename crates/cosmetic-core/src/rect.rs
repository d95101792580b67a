//! Frame geometry.
//!
//! A calibration frame fixes the geometry of a run. Every target sub-image
//! is compared against it by [`Rect`] equality before reference maps apply.
//!
//! ```rust
//! use cosmetic_core::Rect;
//!
//! let dark = Rect::from_size(4096, 2160);
//! assert_eq!(dark.to_string(), "4096x2160");
//! assert_ne!(dark, Rect::from_size(2160, 4096));
//! ```

use std::fmt;

/// Pixel rectangle. Frames always sit at the origin; the offset is kept
/// for sub-regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
}

impl Rect {
    /// Rectangle at `(x, y)`.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Full frame of the given size.
    #[inline]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Number of pixels.
    #[inline]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// `true` when `(px, py)` lies inside; the far edges are exclusive.
    #[inline]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px - self.x < self.width && py >= self.y && py - self.y < self.height
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if self.x != 0 || self.y != 0 {
            write!(f, "+{}+{}", self.x, self.y)?;
        }
        Ok(())
    }
}
