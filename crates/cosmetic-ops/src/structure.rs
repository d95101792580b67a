//! Structuring-element filters.
//!
//! Each output pixel is a statistic (median or trimmed mean) of the input
//! pixels selected by a fixed neighbor-inclusion mask centered on it. The
//! center itself is never included.
//!
//! # Shapes
//!
//! | Shape | Plain | Mosaic |
//! |-------|-------|--------|
//! | [`Shape::Local`] | 3×3 ring | 5×5, same-color sites |
//! | [`Shape::Background`] | 7×7 minus the 3×3 core | 13×13 same-color ring |
//! | [`Shape::Diagonal`] | 4 diagonal neighbors | 4 diagonal same-color sites |
//! | [`Shape::OffAxis`] | 5×5 minus center row and column | 9×9 same-color sites minus center row and column |
//!
//! Mosaic shapes step by two so that only sites of the same color in a 2×2
//! color-filter tiling contribute.
//!
//! # Edges
//!
//! Neighbors that fall outside the image are skipped. A pixel with no
//! in-bounds neighbor keeps its own value.
//!
//! # Example
//!
//! ```rust
//! use cosmetic_core::Image;
//! use cosmetic_ops::structure::{apply, Layout, Shape, Statistic};
//!
//! let mut img = Image::filled(16, 16, 1, 0.1).unwrap();
//! img.set_pixel(8, 8, 0, 1.0);
//! let med = apply(&img, Layout::Plain, Shape::Local, Statistic::Median).unwrap();
//! assert_eq!(med.pixel(8, 8, 0), 0.1);
//! ```

use crate::cancel::CancelToken;
use crate::stats::{median, trimmed_mean};
use crate::{OpsError, OpsResult};
use cosmetic_core::Image;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Sensor layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Every site carries every channel.
    #[default]
    Plain,
    /// Color-filter mosaic with a 2×2 tiling.
    Mosaic,
}

impl Layout {
    /// `Mosaic` when `cfa` is set.
    pub fn from_cfa(cfa: bool) -> Self {
        if cfa { Layout::Mosaic } else { Layout::Plain }
    }
}

/// Neighborhood shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Immediate neighbors.
    Local,
    /// Ring around a star-sized core.
    Background,
    /// Diagonal neighbors only.
    Diagonal,
    /// Neighbors off the center row and column, for line defects.
    OffAxis,
}

/// Statistic evaluated over the selected neighbors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    /// Median (mean of the two central values for an even count).
    Median,
    /// Mean after trimming this fraction from each end.
    TrimmedMean(f32),
}

impl Statistic {
    /// Plain mean.
    pub const MEAN: Statistic = Statistic::TrimmedMean(0.0);

    #[inline]
    fn eval(self, values: &mut [f32]) -> f32 {
        match self {
            Statistic::Median => median(values),
            Statistic::TrimmedMean(trim) => trimmed_mean(values, trim),
        }
    }
}

const PLAIN_LOCAL: &[&str] = &["xxx", "x-x", "xxx"];

const PLAIN_BACKGROUND: &[&str] = &[
    "xxxxxxx", "xxxxxxx", "xx---xx", "xx---xx", "xx---xx", "xxxxxxx", "xxxxxxx",
];

const PLAIN_DIAGONAL: &[&str] = &["x-x", "---", "x-x"];

const PLAIN_OFF_AXIS: &[&str] = &["xx-xx", "xx-xx", "-----", "xx-xx", "xx-xx"];

const MOSAIC_LOCAL: &[&str] = &["x-x-x", "-----", "x---x", "-----", "x-x-x"];

const MOSAIC_BACKGROUND: &[&str] = &[
    "x-x-x-x-x-x-x",
    "-------------",
    "x-x-x-x-x-x-x",
    "-------------",
    "x-x-------x-x",
    "-------------",
    "x-x-------x-x",
    "-------------",
    "x-x-------x-x",
    "-------------",
    "x-x-x-x-x-x-x",
    "-------------",
    "x-x-x-x-x-x-x",
];

const MOSAIC_DIAGONAL: &[&str] = &["x---x", "-----", "-----", "-----", "x---x"];

const MOSAIC_OFF_AXIS: &[&str] = &[
    "x-x---x-x",
    "---------",
    "x-x---x-x",
    "---------",
    "---------",
    "---------",
    "x-x---x-x",
    "---------",
    "x-x---x-x",
];

// `(dx, dy)` of every `x` site around the center of a square pattern.
fn pattern_offsets(rows: &[&str]) -> Vec<(isize, isize)> {
    let radius = (rows.len() / 2) as isize;
    rows.iter()
        .enumerate()
        .flat_map(|(j, row)| {
            row.bytes().enumerate().filter_map(move |(i, site)| {
                let (dx, dy) = (i as isize - radius, j as isize - radius);
                (site == b'x' && (dx, dy) != (0, 0)).then_some((dx, dy))
            })
        })
        .collect()
}

/// Neighbor-inclusion mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    size: usize,
    offsets: Vec<(isize, isize)>,
}

impl StructuringElement {
    /// Builds an element from square pattern rows, `x` marking included sites.
    ///
    /// The pattern must be square with an odd side; the center is ignored.
    pub fn from_pattern(rows: &[&str]) -> OpsResult<Self> {
        let size = rows.len();
        if size % 2 == 0 {
            return Err(OpsError::InvalidParameter(
                "structuring element side must be odd".into(),
            ));
        }
        if let Some((j, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != size) {
            return Err(OpsError::InvalidParameter(format!(
                "pattern row {} has {} sites, expected {}",
                j,
                row.len(),
                size
            )));
        }
        Ok(Self {
            size,
            offsets: pattern_offsets(rows),
        })
    }

    /// The element for a layout and shape.
    pub fn for_layout(layout: Layout, shape: Shape) -> Self {
        let rows = match (layout, shape) {
            (Layout::Plain, Shape::Local) => PLAIN_LOCAL,
            (Layout::Plain, Shape::Background) => PLAIN_BACKGROUND,
            (Layout::Plain, Shape::Diagonal) => PLAIN_DIAGONAL,
            (Layout::Plain, Shape::OffAxis) => PLAIN_OFF_AXIS,
            (Layout::Mosaic, Shape::Local) => MOSAIC_LOCAL,
            (Layout::Mosaic, Shape::Background) => MOSAIC_BACKGROUND,
            (Layout::Mosaic, Shape::Diagonal) => MOSAIC_DIAGONAL,
            (Layout::Mosaic, Shape::OffAxis) => MOSAIC_OFF_AXIS,
        };
        // Built-in patterns are square with odd sides.
        Self {
            size: rows.len(),
            offsets: pattern_offsets(rows),
        }
    }

    /// Side length of the mask.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of included sites.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if no site is included.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Included `(dx, dy)` offsets.
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }

    /// Evaluates `statistic` around `(x, y)` of one plane.
    ///
    /// Returns `None` if no neighbor is in bounds. `scratch` is reused
    /// between calls.
    #[inline]
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        plane: &[f32],
        width: usize,
        height: usize,
        x: usize,
        y: usize,
        statistic: Statistic,
        scratch: &mut Vec<f32>,
    ) -> Option<f32> {
        scratch.clear();
        for &(dx, dy) in &self.offsets {
            let sx = x as isize + dx;
            let sy = y as isize + dy;
            if sx >= 0 && sy >= 0 && (sx as usize) < width && (sy as usize) < height {
                scratch.push(plane[sy as usize * width + sx as usize]);
            }
        }
        if scratch.is_empty() {
            None
        } else {
            Some(statistic.eval(scratch))
        }
    }
}

/// Filters one plane, rows in parallel on the current rayon pool.
///
/// `cancel` is checked once per row.
pub fn apply_plane(
    src: &[f32],
    width: usize,
    height: usize,
    element: &StructuringElement,
    statistic: Statistic,
    cancel: &CancelToken,
) -> OpsResult<Vec<f32>> {
    let expected = width * height;
    if src.len() != expected {
        return Err(OpsError::InvalidDimensions(format!(
            "expected {} pixels, got {}",
            expected,
            src.len()
        )));
    }

    let mut dst = vec![0.0f32; expected];
    dst.par_chunks_mut(width)
        .enumerate()
        .try_for_each_init(
            || Vec::with_capacity(element.len()),
            |scratch, (y, row)| {
                cancel.check()?;
                for (x, out) in row.iter_mut().enumerate() {
                    *out = element
                        .evaluate(src, width, height, x, y, statistic, scratch)
                        .unwrap_or(src[y * width + x]);
                }
                Ok::<(), OpsError>(())
            },
        )?;
    Ok(dst)
}

/// Filters every channel of `image` with an explicit element.
pub fn apply_with(
    image: &Image,
    element: &StructuringElement,
    statistic: Statistic,
    cancel: &CancelToken,
) -> OpsResult<Image> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut data = Vec::with_capacity(image.data().len());
    for c in 0..image.channels() {
        data.extend(apply_plane(image.channel(c), w, h, element, statistic, cancel)?);
    }
    Ok(Image::from_planar(
        image.width(),
        image.height(),
        image.channels(),
        data,
    )?)
}

/// Derived image for a layout, shape and statistic.
///
/// The background shape only supports [`Statistic::Median`].
pub fn apply(image: &Image, layout: Layout, shape: Shape, statistic: Statistic) -> OpsResult<Image> {
    apply_cancelable(image, layout, shape, statistic, &CancelToken::new())
}

/// [`apply`] with a cancellation token.
pub fn apply_cancelable(
    image: &Image,
    layout: Layout,
    shape: Shape,
    statistic: Statistic,
    cancel: &CancelToken,
) -> OpsResult<Image> {
    trace!(width = image.width(), height = image.height(), ?layout, ?shape, ?statistic, "structuring filter");
    if shape == Shape::Background && statistic != Statistic::Median {
        return Err(OpsError::InvalidParameter(
            "background shape supports the median only".into(),
        ));
    }
    let element = StructuringElement::for_layout(layout, shape);
    apply_with(image, &element, statistic, cancel)
}
