//! Defect map builders.
//!
//! Three independent sources flag defective pixels:
//!
//! - **Reference**: a calibration frame compared against hot/cold levels.
//!   Built once per run into [`ReferenceMaps`] and shared by every target
//!   of matching geometry.
//! - **Auto-detect**: per target, from local average, local median and
//!   background median derived images ([`DerivedImages`]) and the channel's
//!   average absolute deviation.
//! - **List**: explicit rows and columns ([`DefectItem`]).
//!
//! All maps have the geometry of the frame they were built from and are
//! deterministic given identical inputs.

use crate::cancel::CancelToken;
use crate::stats::histogram_level;
use crate::structure::{Layout, Shape, Statistic, apply_cancelable};
use crate::threshold::Polarity;
use crate::{OpsError, OpsResult};
use cosmetic_core::{DefectMask, Image, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One explicit defect: a full row or column, or a span within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectItem {
    /// Disabled items are ignored.
    pub enabled: bool,
    /// `true` for a row, `false` for a column.
    pub is_row: bool,
    /// Row or column index.
    pub address: u16,
    /// Limit the defect to `begin..=end` along the line.
    pub is_range: bool,
    /// First position of the span (order with `end` does not matter).
    pub begin: u16,
    /// Last position of the span.
    pub end: u16,
}

impl Default for DefectItem {
    fn default() -> Self {
        Self {
            enabled: true,
            is_row: false,
            address: 0,
            is_range: false,
            begin: 0,
            end: 0,
        }
    }
}

impl DefectItem {
    /// Full defective row.
    pub fn row(address: u16) -> Self {
        Self {
            is_row: true,
            address,
            ..Self::default()
        }
    }

    /// Full defective column.
    pub fn column(address: u16) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Limits the defect to a span.
    pub fn with_range(mut self, begin: u16, end: u16) -> Self {
        self.is_range = true;
        self.begin = begin;
        self.end = end;
        self
    }

    /// Pixels this item covers in a `width`×`height` frame as
    /// `(address, first, last)` along the line, or `None` when the item is
    /// outside the frame.
    pub fn span(&self, width: u32, height: u32) -> Option<(u32, u32, u32)> {
        let (lines, length) = if self.is_row {
            (height, width)
        } else {
            (width, height)
        };
        let address = self.address as u32;
        if address >= lines {
            return None;
        }
        let last = length - 1;
        if !self.is_range {
            return Some((address, 0, last));
        }
        let first = self.begin.min(self.end) as u32;
        if first > last {
            return None;
        }
        let stop = (self.begin.max(self.end) as u32).min(last);
        Some((address, first, stop))
    }
}

/// Flags every pixel covered by the enabled `items`.
///
/// The map has a single plane and so applies to every channel.
pub fn list_map(width: u32, height: u32, items: &[DefectItem]) -> OpsResult<DefectMask> {
    let mut mask = DefectMask::new(width, height, 1)?;
    for item in items.iter().filter(|i| i.enabled) {
        let Some((address, first, last)) = item.span(width, height) else {
            debug!(?item, width, height, "Defect outside frame, skipped");
            continue;
        };
        for p in first..=last {
            if item.is_row {
                mask.set(p, address, 0, true);
            } else {
                mask.set(address, p, 0, true);
            }
        }
    }
    Ok(mask)
}

/// Reference map for one polarity.
///
/// Samples are compared on the 16-bit histogram scale. With `cfa` set on
/// a color frame, zero samples mark absent channels and are never flagged.
pub fn reference_map(frame: &Image, polarity: Polarity, level: f64, cfa: bool) -> OpsResult<DefectMask> {
    let threshold = histogram_level(level);
    let mosaic_color = cfa && frame.is_color();
    let mut mask = DefectMask::new(frame.width(), frame.height(), frame.channels())?;
    for c in 0..frame.channels() {
        let src = frame.channel(c);
        for (flag, &v) in mask.channel_mut(c).iter_mut().zip(src) {
            let d = histogram_level(v as f64);
            if d == 0 && mosaic_color {
                continue;
            }
            *flag = match polarity {
                Polarity::Hot => d >= threshold,
                Polarity::Cold => d <= threshold,
            };
        }
    }
    Ok(mask)
}

/// Hot and cold maps of a calibration frame, shared read-only by all tasks
/// of a run.
#[derive(Debug, Clone)]
pub struct ReferenceMaps {
    geometry: Rect,
    hot: Option<DefectMask>,
    cold: Option<DefectMask>,
}

impl ReferenceMaps {
    /// Builds the maps for the enabled polarities.
    pub fn build(frame: &Image, cfa: bool, hot_level: Option<f64>, cold_level: Option<f64>) -> OpsResult<Self> {
        let hot = hot_level
            .map(|level| reference_map(frame, Polarity::Hot, level, cfa))
            .transpose()?;
        let cold = cold_level
            .map(|level| reference_map(frame, Polarity::Cold, level, cfa))
            .transpose()?;
        let maps = Self {
            geometry: frame.bounds(),
            hot,
            cold,
        };
        debug!(
            geometry = %maps.geometry,
            hot = maps.hot.as_ref().map_or(0, DefectMask::count),
            cold = maps.cold.as_ref().map_or(0, DefectMask::count),
            "Reference maps built"
        );
        Ok(maps)
    }

    /// Geometry of the calibration frame.
    pub fn geometry(&self) -> Rect {
        self.geometry
    }

    /// Hot map, if enabled.
    pub fn hot(&self) -> Option<&DefectMask> {
        self.hot.as_ref()
    }

    /// Cold map, if enabled.
    pub fn cold(&self) -> Option<&DefectMask> {
        self.cold.as_ref()
    }

    /// Returns `true` if `image` has the calibration geometry.
    pub fn matches(&self, image: &Image) -> bool {
        image.bounds() == self.geometry
    }

    /// Returns an error unless `image` has the calibration geometry.
    pub fn check_geometry(&self, image: &Image) -> OpsResult<()> {
        if self.matches(image) {
            Ok(())
        } else {
            Err(OpsError::SizeMismatch(format!(
                "image {} does not match calibration frame {}",
                image.bounds(),
                self.geometry
            )))
        }
    }
}

/// Derived images used by auto-detection, computed from the uncorrected
/// target.
#[derive(Debug, Clone, Default)]
pub struct DerivedImages {
    /// Local mean.
    pub average: Option<Image>,
    /// Local median.
    pub median: Option<Image>,
    /// Background median.
    pub background: Option<Image>,
}

impl DerivedImages {
    /// Computes what hot and/or cold auto-detection needs.
    ///
    /// Hot needs all three images; cold needs the two medians.
    pub fn compute(target: &Image, layout: Layout, hot: bool, cold: bool, cancel: &CancelToken) -> OpsResult<Self> {
        let mut derived = Self::default();
        if hot {
            derived.average = Some(apply_cancelable(target, layout, Shape::Local, Statistic::MEAN, cancel)?);
        }
        if hot || cold {
            derived.median = Some(apply_cancelable(target, layout, Shape::Local, Statistic::Median, cancel)?);
            derived.background =
                Some(apply_cancelable(target, layout, Shape::Background, Statistic::Median, cancel)?);
        }
        Ok(derived)
    }

    fn plane<'a>(image: &'a Option<Image>, name: &str, c: u32) -> OpsResult<&'a [f32]> {
        image
            .as_ref()
            .map(|img| img.channel(c))
            .ok_or_else(|| OpsError::InvalidParameter(format!("{} image not computed", name)))
    }

    /// Channel `c` of the local mean.
    pub fn average_plane(&self, c: u32) -> OpsResult<&[f32]> {
        Self::plane(&self.average, "average", c)
    }

    /// Channel `c` of the local median.
    pub fn median_plane(&self, c: u32) -> OpsResult<&[f32]> {
        Self::plane(&self.median, "median", c)
    }

    /// Channel `c` of the background median.
    pub fn background_plane(&self, c: u32) -> OpsResult<&[f32]> {
        Self::plane(&self.background, "background", c)
    }
}

/// Flags hot pixels of one plane.
///
/// A pixel is hot when its neighborhood is not itself bright
/// (`average < background + dev/2`), it stands out from the background
/// (`value > background + dev`) and from its neighbors
/// (`value > median + k * dev`).
#[allow(clippy::too_many_arguments)]
pub fn auto_hot_plane(
    target: &[f32],
    average: &[f32],
    median: &[f32],
    background: &[f32],
    width: usize,
    deviation: f64,
    k: f64,
    out: &mut [bool],
    cancel: &CancelToken,
) -> OpsResult<()> {
    check_lengths(target.len(), &[average.len(), median.len(), background.len(), out.len()])?;
    let half = deviation / 2.0;
    let kd = k * deviation;
    for (y, row) in out.chunks_mut(width.max(1)).enumerate() {
        cancel.check()?;
        let start = y * width;
        for (x, flag) in row.iter_mut().enumerate() {
            let i = start + x;
            let (t, a, m, b) = (target[i] as f64, average[i] as f64, median[i] as f64, background[i] as f64);
            *flag = a < b + half && t > b + deviation && t > m + kd;
        }
    }
    Ok(())
}

/// Flags cold pixels of one plane: `value + k * dev` is below both the
/// background and the local median.
#[allow(clippy::too_many_arguments)]
pub fn auto_cold_plane(
    target: &[f32],
    median: &[f32],
    background: &[f32],
    width: usize,
    deviation: f64,
    k: f64,
    out: &mut [bool],
    cancel: &CancelToken,
) -> OpsResult<()> {
    check_lengths(target.len(), &[median.len(), background.len(), out.len()])?;
    let kd = k * deviation;
    for (y, row) in out.chunks_mut(width.max(1)).enumerate() {
        cancel.check()?;
        let start = y * width;
        for (x, flag) in row.iter_mut().enumerate() {
            let i = start + x;
            let t = target[i] as f64 + kd;
            *flag = t < background[i] as f64 && t < median[i] as f64;
        }
    }
    Ok(())
}

fn check_lengths(expected: usize, others: &[usize]) -> OpsResult<()> {
    if let Some(&bad) = others.iter().find(|&&n| n != expected) {
        return Err(OpsError::SizeMismatch(format!(
            "expected {} pixels, got {}",
            expected, bad
        )));
    }
    Ok(())
}

/// Builds a whole-image auto-detect map.
///
/// `dev` of each channel is the average absolute deviation of `target`
/// from its median.
pub fn auto_map(
    target: &Image,
    derived: &DerivedImages,
    polarity: Polarity,
    k: f64,
    cancel: &CancelToken,
) -> OpsResult<DefectMask> {
    let mut mask = DefectMask::new(target.width(), target.height(), target.channels())?;
    let width = target.width() as usize;
    for c in 0..target.channels() {
        let plane = target.channel(c);
        let center = crate::stats::channel_median(plane);
        let dev = crate::stats::average_deviation(plane, center);
        match polarity {
            Polarity::Hot => auto_hot_plane(
                plane,
                derived.average_plane(c)?,
                derived.median_plane(c)?,
                derived.background_plane(c)?,
                width,
                dev,
                k,
                mask.channel_mut(c),
                cancel,
            )?,
            Polarity::Cold => auto_cold_plane(
                plane,
                derived.median_plane(c)?,
                derived.background_plane(c)?,
                width,
                dev,
                k,
                mask.channel_mut(c),
                cancel,
            )?,
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::normalized_level;

    #[test]
    fn test_row_covers_every_column() {
        let mask = list_map(50, 40, &[DefectItem::row(7)]).unwrap();
        assert_eq!(mask.count(), 50);
        assert!((0..50).all(|x| mask.get(x, 7, 0)));
    }

    #[test]
    fn test_range_order_independent() {
        let a = list_map(20, 20, &[DefectItem::column(3).with_range(10, 5)]).unwrap();
        let b = list_map(20, 20, &[DefectItem::column(3).with_range(5, 10)]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.count(), 6);
        assert!(a.get(3, 5, 0) && a.get(3, 10, 0) && !a.get(3, 11, 0));
    }

    #[test]
    fn test_list_clips_and_skips() {
        let items = [
            DefectItem::row(30),
            DefectItem::column(2).with_range(8, 100),
            DefectItem::column(4).with_range(40, 50),
            DefectItem {
                enabled: false,
                ..DefectItem::row(0)
            },
        ];
        let mask = list_map(10, 12, &items).unwrap();
        assert_eq!(mask.count(), 4);
        assert!(mask.get(2, 11, 0));
    }

    #[test]
    fn test_reference_thresholds() {
        let data: Vec<f32> = [0u16, 10, 500, 65535]
            .iter()
            .map(|&l| normalized_level(l) as f32)
            .collect();
        let frame = Image::from_planar(4, 1, 1, data).unwrap();
        let hot = reference_map(&frame, Polarity::Hot, normalized_level(500), false).unwrap();
        assert_eq!(hot.channel(0), &[false, false, true, true]);
        let cold = reference_map(&frame, Polarity::Cold, normalized_level(10), false).unwrap();
        assert_eq!(cold.channel(0), &[true, true, false, false]);
    }

    #[test]
    fn test_reference_mosaic_ignores_zero() {
        let frame = Image::filled(2, 2, 3, 0.0).unwrap();
        let cold = reference_map(&frame, Polarity::Cold, 0.01, true).unwrap();
        assert!(cold.is_clear());
        let mono = Image::filled(2, 2, 1, 0.0).unwrap();
        let cold = reference_map(&mono, Polarity::Cold, 0.01, true).unwrap();
        assert_eq!(cold.count(), 4);
    }

    #[test]
    fn test_reference_geometry() {
        let frame = Image::filled(8, 6, 1, 0.1).unwrap();
        let maps = ReferenceMaps::build(&frame, false, Some(0.5), None).unwrap();
        assert!(maps.cold().is_none());
        assert!(maps.matches(&Image::new(8, 6, 3).unwrap()));
        assert!(maps.check_geometry(&Image::new(6, 8, 1).unwrap()).is_err());
    }

    #[test]
    fn test_auto_hot_single_pixel() {
        let background = 1000.0 / 65535.0;
        let mut img = Image::filled(32, 32, 1, background).unwrap();
        img.set_pixel(12, 20, 0, 1.0);
        let cancel = CancelToken::new();
        let derived = DerivedImages::compute(&img, Layout::Plain, true, false, &cancel).unwrap();
        let hot = auto_map(&img, &derived, Polarity::Hot, 3.0, &cancel).unwrap();
        assert_eq!(hot.count(), 1);
        assert!(hot.get(12, 20, 0));
    }

    #[test]
    fn test_auto_cold_single_pixel() {
        let mut img = Image::filled(32, 32, 1, 0.5).unwrap();
        img.set_pixel(3, 3, 0, 0.0);
        let cancel = CancelToken::new();
        let derived = DerivedImages::compute(&img, Layout::Plain, false, true, &cancel).unwrap();
        assert!(derived.average.is_none());
        let cold = auto_map(&img, &derived, Polarity::Cold, 3.0, &cancel).unwrap();
        assert_eq!(cold.count(), 1);
        assert!(cold.get(3, 3, 0));
    }
}
