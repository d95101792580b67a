//! Pixel replacement.
//!
//! Every flagged pixel is blended toward an estimate:
//!
//! ```text
//! target = estimate * amount + target * (1 - amount)
//! ```
//!
//! [`CorrectionPlan`] runs every enabled source against one image in a
//! fixed order per channel: reference hot, reference cold, auto hot, auto
//! cold, list. A pixel flagged by several sources is blended once per flag.
//!
//! | Source | Estimate |
//! |--------|----------|
//! | reference hot | mean of diagonal neighbors |
//! | reference cold | median of off-axis neighbors |
//! | auto hot | local mean image |
//! | auto cold | background median image |
//! | list | median of off-axis neighbors |
//!
//! Neighbor estimates are evaluated on the image as it is being corrected.

use crate::cancel::CancelToken;
use crate::defect::{DerivedImages, ReferenceMaps, auto_cold_plane, auto_hot_plane};
use crate::stats::{average_deviation, channel_median};
use crate::structure::{Layout, Shape, Statistic, StructuringElement};
use crate::{OpsError, OpsResult};
use cosmetic_core::{DefectMask, Image};
use tracing::{debug, trace};

fn check_amount(amount: f32) -> OpsResult<()> {
    if !(0.0..=1.0).contains(&amount) {
        return Err(OpsError::InvalidParameter(format!(
            "amount must be in [0, 1], got {}",
            amount
        )));
    }
    Ok(())
}

fn check_map(target: &Image, map: &DefectMask) -> OpsResult<()> {
    if target.bounds() != map.bounds() {
        return Err(OpsError::SizeMismatch(format!(
            "map {} does not match image {}",
            map.bounds(),
            target.bounds()
        )));
    }
    Ok(())
}

/// Blends flagged pixels of one plane toward `estimate`.
///
/// Returns the number of flagged pixels.
pub fn correct_plane(
    target: &mut [f32],
    map: &[bool],
    estimate: &[f32],
    width: usize,
    amount: f32,
    cancel: &CancelToken,
) -> OpsResult<usize> {
    if map.len() != target.len() || estimate.len() != target.len() {
        return Err(OpsError::SizeMismatch(format!(
            "plane of {} pixels, map {}, estimate {}",
            target.len(),
            map.len(),
            estimate.len()
        )));
    }
    let keep = 1.0 - amount;
    let mut count = 0;
    for (y, row) in target.chunks_mut(width.max(1)).enumerate() {
        cancel.check()?;
        let start = y * width;
        for (x, t) in row.iter_mut().enumerate() {
            if map[start + x] {
                *t = estimate[start + x] * amount + *t * keep;
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Blends flagged pixels toward a statistic of their neighbors, evaluated
/// on the plane as it is corrected.
#[allow(clippy::too_many_arguments)]
pub fn correct_plane_from_neighbors(
    target: &mut [f32],
    map: &[bool],
    width: usize,
    height: usize,
    element: &StructuringElement,
    statistic: Statistic,
    amount: f32,
    cancel: &CancelToken,
) -> OpsResult<usize> {
    if map.len() != target.len() || target.len() != width * height {
        return Err(OpsError::SizeMismatch(format!(
            "plane of {} pixels, map {}, expected {}x{}",
            target.len(),
            map.len(),
            width,
            height
        )));
    }
    let keep = 1.0 - amount;
    let mut scratch = Vec::with_capacity(element.len());
    let mut count = 0;
    for y in 0..height {
        cancel.check()?;
        for x in 0..width {
            let i = y * width + x;
            if !map[i] {
                continue;
            }
            count += 1;
            if let Some(v) = element.evaluate(target, width, height, x, y, statistic, &mut scratch) {
                target[i] = v * amount + target[i] * keep;
            }
        }
    }
    Ok(count)
}

/// Blends every flagged pixel of `target` toward `estimate`.
///
/// A map with fewer planes than the image is broadcast to every channel.
/// Returns the number of corrected samples.
///
/// # Example
///
/// ```rust
/// use cosmetic_core::{DefectMask, Image};
/// use cosmetic_ops::correct::correct;
///
/// let mut target = Image::filled(4, 4, 1, 0.9).unwrap();
/// let estimate = Image::filled(4, 4, 1, 0.1).unwrap();
/// let mut map = DefectMask::new(4, 4, 1).unwrap();
/// map.set(1, 1, 0, true);
///
/// assert_eq!(correct(&mut target, &map, &estimate, 1.0).unwrap(), 1);
/// assert_eq!(target.pixel(1, 1, 0), 0.1);
/// assert_eq!(target.pixel(0, 0, 0), 0.9);
/// ```
pub fn correct(target: &mut Image, map: &DefectMask, estimate: &Image, amount: f32) -> OpsResult<usize> {
    check_amount(amount)?;
    check_map(target, map)?;
    if !target.same_geometry(estimate) || estimate.channels() < target.channels() {
        return Err(OpsError::SizeMismatch(
            "estimate does not match target".into(),
        ));
    }
    let width = target.width() as usize;
    let cancel = CancelToken::new();
    let mut count = 0;
    for c in 0..target.channels() {
        count += correct_plane(
            target.channel_mut(c),
            map.channel(c),
            estimate.channel(c),
            width,
            amount,
            &cancel,
        )?;
    }
    Ok(count)
}

/// Auto-detection multipliers. `None` disables a polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AutoDetect {
    /// Hot multiplier `k_hot`.
    pub hot: Option<f64>,
    /// Cold multiplier `k_cold`.
    pub cold: Option<f64>,
}

impl AutoDetect {
    /// Returns `true` if either polarity is enabled.
    pub fn is_enabled(&self) -> bool {
        self.hot.is_some() || self.cold.is_some()
    }
}

/// Per-image correction settings and shared maps.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionPlan<'a> {
    /// Sensor layout.
    pub layout: Layout,
    /// Blend factor in `[0, 1]`.
    pub amount: f32,
    /// Reference maps, applied when the geometry matches.
    pub reference: Option<&'a ReferenceMaps>,
    /// Auto-detect settings.
    pub auto: AutoDetect,
    /// Explicit defect map for this geometry.
    pub list: Option<&'a DefectMask>,
}

impl<'a> CorrectionPlan<'a> {
    /// Plan with no detection source enabled.
    pub fn new(layout: Layout, amount: f32) -> Self {
        Self {
            layout,
            amount,
            reference: None,
            auto: AutoDetect::default(),
            list: None,
        }
    }

    /// Corrects `target` in place and returns the number of corrected
    /// samples.
    ///
    /// Derived images for auto-detection are computed from `target` before
    /// any change. `cancel` is checked once per row.
    pub fn run(&self, target: &mut Image, cancel: &CancelToken) -> OpsResult<usize> {
        check_amount(self.amount)?;
        if let Some(reference) = self.reference {
            reference.check_geometry(target)?;
        }
        if let Some(list) = self.list {
            check_map(target, list)?;
        }

        let (w, h) = (target.width() as usize, target.height() as usize);
        let derived = if self.auto.is_enabled() {
            DerivedImages::compute(
                target,
                self.layout,
                self.auto.hot.is_some(),
                self.auto.cold.is_some(),
                cancel,
            )?
        } else {
            DerivedImages::default()
        };
        let diagonal = StructuringElement::for_layout(self.layout, Shape::Diagonal);
        let off_axis = StructuringElement::for_layout(self.layout, Shape::OffAxis);

        let mut count = 0;
        let mut flags = vec![false; w * h];
        for c in 0..target.channels() {
            if let Some(map) = self.reference.and_then(ReferenceMaps::hot) {
                let n = correct_plane_from_neighbors(
                    target.channel_mut(c),
                    map.channel(c),
                    w,
                    h,
                    &diagonal,
                    Statistic::MEAN,
                    self.amount,
                    cancel,
                )?;
                trace!(channel = c, n, "reference hot");
                count += n;
            }
            if let Some(map) = self.reference.and_then(ReferenceMaps::cold) {
                let n = correct_plane_from_neighbors(
                    target.channel_mut(c),
                    map.channel(c),
                    w,
                    h,
                    &off_axis,
                    Statistic::Median,
                    self.amount,
                    cancel,
                )?;
                trace!(channel = c, n, "reference cold");
                count += n;
            }

            if self.auto.is_enabled() {
                let center = channel_median(target.channel(c));
                let dev = average_deviation(target.channel(c), center);
                debug!(channel = c, median = center, avg_dev = dev, "auto-detect noise");

                if let Some(k) = self.auto.hot {
                    cancel.check()?;
                    auto_hot_plane(
                        target.channel(c),
                        derived.average_plane(c)?,
                        derived.median_plane(c)?,
                        derived.background_plane(c)?,
                        w,
                        dev,
                        k,
                        &mut flags,
                        cancel,
                    )?;
                    let n = correct_plane(
                        target.channel_mut(c),
                        &flags,
                        derived.average_plane(c)?,
                        w,
                        self.amount,
                        cancel,
                    )?;
                    trace!(channel = c, n, "auto hot");
                    count += n;
                }
                if let Some(k) = self.auto.cold {
                    cancel.check()?;
                    auto_cold_plane(
                        target.channel(c),
                        derived.median_plane(c)?,
                        derived.background_plane(c)?,
                        w,
                        dev,
                        k,
                        &mut flags,
                        cancel,
                    )?;
                    let n = correct_plane(
                        target.channel_mut(c),
                        &flags,
                        derived.background_plane(c)?,
                        w,
                        self.amount,
                        cancel,
                    )?;
                    trace!(channel = c, n, "auto cold");
                    count += n;
                }
            }

            if let Some(map) = self.list {
                cancel.check()?;
                let n = correct_plane_from_neighbors(
                    target.channel_mut(c),
                    map.channel(c),
                    w,
                    h,
                    &off_axis,
                    Statistic::Median,
                    self.amount,
                    cancel,
                )?;
                trace!(channel = c, n, "defect list");
                count += n;
            }
        }
        Ok(count)
    }
}
