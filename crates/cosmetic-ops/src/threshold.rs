//! Threshold conversions.
//!
//! A reference-map threshold can be given three ways: as a normalized
//! intensity level, as the number of calibration-frame samples it should
//! flag (quantity), or as a distance from the frame mean in standard
//! deviations (sigma). This module converts between them using the
//! calibration frame's [`FrameStatistics`].
//!
//! Hot thresholds flag samples at or above the level, cold thresholds flag
//! samples at or below it:
//!
//! ```text
//! hot sigma  = (level - mean) / sd
//! cold sigma = (mean - level) / sd
//! ```
//!
//! Quantity scans walk the histogram one level at a time, so a quantity
//! resolves to a level only up to histogram bucketing.

use crate::stats::{Histogram, MAX_LEVEL, histogram_level, mean_std_dev, normalized_level};
use crate::{OpsError, OpsResult};
use cosmetic_core::Image;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defect polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Abnormally bright.
    Hot,
    /// Abnormally dim.
    Cold,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Hot => f.write_str("hot"),
            Polarity::Cold => f.write_str("cold"),
        }
    }
}

/// Histograms and moments of a calibration frame.
#[derive(Debug, Clone)]
pub struct FrameStatistics {
    histograms: Vec<Histogram>,
    mean: f64,
    std_dev: f64,
    min_level: u16,
    max_level: u16,
    mosaic_color: bool,
}

impl FrameStatistics {
    /// Computes statistics of `frame`.
    ///
    /// Mean and standard deviation are averaged over channels. For a color
    /// frame zero samples are left out of both. `min_level`/`max_level`
    /// bracket the populated histogram range by one level on each side.
    pub fn compute(frame: &Image, cfa: bool) -> Self {
        let channels = frame.channels();
        let reject_zero = channels > 1;

        let mut histograms = Vec::with_capacity(channels as usize);
        let (mut mean, mut std_dev) = (0.0, 0.0);
        let mut low = MAX_LEVEL;
        let mut high = 0u16;
        for c in 0..channels {
            let plane = frame.channel(c);
            let (m, s) = mean_std_dev(plane, reject_zero);
            mean += m;
            std_dev += s;

            let h = Histogram::from_samples(plane);
            high = high.max(h.clip_high().unwrap_or(0));
            low = low.min(h.clip_low().unwrap_or(MAX_LEVEL));
            histograms.push(h);
        }

        Self {
            histograms,
            mean: mean / channels as f64,
            std_dev: std_dev / channels as f64,
            min_level: low.saturating_sub(1),
            max_level: high.saturating_add(1),
            mosaic_color: cfa && channels > 1,
        }
    }

    /// Per-channel histograms.
    pub fn histograms(&self) -> &[Histogram] {
        &self.histograms
    }

    /// Mean sample value.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// One level below the lowest populated level.
    pub fn min_level(&self) -> u16 {
        self.min_level
    }

    /// One level above the highest populated level.
    pub fn max_level(&self) -> u16 {
        self.max_level
    }

    fn count(&self, level: u16) -> u64 {
        self.histograms.iter().map(|h| h.count(level)).sum()
    }

    fn count_range(&self, low: u16, high: u16) -> u64 {
        self.histograms.iter().map(|h| h.count_range(low, high)).sum()
    }

    // Zero marks absent channels of a CFA frame stored as RGB.
    fn cold_floor(&self) -> u16 {
        if self.mosaic_color && self.min_level == 0 {
            1
        } else {
            self.min_level
        }
    }
}

/// Number of samples a threshold at `level` flags.
pub fn level_to_quantity(level: f64, polarity: Polarity, stats: &FrameStatistics) -> u64 {
    let level = histogram_level(level);
    match polarity {
        Polarity::Hot => stats.count_range(level, stats.max_level),
        Polarity::Cold => {
            let floor = stats.cold_floor();
            stats.count_range(floor, level.max(floor))
        }
    }
}

/// Level that flags at least `quantity` samples.
///
/// Hot scans downward from the top of the histogram, cold scans upward.
/// A quantity the frame cannot supply resolves to the end of the scan.
pub fn quantity_to_level(quantity: u64, polarity: Polarity, stats: &FrameStatistics) -> f64 {
    let mut count = 0u64;
    match polarity {
        Polarity::Hot => {
            for level in (stats.min_level..=stats.max_level).rev() {
                count += stats.count(level);
                if count >= quantity {
                    return normalized_level(level);
                }
            }
            normalized_level(stats.min_level)
        }
        Polarity::Cold => {
            for level in stats.cold_floor()..=stats.max_level {
                count += stats.count(level);
                if count >= quantity {
                    return normalized_level(level);
                }
            }
            normalized_level(stats.max_level)
        }
    }
}

/// Distance of `level` from `mean` in standard deviations.
pub fn level_to_sigma(level: f64, mean: f64, std_dev: f64, polarity: Polarity) -> OpsResult<f64> {
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return Err(OpsError::InvalidParameter(format!(
            "standard deviation must be positive, got {}",
            std_dev
        )));
    }
    Ok(match polarity {
        Polarity::Hot => (level - mean) / std_dev,
        Polarity::Cold => (mean - level) / std_dev,
    })
}

/// Level `sigma` standard deviations away from `mean`.
pub fn sigma_to_level(sigma: f64, mean: f64, std_dev: f64, polarity: Polarity) -> f64 {
    match polarity {
        Polarity::Hot => mean + sigma * std_dev,
        Polarity::Cold => mean - sigma * std_dev,
    }
}

/// One threshold in all three forms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSummary {
    /// Polarity.
    pub polarity: Polarity,
    /// Normalized level, snapped to the histogram grid.
    pub level: f64,
    /// Samples flagged at this level.
    pub quantity: u64,
    /// Equivalent sigma, `None` for a flat frame.
    pub sigma: Option<f64>,
}

impl ThresholdSummary {
    /// Summarizes a level against a frame.
    pub fn from_level(level: f64, polarity: Polarity, stats: &FrameStatistics) -> Self {
        let level = normalized_level(histogram_level(level));
        Self {
            polarity,
            level,
            quantity: level_to_quantity(level, polarity, stats),
            sigma: level_to_sigma(level, stats.mean(), stats.std_dev(), polarity).ok(),
        }
    }
}

impl fmt::Display for ThresholdSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Qty: {}, Level: {:.10}, Sigma: ", self.quantity, self.level)?;
        match self.sigma {
            Some(s) => write!(f, "{:.6}", s),
            None => f.write_str("n/a"),
        }
    }
}
