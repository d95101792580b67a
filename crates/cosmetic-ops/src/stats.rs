//! Sample statistics.
//!
//! Thresholds are expressed on a 16-bit scale: a normalized sample `v`
//! falls into histogram level `round(v * 65535)`.
//!
//! - [`Histogram`] - 65536-level counts of one channel
//! - [`median`], [`trimmed_mean`] - order statistics over a scratch slice
//! - [`average_deviation`] - mean absolute distance from a center value
//! - [`mean_std_dev`] - mean and sample standard deviation, optionally
//!   ignoring zero samples

/// Number of histogram levels.
pub const LEVELS: usize = 65536;

/// Highest histogram level.
pub const MAX_LEVEL: u16 = u16::MAX;

/// Histogram level of a normalized value.
///
/// ```rust
/// use cosmetic_ops::stats::histogram_level;
///
/// assert_eq!(histogram_level(0.0), 0);
/// assert_eq!(histogram_level(1.0), 65535);
/// assert_eq!(histogram_level(2.0), 65535);
/// assert_eq!(histogram_level(1000.0 / 65535.0), 1000);
/// ```
#[inline]
pub fn histogram_level(value: f64) -> u16 {
    (value.clamp(0.0, 1.0) * MAX_LEVEL as f64).round() as u16
}

/// Normalized value of a histogram level.
#[inline]
pub fn normalized_level(level: u16) -> f64 {
    level as f64 / MAX_LEVEL as f64
}

/// Per-level sample counts of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    /// Builds the histogram of a channel plane.
    pub fn from_samples(samples: &[f32]) -> Self {
        let mut counts = vec![0u64; LEVELS];
        for &v in samples {
            counts[histogram_level(v as f64) as usize] += 1;
        }
        Self { counts }
    }

    /// Samples at exactly `level`.
    #[inline]
    pub fn count(&self, level: u16) -> u64 {
        self.counts[level as usize]
    }

    /// Samples in `low..=high`. Empty when `low > high`.
    pub fn count_range(&self, low: u16, high: u16) -> u64 {
        if low > high {
            return 0;
        }
        self.counts[low as usize..=high as usize].iter().sum()
    }

    /// Total number of samples.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Lowest populated level.
    pub fn clip_low(&self) -> Option<u16> {
        self.counts.iter().position(|&c| c > 0).map(|i| i as u16)
    }

    /// Highest populated level.
    pub fn clip_high(&self) -> Option<u16> {
        self.counts.iter().rposition(|&c| c > 0).map(|i| i as u16)
    }
}

/// Median of `values`, reordering them.
///
/// An even count yields the mean of the two central values. Returns `0.0`
/// for an empty slice.
pub fn median(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower_max = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (lower_max + upper) / 2.0
    }
}

/// Mean of `values` after dropping `trim * n` samples from each end.
///
/// `trim = 0` is the plain mean. `trim` is clamped to `[0, 0.5)`; at least
/// one sample is always kept.
pub fn trimmed_mean(values: &mut [f32], trim: f32) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let k = ((trim.clamp(0.0, 0.5) * n as f32) as usize).min((n - 1) / 2);
    let kept: &[f32] = if k == 0 {
        values
    } else {
        values.sort_unstable_by(f32::total_cmp);
        &values[k..n - k]
    };
    let sum: f64 = kept.iter().map(|&v| v as f64).sum();
    (sum / kept.len() as f64) as f32
}

/// Median of a whole channel plane.
pub fn channel_median(plane: &[f32]) -> f64 {
    let mut scratch = plane.to_vec();
    median(&mut scratch) as f64
}

/// Mean absolute deviation of `plane` from `center`.
pub fn average_deviation(plane: &[f32], center: f64) -> f64 {
    if plane.is_empty() {
        return 0.0;
    }
    let sum: f64 = plane.iter().map(|&v| (v as f64 - center).abs()).sum();
    sum / plane.len() as f64
}

/// Mean and sample standard deviation.
///
/// With `reject_zero` set, samples equal to zero are left out; a CFA frame
/// stored as RGB carries zeros at the sites of the other two colors.
pub fn mean_std_dev(plane: &[f32], reject_zero: bool) -> (f64, f64) {
    let mut n = 0usize;
    let mut sum = 0.0f64;
    for &v in plane {
        if reject_zero && v <= 0.0 {
            continue;
        }
        n += 1;
        sum += v as f64;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var: f64 = plane
        .iter()
        .filter(|&&v| !(reject_zero && v <= 0.0))
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / (n - 1) as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_odd_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&mut []), 0.0);
    }

    #[test]
    fn test_trimmed_mean() {
        let mut v = [1.0, 2.0, 3.0, 100.0];
        assert_relative_eq!(trimmed_mean(&mut v, 0.0), 26.5);
        let mut v = [1.0, 2.0, 3.0, 100.0];
        assert_relative_eq!(trimmed_mean(&mut v, 0.25), 2.5);
    }

    #[test]
    fn test_histogram_ranges() {
        let samples: Vec<f32> = [0u16, 10, 10, 20, 65535]
            .iter()
            .map(|&l| normalized_level(l) as f32)
            .collect();
        let h = Histogram::from_samples(&samples);
        assert_eq!(h.total(), 5);
        assert_eq!(h.count(10), 2);
        assert_eq!(h.count_range(10, 20), 3);
        assert_eq!(h.count_range(20, 10), 0);
        assert_eq!(h.clip_low(), Some(0));
        assert_eq!(h.clip_high(), Some(65535));
    }

    #[test]
    fn test_average_deviation() {
        let plane = [1.0f32, 1.0, 1.0, 5.0];
        let m = channel_median(&plane);
        assert_relative_eq!(m, 1.0);
        assert_relative_eq!(average_deviation(&plane, m), 1.0);
    }

    #[test]
    fn test_mean_std_dev_rejects_zero() {
        let plane = [0.0f32, 0.0, 2.0, 4.0];
        let (mean, sd) = mean_std_dev(&plane, true);
        assert_relative_eq!(mean, 3.0);
        assert_relative_eq!(sd, 2.0f64.sqrt());
        let (mean, _) = mean_std_dev(&plane, false);
        assert_relative_eq!(mean, 1.5);
    }
}
