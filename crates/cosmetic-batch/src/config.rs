//! Batch configuration.
//!
//! A [`BatchConfig`] is plain data, (de)serialized as YAML. Every field has
//! a default, so a file only needs to name what it changes:
//!
//! ```yaml
//! targets:
//!   - path: lights/frame_001.tif
//!   - path: lights/frame_002.tif
//!     enabled: false
//! output_dir: corrected
//! auto_detect:
//!   enabled: true
//!   hot: { enabled: true, sigma: 3.0 }
//! defect_list:
//!   enabled: true
//!   defects:
//!     - { is_row: false, address: 1021 }
//! ```
//!
//! Reference thresholds take exactly one of `level`, `quantity` or `sigma`.
//! Quantity and sigma are resolved to a level against the calibration frame
//! when the run starts.

use crate::{BatchError, BatchResult};
use cosmetic_ops::threshold::{FrameStatistics, Polarity, quantity_to_level, sigma_to_level};
use cosmetic_ops::{AutoDetect, DefectItem, Layout};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Hot reference level used when none is given.
pub const DEFAULT_HOT_LEVEL: f64 = 1.0;
/// Cold reference level used when none is given.
pub const DEFAULT_COLD_LEVEL: f64 = 0.0;
/// Default auto-detect multiplier.
pub const DEFAULT_MULTIPLIER: f64 = 3.0;
/// Largest accepted auto-detect multiplier.
pub const MAX_MULTIPLIER: f64 = 50.0;

/// One target file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageItem {
    /// Disabled targets are counted as skipped.
    pub enabled: bool,
    /// File path.
    pub path: PathBuf,
}

impl Default for ImageItem {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::new(),
        }
    }
}

impl ImageItem {
    /// Enabled target.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: path.into(),
        }
    }
}

/// A reference threshold in one of its three forms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdSpec {
    /// Normalized level in `[0, 1]`.
    Level(f64),
    /// Number of calibration samples to flag.
    Quantity(u64),
    /// Distance from the frame mean in standard deviations.
    Sigma(f64),
}

impl ThresholdSpec {
    /// Resolves to a normalized level.
    pub fn resolve(self, polarity: Polarity, stats: &FrameStatistics) -> f64 {
        match self {
            ThresholdSpec::Level(level) => level,
            ThresholdSpec::Quantity(q) => quantity_to_level(q, polarity, stats),
            ThresholdSpec::Sigma(s) => sigma_to_level(s, stats.mean(), stats.std_dev(), polarity).clamp(0.0, 1.0),
        }
    }
}

/// Settings of one reference polarity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Build this map.
    pub enabled: bool,
    /// Threshold as a normalized level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    /// Threshold as a count of flagged samples.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    /// Threshold in standard deviations from the mean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,
}

impl ThresholdConfig {
    /// Enabled polarity with an explicit threshold.
    pub fn with(spec: ThresholdSpec) -> Self {
        let mut cfg = Self {
            enabled: true,
            ..Self::default()
        };
        match spec {
            ThresholdSpec::Level(l) => cfg.level = Some(l),
            ThresholdSpec::Quantity(q) => cfg.quantity = Some(q),
            ThresholdSpec::Sigma(s) => cfg.sigma = Some(s),
        }
        cfg
    }

    /// The configured threshold, or `Level(fallback)` when none is set.
    pub fn spec(&self, fallback: f64) -> BatchResult<ThresholdSpec> {
        match (self.level, self.quantity, self.sigma) {
            (None, None, None) => Ok(ThresholdSpec::Level(fallback)),
            (Some(l), None, None) => Ok(ThresholdSpec::Level(l)),
            (None, Some(q), None) => Ok(ThresholdSpec::Quantity(q)),
            (None, None, Some(s)) => Ok(ThresholdSpec::Sigma(s)),
            _ => Err(BatchError::Config(
                "give only one of level, quantity or sigma".into(),
            )),
        }
    }
}

/// Calibration-frame detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Use the calibration frame.
    pub enabled: bool,
    /// Calibration frame (master dark).
    pub path: Option<PathBuf>,
    /// Hot map settings.
    pub hot: ThresholdConfig,
    /// Cold map settings.
    pub cold: ThresholdConfig,
}

impl ReferenceConfig {
    /// Hot threshold, `None` if disabled.
    pub fn hot_spec(&self) -> BatchResult<Option<ThresholdSpec>> {
        self.hot
            .enabled
            .then(|| self.hot.spec(DEFAULT_HOT_LEVEL))
            .transpose()
    }

    /// Cold threshold, `None` if disabled.
    pub fn cold_spec(&self) -> BatchResult<Option<ThresholdSpec>> {
        self.cold
            .enabled
            .then(|| self.cold.spec(DEFAULT_COLD_LEVEL))
            .transpose()
    }
}

/// One auto-detect polarity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplierConfig {
    /// Detect this polarity.
    pub enabled: bool,
    /// Deviation multiplier.
    pub sigma: f64,
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sigma: DEFAULT_MULTIPLIER,
        }
    }
}

impl MultiplierConfig {
    /// Enabled polarity with multiplier `sigma`.
    pub fn with(sigma: f64) -> Self {
        Self { enabled: true, sigma }
    }
}

/// Per-target statistical detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDetectConfig {
    /// Use auto-detection.
    pub enabled: bool,
    /// Hot pixel multiplier.
    pub hot: MultiplierConfig,
    /// Cold pixel multiplier.
    pub cold: MultiplierConfig,
}

/// Explicit defect rows and columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectListConfig {
    /// Use the list.
    pub enabled: bool,
    /// Defects.
    pub defects: Vec<DefectItem>,
}

/// Everything a batch run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Target files, processed in order.
    pub targets: Vec<ImageItem>,
    /// Output directory. `None` writes next to each source.
    pub output_dir: Option<PathBuf>,
    /// Output file extension.
    pub output_extension: String,
    /// Prepended to output file names.
    pub prefix: String,
    /// Appended to output file names.
    pub postfix: String,
    /// Replace existing outputs instead of picking a free name.
    pub overwrite: bool,
    /// Targets are color-filter mosaics.
    pub cfa: bool,
    /// Blend factor in `[0, 1]`.
    pub amount: f64,
    /// Calibration-frame detection.
    pub reference: ReferenceConfig,
    /// Statistical detection.
    pub auto_detect: AutoDetectConfig,
    /// Explicit defects.
    pub defect_list: DefectListConfig,
    /// Worker threads, 0 for the hardware parallelism.
    pub threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            output_dir: None,
            output_extension: ".tif".into(),
            prefix: String::new(),
            postfix: "_cc".into(),
            overwrite: false,
            cfa: false,
            amount: 1.0,
            reference: ReferenceConfig::default(),
            auto_detect: AutoDetectConfig::default(),
            defect_list: DefectListConfig::default(),
            threads: 0,
        }
    }
}

impl BatchConfig {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> BatchResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> BatchResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Loads a YAML file.
    pub fn load(path: impl AsRef<Path>) -> BatchResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| BatchError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Writes a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> BatchResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_yaml()?)
            .map_err(|e| BatchError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Sensor layout.
    pub fn layout(&self) -> Layout {
        Layout::from_cfa(self.cfa)
    }

    /// Returns `true` if the calibration frame is used.
    pub fn reference_active(&self) -> bool {
        self.reference.enabled && (self.reference.hot.enabled || self.reference.cold.enabled)
    }

    /// Enabled auto-detect multipliers.
    pub fn auto_detect(&self) -> AutoDetect {
        let auto = &self.auto_detect;
        if !auto.enabled {
            return AutoDetect::default();
        }
        AutoDetect {
            hot: auto.hot.enabled.then_some(auto.hot.sigma),
            cold: auto.cold.enabled.then_some(auto.cold.sigma),
        }
    }

    /// Enabled defects, `None` if the list is off or has none.
    pub fn active_defects(&self) -> Option<Vec<DefectItem>> {
        if !self.defect_list.enabled {
            return None;
        }
        let defects: Vec<_> = self
            .defect_list
            .defects
            .iter()
            .filter(|d| d.enabled)
            .copied()
            .collect();
        (!defects.is_empty()).then_some(defects)
    }

    /// Worker threads to use.
    pub fn thread_count(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }

    /// Checks the configuration before a run.
    pub fn validate(&self) -> BatchResult<()> {
        if self.targets.is_empty() {
            return Err(BatchError::Config("no target frames have been specified".into()));
        }
        if !(0.0..=1.0).contains(&self.amount) {
            return Err(BatchError::Config(format!(
                "amount must be in [0, 1], got {}",
                self.amount
            )));
        }
        if let Some(dir) = &self.output_dir {
            if !dir.is_dir() {
                return Err(BatchError::Config(format!(
                    "the output directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        if self.reference_active() {
            let has_path = self
                .reference
                .path
                .as_ref()
                .is_some_and(|p| !p.as_os_str().is_empty());
            if !has_path {
                return Err(BatchError::Config("no calibration frame has been specified".into()));
            }
            for spec in [self.reference.hot_spec()?, self.reference.cold_spec()?]
                .into_iter()
                .flatten()
            {
                match spec {
                    ThresholdSpec::Level(l) if !(0.0..=1.0).contains(&l) => {
                        return Err(BatchError::Config(format!("level must be in [0, 1], got {}", l)));
                    }
                    ThresholdSpec::Sigma(s) if !s.is_finite() => {
                        return Err(BatchError::Config(format!("invalid sigma {}", s)));
                    }
                    _ => {}
                }
            }
        }

        let auto = self.auto_detect();
        for k in [auto.hot, auto.cold].into_iter().flatten() {
            if !(0.0..=MAX_MULTIPLIER).contains(&k) {
                return Err(BatchError::Config(format!(
                    "auto-detect multiplier must be in [0, {}], got {}",
                    MAX_MULTIPLIER, k
                )));
            }
        }

        if !self.reference_active() && !auto.is_enabled() && self.active_defects().is_none() {
            return Err(BatchError::Config(
                "nothing to do, choose a method for locating defective pixels".into(),
            ));
        }
        Ok(())
    }
}
