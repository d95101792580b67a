//! Calibration frame loading and reference map preparation.
//!
//! Every failure here is [`BatchError::Fatal`]: a run that was asked to
//! use a calibration frame never starts without one.

use crate::config::{BatchConfig, ThresholdSpec};
use crate::{BatchError, BatchResult};
use cosmetic_core::Image;
use cosmetic_io::ImageCodec;
use cosmetic_ops::threshold::{FrameStatistics, Polarity, ThresholdSummary};
use cosmetic_ops::ReferenceMaps;
use std::path::Path;
use tracing::{debug, info};

/// Reads the first image of a calibration frame.
pub fn load_calibration(codec: &dyn ImageCodec, path: &Path) -> BatchResult<Image> {
    let fatal = |e: cosmetic_io::IoError| BatchError::Fatal(format!("{}: {}", path.display(), e));
    let mut reader = codec.open(path).map_err(fatal)?;
    if reader.images().is_empty() {
        return Err(BatchError::Fatal(format!("{}: file contains no images", path.display())));
    }
    reader.select(0).map_err(fatal)?;
    let frame = reader.read().map_err(fatal)?;
    reader.close().map_err(fatal)?;
    if frame.width() == 0 || frame.height() == 0 {
        return Err(BatchError::Fatal(format!("{}: empty calibration frame", path.display())));
    }
    Ok(frame)
}

/// Resolves the enabled thresholds against `frame`.
///
/// Returns `(hot, cold)` levels; `None` for a disabled polarity.
pub fn resolve_levels(config: &BatchConfig, frame: &Image) -> BatchResult<(Option<f64>, Option<f64>)> {
    let hot = config.reference.hot_spec()?;
    let cold = config.reference.cold_spec()?;
    let stats = FrameStatistics::compute(frame, config.cfa);
    debug!(
        mean = stats.mean(),
        std_dev = stats.std_dev(),
        min_level = stats.min_level(),
        max_level = stats.max_level(),
        "Calibration statistics"
    );

    let resolve = |spec: Option<ThresholdSpec>, polarity: Polarity| {
        spec.map(|spec| {
            let level = spec.resolve(polarity, &stats);
            let summary = ThresholdSummary::from_level(level, polarity, &stats);
            info!(%polarity, ?spec, "Reference threshold {}", summary);
            level
        })
    };
    Ok((resolve(hot, Polarity::Hot), resolve(cold, Polarity::Cold)))
}

/// Loads the calibration frame and builds its maps, or `None` when the
/// reference path is off.
pub fn prepare(config: &BatchConfig, codec: &dyn ImageCodec) -> BatchResult<Option<ReferenceMaps>> {
    if !config.reference_active() {
        return Ok(None);
    }
    let path = config
        .reference
        .path
        .as_deref()
        .ok_or_else(|| BatchError::Fatal("no calibration frame has been specified".into()))?;
    info!(path = %path.display(), "Loading calibration frame");
    let frame = load_calibration(codec, path)?;
    let (hot, cold) = resolve_levels(config, &frame)?;
    let maps = ReferenceMaps::build(&frame, config.cfa, hot, cold)
        .map_err(|e| BatchError::Fatal(format!("{}: {}", path.display(), e)))?;
    Ok(Some(maps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageItem, ThresholdConfig};
    use cosmetic_io::MemoryCodec;
    use cosmetic_ops::stats::normalized_level;

    fn dark() -> Image {
        // levels 100..=199, one sample each
        let data = (100u16..200).map(|l| normalized_level(l) as f32).collect();
        Image::from_planar(10, 10, 1, data).unwrap()
    }

    fn config(hot: ThresholdSpec) -> BatchConfig {
        let mut cfg = BatchConfig {
            targets: vec![ImageItem::new("a.tif")],
            ..Default::default()
        };
        cfg.reference.enabled = true;
        cfg.reference.path = Some("dark.tif".into());
        cfg.reference.hot = ThresholdConfig::with(hot);
        cfg
    }

    #[test]
    fn test_quantity_resolves_against_frame() {
        let cfg = config(ThresholdSpec::Quantity(10));
        let (hot, cold) = resolve_levels(&cfg, &dark()).unwrap();
        assert_eq!(hot, Some(normalized_level(190)));
        assert_eq!(cold, None);
    }

    #[test]
    fn test_prepare_builds_maps() {
        let codec = MemoryCodec::new();
        codec.insert_image("dark.tif", dark());
        let maps = prepare(&config(ThresholdSpec::Quantity(10)), &codec).unwrap().unwrap();
        assert_eq!(maps.hot().unwrap().count(), 10);
        assert!(maps.cold().is_none());
    }

    #[test]
    fn test_missing_calibration_is_fatal() {
        let codec = MemoryCodec::new();
        let err = prepare(&config(ThresholdSpec::Level(0.5)), &codec).unwrap_err();
        assert!(matches!(err, BatchError::Fatal(_)));
    }

    #[test]
    fn test_inactive_reference_skips_loading() {
        let mut cfg = config(ThresholdSpec::Level(0.5));
        cfg.reference.enabled = false;
        assert!(prepare(&cfg, &MemoryCodec::new()).unwrap().is_none());
    }
}
