//! End-to-end batch runs against the in-memory codec.

use cosmetic_batch::config::{AutoDetectConfig, MultiplierConfig, ThresholdConfig};
use cosmetic_batch::{BatchConfig, BatchError, BatchEvent, BatchRunner, ImageItem, ThresholdSpec};
use cosmetic_core::Image;
use cosmetic_io::{Keyword, MemoryCodec, MemoryPage};
use cosmetic_ops::DefectItem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BACKGROUND: f32 = 1000.0 / 65535.0;

fn flat(w: u32, h: u32) -> Image {
    Image::filled(w, h, 1, BACKGROUND).unwrap()
}

fn with_hot_pixel(w: u32, h: u32, x: u32, y: u32) -> Image {
    let mut img = flat(w, h);
    img.set_pixel(x, y, 0, 1.0);
    img
}

fn auto_hot(targets: &[&str]) -> BatchConfig {
    BatchConfig {
        targets: targets.iter().map(|t| ImageItem::new(*t)).collect(),
        auto_detect: AutoDetectConfig {
            enabled: true,
            hot: MultiplierConfig::with(3.0),
            ..Default::default()
        },
        threads: 2,
        ..Default::default()
    }
}

fn runner(config: BatchConfig, codec: &MemoryCodec) -> BatchRunner {
    BatchRunner::new(config).with_codec(Arc::new(codec.clone()))
}

fn page(codec: &MemoryCodec, path: &str) -> MemoryPage {
    codec
        .get(Path::new(path))
        .unwrap_or_else(|| panic!("{} not written", path))
        .remove(0)
}

#[test]
fn single_hot_pixel_is_corrected() {
    let codec = MemoryCodec::new();
    codec.insert(
        "m31.tif",
        vec![MemoryPage::new(with_hot_pixel(100, 100, 37, 61)).with_keywords(vec![Keyword::new("EXPTIME", "300", "")])],
    );

    let report = runner(auto_hot(&["m31.tif"]), &codec).run().unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.corrected_pixels, 1);
    assert_eq!(report.outputs, vec![PathBuf::from("m31_cc.tif")]);
    assert!(report.is_complete());

    let out = page(&codec, "m31_cc.tif");
    assert_eq!(out.image.pixel(37, 61, 0), BACKGROUND);
    assert_eq!(out.image, flat(100, 100));
    assert_eq!(out.keywords[0], Keyword::new("EXPTIME", "300", ""));
    assert_eq!(
        out.keywords.last().unwrap().value,
        "CosmeticCorrection. Total corrected pixels 1"
    );
}

#[test]
fn full_row_list_corrects_every_column() {
    let codec = MemoryCodec::new();
    let mut img = flat(50, 50);
    for x in 0..50 {
        img.set_pixel(x, 20, 0, 0.0);
    }
    codec.insert_image("row.tif", img);

    let config = BatchConfig {
        targets: vec![ImageItem::new("row.tif")],
        defect_list: cosmetic_batch::config::DefectListConfig {
            enabled: true,
            defects: vec![DefectItem::row(20)],
        },
        ..Default::default()
    };
    let report = runner(config, &codec).run().unwrap();
    assert_eq!(report.corrected_pixels, 50);
    assert_eq!(page(&codec, "row_cc.tif").image, flat(50, 50));
}

#[test]
fn broken_targets_are_skipped() {
    let codec = MemoryCodec::new();
    codec.insert_image("good.tif", with_hot_pixel(16, 16, 8, 8));
    codec.insert_image("off.tif", flat(16, 16));
    codec.insert("empty.tif", Vec::new());
    codec.insert_image("corrupt.tif", flat(16, 16));
    codec.fail_reads("corrupt.tif");

    let mut config = auto_hot(&["good.tif", "off.tif", "missing.tif", "empty.tif", "corrupt.tif"]);
    config.targets[1].enabled = false;

    let mut skipped = Vec::new();
    let report = runner(config, &codec)
        .run_with(&mut |e: &BatchEvent| {
            if let BatchEvent::Skipped { path, .. } = e {
                skipped.push(path.clone());
            }
        })
        .unwrap();

    assert_eq!((report.succeeded, report.skipped, report.canceled), (1, 4, 0));
    assert!(!report.is_complete());
    assert_eq!(report.total(), 5);
    assert_eq!(skipped.len(), 4);
    assert!(codec.get(Path::new("good_cc.tif")).is_some());
    assert!(codec.get(Path::new("corrupt_cc.tif")).is_none());
}

#[test]
fn pool_bounds_running_tasks() {
    let codec = MemoryCodec::new();
    let names: Vec<String> = (0..8).map(|i| format!("f{}.tif", i)).collect();
    for name in &names {
        codec.insert_image(name.as_str(), with_hot_pixel(24, 24, 5, 5));
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut config = auto_hot(&refs);
    config.threads = 3;

    let mut max_running = 0;
    let report = runner(config, &codec)
        .run_with(&mut |e: &BatchEvent| {
            if let BatchEvent::TaskStarted { running, .. } = e {
                max_running = max_running.max(*running);
            }
        })
        .unwrap();

    assert_eq!(report.pool_size, 3);
    assert!(max_running <= 3);
    assert!(report.peak_running <= 3);
    assert_eq!(report.succeeded, 8);
    assert_eq!(report.corrected_pixels, 8);
}

#[test]
fn cancel_discards_running_outputs() {
    let codec = MemoryCodec::new();
    let names: Vec<String> = (0..6).map(|i| format!("c{}.tif", i)).collect();
    for name in &names {
        codec.insert_image(name.as_str(), with_hot_pixel(64, 64, 10, 10));
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let runner = runner(auto_hot(&refs), &codec);
    let token = runner.cancel_token();
    let mut aborting = 0;
    let report = runner
        .run_with(&mut |e: &BatchEvent| match e {
            BatchEvent::TaskStarted { .. } => token.cancel(),
            BatchEvent::Aborting { .. } => aborting += 1,
            _ => {}
        })
        .unwrap();

    assert_eq!(aborting, 1);
    assert_eq!(report.total(), 6);
    assert_eq!(report.canceled, 6);
    assert!(report.outputs.is_empty());
    assert!(codec.paths().iter().all(|p| !p.to_string_lossy().contains("_cc")));
}

#[test]
fn cancel_during_loop_pass_writes_nothing() {
    let codec = MemoryCodec::new();
    codec.insert_image("a.tif", with_hot_pixel(64, 64, 10, 10));
    codec.insert_image("b.tif", with_hot_pixel(64, 64, 20, 20));

    let runner = runner(auto_hot(&["a.tif", "b.tif"]), &codec);
    let token = runner.cancel_token();
    let report = runner
        .run_with(&mut |e: &BatchEvent| {
            if let BatchEvent::Opened { path, .. } = e {
                if path == Path::new("b.tif") {
                    token.cancel();
                }
            }
        })
        .unwrap();

    assert_eq!((report.succeeded, report.canceled), (0, 2));
    assert!(report.outputs.is_empty());
    assert!(codec.get(Path::new("a_cc.tif")).is_none());
}

#[test]
fn subimages_get_numbered_outputs() {
    let codec = MemoryCodec::new();
    codec.insert(
        "stack.tif",
        vec![
            MemoryPage::new(with_hot_pixel(20, 20, 3, 3)),
            MemoryPage::new(with_hot_pixel(20, 20, 4, 4)),
        ],
    );
    codec.insert_image("stack_cc.tif", flat(2, 2));

    let report = runner(auto_hot(&["stack.tif"]), &codec).run().unwrap();
    assert_eq!(report.succeeded, 1);
    let mut outputs = report.outputs.clone();
    outputs.sort();
    assert_eq!(
        outputs,
        vec![PathBuf::from("stack_02_cc.tif"), PathBuf::from("stack_cc_1.tif")]
    );
}

#[test]
fn overwrite_replaces_existing_output() {
    let codec = MemoryCodec::new();
    codec.insert_image("a.tif", with_hot_pixel(20, 20, 3, 3));
    codec.insert_image("a_cc.tif", flat(2, 2));
    let mut config = auto_hot(&["a.tif"]);
    config.overwrite = true;

    runner(config, &codec).run().unwrap();
    assert_eq!(page(&codec, "a_cc.tif").image.width(), 20);
}

#[test]
fn failed_write_is_reported_and_removed() {
    let codec = MemoryCodec::new();
    codec.insert_image("a.tif", with_hot_pixel(20, 20, 3, 3));
    codec.fail_writes("a_cc.tif");

    let mut failures = 0;
    let report = runner(auto_hot(&["a.tif"]), &codec)
        .run_with(&mut |e: &BatchEvent| {
            if matches!(e, BatchEvent::TaskFailed { .. }) {
                failures += 1;
            }
        })
        .unwrap();
    assert_eq!(failures, 1);
    assert_eq!(report.skipped, 1);
    assert!(!codec.paths().contains(&PathBuf::from("a_cc.tif")));
}

fn reference_config(targets: &[&str], hot: ThresholdSpec) -> BatchConfig {
    let mut config = BatchConfig {
        targets: targets.iter().map(|t| ImageItem::new(*t)).collect(),
        ..Default::default()
    };
    config.reference.enabled = true;
    config.reference.path = Some("dark.tif".into());
    config.reference.hot = ThresholdConfig::with(hot);
    config
}

#[test]
fn reference_map_drives_correction() {
    let codec = MemoryCodec::new();
    let mut dark = Image::filled(30, 30, 1, 0.001).unwrap();
    dark.set_pixel(7, 9, 0, 0.5);
    dark.set_pixel(20, 3, 0, 0.6);
    codec.insert_image("dark.tif", dark);

    let mut light = flat(30, 30);
    light.set_pixel(7, 9, 0, 0.9);
    light.set_pixel(20, 3, 0, 0.8);
    codec.insert_image("light.tif", light);
    codec.insert_image("small.tif", flat(10, 10));

    let config = reference_config(&["light.tif", "small.tif"], ThresholdSpec::Quantity(2));
    let report = runner(config, &codec).run().unwrap();

    assert_eq!((report.succeeded, report.skipped), (1, 1));
    assert_eq!(report.corrected_pixels, 2);
    assert_eq!(page(&codec, "light_cc.tif").image, flat(30, 30));
}

#[test]
fn missing_calibration_is_fatal() {
    let codec = MemoryCodec::new();
    codec.insert_image("light.tif", flat(8, 8));
    let config = reference_config(&["light.tif"], ThresholdSpec::Level(0.5));
    let err = runner(config, &codec).run().unwrap_err();
    assert!(matches!(err, BatchError::Fatal(_)));
    assert!(codec.get(Path::new("light_cc.tif")).is_none());
}

#[test]
fn invalid_config_is_rejected_before_start() {
    let codec = MemoryCodec::new();
    let config = BatchConfig {
        targets: vec![ImageItem::new("a.tif")],
        ..Default::default()
    };
    assert!(matches!(runner(config, &codec).run(), Err(BatchError::Config(_))));
}
