//! Batch runs on real TIFF files.

use approx::assert_abs_diff_eq;
use cosmetic_batch::config::{AutoDetectConfig, MultiplierConfig};
use cosmetic_batch::{BatchConfig, BatchRunner, ImageItem};
use cosmetic_io::{ImageCodec, TiffCodec};
use std::fs::File;
use std::path::Path;
use tempfile::TempDir;
use tiff::encoder::{TiffEncoder, colortype};

const W: u32 = 40;
const H: u32 = 30;

fn write_frame(path: &Path, hot: &[(u32, u32)]) {
    let mut data = vec![1000u16; (W * H) as usize];
    for &(x, y) in hot {
        data[(y * W + x) as usize] = 65535;
    }
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder.write_image::<colortype::Gray16>(W, H, &data).unwrap();
}

fn config(targets: Vec<ImageItem>, out: &Path) -> BatchConfig {
    BatchConfig {
        targets,
        output_dir: Some(out.to_path_buf()),
        auto_detect: AutoDetectConfig {
            enabled: true,
            hot: MultiplierConfig::with(3.0),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn corrects_and_writes_tiff() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let source = dir.path().join("light_001.tif");
    write_frame(&source, &[(5, 7), (30, 20)]);

    let report = BatchRunner::new(config(vec![ImageItem::new(&source)], &out))
        .run()
        .unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.corrected_pixels, 2);

    let output = out.join("light_001_cc.tif");
    assert_eq!(report.outputs, vec![output.clone()]);

    let mut reader = TiffCodec.open(&output).unwrap();
    assert_eq!(reader.images()[0].options.bits_per_sample, 16);
    reader.select(0).unwrap();
    let image = reader.read().unwrap();
    for (x, y) in [(5, 7), (30, 20), (0, 0)] {
        assert_abs_diff_eq!(image.pixel(x, y, 0), 1000.0 / 65535.0, epsilon = 1e-6);
    }
    let keywords = reader.read_keywords().unwrap();
    assert!(
        keywords
            .iter()
            .any(|k| k.value == "CosmeticCorrection. Total corrected pixels 2")
    );
}

#[test]
fn second_run_picks_a_free_name() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("frame.tif");
    write_frame(&source, &[(1, 1)]);

    let cfg = config(vec![ImageItem::new(&source)], dir.path());
    BatchRunner::new(cfg.clone()).run().unwrap();
    let report = BatchRunner::new(cfg).run().unwrap();

    assert_eq!(report.outputs, vec![dir.path().join("frame_cc_1.tif")]);
    assert!(dir.path().join("frame_cc.tif").exists());
}

#[test]
fn unreadable_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.tif");
    write_frame(&good, &[(3, 3)]);
    let junk = dir.path().join("junk.tif");
    std::fs::write(&junk, b"not a tiff").unwrap();

    let targets = vec![ImageItem::new(&junk), ImageItem::new(&good)];
    let report = BatchRunner::new(config(targets, dir.path())).run().unwrap();

    assert_eq!((report.succeeded, report.skipped), (1, 1));
    assert!(!dir.path().join("junk_cc.tif").exists());
}
