//! TIFF codec tests against real files on disk.

#![cfg(feature = "tiff")]

use approx::assert_abs_diff_eq;
use cosmetic_core::Image;
use cosmetic_io::{IccProfile, ImageCodec, ImageOptions, Keyword, TiffCodec, codec_for_path};
use std::fs::File;
use tempfile::TempDir;
use tiff::encoder::{TiffEncoder, colortype};

#[test]
fn multi_page_file_lists_every_page() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stack.tif");

    let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray16>(4, 3, &[1000u16; 12])
        .unwrap();
    encoder
        .write_image::<colortype::RGB8>(2, 2, &[255u8; 12])
        .unwrap();
    drop(encoder);

    let mut reader = TiffCodec.open(&path).unwrap();
    let images = reader.images().to_vec();
    assert_eq!(images.len(), 2);
    assert_eq!((images[0].width, images[0].height, images[0].channels), (4, 3, 1));
    assert_eq!(images[0].options.bits_per_sample, 16);
    assert_eq!((images[1].width, images[1].height, images[1].channels), (2, 2, 3));

    reader.select(1).unwrap();
    let rgb = reader.read().unwrap();
    assert_eq!(rgb.channels(), 3);
    assert_abs_diff_eq!(rgb.pixel(1, 1, 2), 1.0);

    reader.select(0).unwrap();
    let gray = reader.read().unwrap();
    assert_abs_diff_eq!(gray.pixel(0, 0, 0), 1000.0 / 65535.0, epsilon = 1e-6);

    assert!(reader.select(2).is_err());
    reader.close().unwrap();
}

#[test]
fn keywords_and_profile_survive_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.tif");
    let codec = codec_for_path(&path).unwrap();

    let mut image = Image::filled(5, 4, 1, 0.25).unwrap();
    image.set_pixel(2, 1, 0, 0.75);
    let keywords = vec![
        Keyword::new("EXPTIME", "120", "seconds"),
        Keyword::comment("CosmeticCorrection with cosmetic 0.1.0"),
        Keyword::history("CosmeticCorrection. Total corrected pixels 1"),
    ];
    let icc = IccProfile(vec![0, 1, 2, 3, 250]);

    let mut writer = codec.create(&path).unwrap();
    writer.set_options(&ImageOptions::default()).unwrap();
    writer.write_keywords(&keywords).unwrap();
    writer.write_icc_profile(&icc).unwrap();
    writer.write_image(&image).unwrap();
    writer.close().unwrap();

    let mut reader = codec.open(&path).unwrap();
    reader.select(0).unwrap();
    assert_eq!(reader.read_keywords().unwrap(), keywords);
    assert_eq!(reader.read_icc_profile().unwrap(), Some(icc));
    let back = reader.read().unwrap();
    assert_abs_diff_eq!(back.pixel(2, 1, 0), 0.75, epsilon = 1e-4);
    assert_abs_diff_eq!(back.pixel(0, 0, 0), 0.25, epsilon = 1e-4);
}

#[test]
fn float_output_keeps_precision() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("float.tif");

    let image = Image::filled(3, 3, 3, 0.123_456).unwrap();
    let mut writer = TiffCodec.create(&path).unwrap();
    writer
        .set_options(&ImageOptions {
            bits_per_sample: 32,
            float_sample: true,
        })
        .unwrap();
    writer.write_image(&image).unwrap();
    writer.close().unwrap();

    let mut reader = TiffCodec.open(&path).unwrap();
    assert!(reader.images()[0].options.float_sample);
    reader.select(0).unwrap();
    assert_eq!(reader.read().unwrap(), image);
    assert!(reader.read_keywords().unwrap().is_empty());
    assert_eq!(reader.read_icc_profile().unwrap(), None);
}

#[test]
fn writer_without_image_fails_on_close() {
    let dir = TempDir::new().unwrap();
    let writer = TiffCodec.create(&dir.path().join("empty.tif")).unwrap();
    assert!(writer.close().is_err());
}

#[test]
fn integer_32_bit_source_is_written_as_integer() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("u32.tif");
    let mut encoder = TiffEncoder::new(File::create(&src).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray32>(2, 2, &[0u32, u32::MAX / 2, u32::MAX, 7])
        .unwrap();
    drop(encoder);

    let mut reader = TiffCodec.open(&src).unwrap();
    let options = reader.images()[0].options;
    assert_eq!(options.bits_per_sample, 32);
    assert!(!options.float_sample);
    reader.select(0).unwrap();
    let image = reader.read().unwrap();
    assert_abs_diff_eq!(image.pixel(0, 1, 0), 1.0);

    let out = dir.path().join("u32_cc.tif");
    let mut writer = TiffCodec.create(&out).unwrap();
    writer.set_options(&options).unwrap();
    writer.write_image(&image).unwrap();
    writer.close().unwrap();

    let reader = TiffCodec.open(&out).unwrap();
    assert_eq!(reader.images()[0].options, options);
}
