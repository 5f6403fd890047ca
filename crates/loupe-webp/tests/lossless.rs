/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! VP8L bitstreams in a simple file

mod common;

use common::{
    chunk, lossless, lossless_image, riff, vp8l_header, BitWriter, Group, BLUE, GREEN, RED
};
use loupe_core::bitmap::Bitmap;
use loupe_core::errors::DecodeErrors;
use loupe_core::plugin::DecoderPlugin;
use loupe_webp::WebpDecoder;

fn decode(vp8l: &[u8]) -> Result<Bitmap, DecodeErrors> {
    let data = riff(&[chunk(b"VP8L", vp8l)]);
    let mut decoder = WebpDecoder::create(&data)?;
    decoder.frame(0).map(|frame| frame.bitmap)
}

fn assert_pixels(bitmap: &Bitmap, expected: &[[u8; 4]]) {
    let (width, _) = bitmap.dimensions();
    for (i, pixel) in expected.iter().enumerate() {
        assert_eq!(bitmap.pixel(i % width, i / width), Some(*pixel), "pixel {i}");
    }
}

#[test]
fn literal_pixels() {
    let pixels = [RED, GREEN, BLUE, [10, 20, 30, 128]];
    let data = riff(&[chunk(b"VP8L", &lossless(2, 2, &pixels))]);

    let mut decoder = WebpDecoder::create(&data).unwrap();
    assert_eq!(decoder.size(), (2, 2));
    assert_eq!(decoder.frame_count(), 1);
    assert!(!decoder.is_animated());
    assert_eq!(decoder.loop_count(), None);
    assert!(decoder.metadata().is_none());
    assert_eq!(decoder.alpha_plane(0).unwrap(), None);

    let frame = decoder.frame(0).unwrap();
    assert_eq!(frame.bitmap.dimensions(), (2, 2));
    assert_pixels(&frame.bitmap, &pixels);
}

#[test]
fn unused_alpha_is_opaque() {
    let pixels = [[10, 20, 30, 128], [1, 2, 3, 0]];
    let bitmap = decode(&lossless_image(2, 1, &pixels, false)).unwrap();

    assert_pixels(&bitmap, &[[10, 20, 30, 255], [1, 2, 3, 255]]);
}

#[test]
fn colour_cache_and_backward_copy() {
    let mut writer = BitWriter::default();
    vp8l_header(&mut writer, 4, 2, false);
    // no transform
    writer.write(0, 1);
    // sixteen entry cache, red hashes to 5 and green to 11
    writer.write(1, 1);
    writer.write(4, 4);
    // one group
    writer.write(0, 1);

    let group = Group::write(&mut writer, &[RED, GREEN], 4, &[259, 285, 291], &[0]);
    group.literal(&mut writer, RED);
    group.literal(&mut writer, GREEN);
    group.green.put(&mut writer, 280 + 5);
    group.green.put(&mut writer, 280 + 11);
    // copy 4 pixels from a row up
    group.green.put(&mut writer, 256 + 3);
    group.distance.put(&mut writer, 0);

    let bitmap = decode(&writer.finish()).unwrap();
    assert_pixels(&bitmap, &[RED, GREEN, RED, GREEN, RED, GREEN, RED, GREEN]);
}

#[test]
fn copy_before_the_first_pixel() {
    let mut writer = BitWriter::default();
    vp8l_header(&mut writer, 2, 2, false);
    writer.write(0, 3);

    let group = Group::write(&mut writer, &[RED], 0, &[259], &[0]);
    group.literal(&mut writer, RED);
    // a row up from pixel 1 is before the image
    group.green.put(&mut writer, 256 + 3);
    group.distance.put(&mut writer, 0);

    assert!(matches!(decode(&writer.finish()), Err(DecodeErrors::Malformed(_))));
}

#[test]
fn palette_bundles_eight_pixels_per_byte() {
    let mut writer = BitWriter::default();
    vp8l_header(&mut writer, 11, 2, true);

    // colour indexing transform with two entries
    writer.write(1, 1);
    writer.write(3, 2);
    writer.write(1, 8);
    // the palette, blue stored as the difference to red
    writer.write(0, 1);
    let entries = [RED, [1, 0, 255, 0]];
    let group = Group::write(&mut writer, &entries, 0, &[], &[]);
    for entry in entries {
        group.literal(&mut writer, entry);
    }
    // no more transforms, no cache, no meta codes
    writer.write(0, 3);

    // 11 indices fit in two packed pixels per row
    let packed = [[0, 0x86, 0, 0], [0, 0x05, 0, 0], [0, 0xff, 0, 0], [0, 0x07, 0, 0]];
    let group = Group::write(&mut writer, &packed, 0, &[], &[]);
    for pixel in packed {
        group.literal(&mut writer, pixel);
    }

    let bitmap = decode(&writer.finish()).unwrap();
    assert_eq!(bitmap.dimensions(), (11, 2));

    let first_row = [0, 1, 1, 0, 0, 0, 0, 1, 1, 0, 1];
    for (x, index) in first_row.iter().enumerate() {
        let expected = if *index == 0 { RED } else { BLUE };
        assert_eq!(bitmap.pixel(x, 0), Some(expected), "x {x}");
        assert_eq!(bitmap.pixel(x, 1), Some(BLUE), "x {x}");
    }
}

#[test]
fn predictor_transform() {
    let mut writer = BitWriter::default();
    vp8l_header(&mut writer, 2, 2, false);

    // predictor on 4x4 blocks, the one block predicts from the top
    writer.write(1, 1);
    writer.write(0, 2);
    writer.write(0, 3);
    writer.write(0, 1);
    let mode = [0, 2, 0, 0];
    Group::write(&mut writer, &[mode], 0, &[], &[]).literal(&mut writer, mode);
    writer.write(0, 3);

    let residuals = [[10, 20, 30, 0], [5, 5, 5, 0], [1, 2, 3, 0], [0, 0, 1, 0]];
    let group = Group::write(&mut writer, &residuals, 0, &[], &[]);
    for residual in residuals {
        group.literal(&mut writer, residual);
    }

    let bitmap = decode(&writer.finish()).unwrap();
    assert_pixels(
        &bitmap,
        &[
            [10, 20, 30, 255],
            [15, 25, 35, 255],
            [11, 22, 33, 255],
            [15, 25, 36, 255]
        ]
    );
}

#[test]
fn entropy_image_selects_code_groups() {
    let mut writer = BitWriter::default();
    vp8l_header(&mut writer, 8, 1, false);
    // no transform, no cache
    writer.write(0, 2);
    // meta codes on 4x4 blocks
    writer.write(1, 1);
    writer.write(0, 3);

    writer.write(0, 1);
    let meta = [[0, 0, 0, 0], [0, 1, 0, 0]];
    let group = Group::write(&mut writer, &meta, 0, &[], &[]);
    for pixel in meta {
        group.literal(&mut writer, pixel);
    }
    // each group knows a single colour, its pixels take no bits
    Group::write(&mut writer, &[RED], 0, &[], &[]);
    Group::write(&mut writer, &[BLUE], 0, &[], &[]);

    let bitmap = decode(&writer.finish()).unwrap();
    assert_pixels(&bitmap, &[RED, RED, RED, RED, BLUE, BLUE, BLUE, BLUE]);
}

#[test]
fn transform_used_twice() {
    let mut writer = BitWriter::default();
    vp8l_header(&mut writer, 1, 1, false);
    // subtract green, twice
    writer.write(1, 1);
    writer.write(2, 2);
    writer.write(1, 1);
    writer.write(2, 2);
    writer.write(0, 3);
    Group::write(&mut writer, &[RED], 0, &[], &[]);

    assert!(matches!(decode(&writer.finish()), Err(DecodeErrors::Malformed(_))));
}

#[test]
fn damaged_streams() {
    let image = lossless(2, 2, &[RED, GREEN, BLUE, RED]);

    // header intact, pixels cut
    assert!(decode(&image[..image.len() / 2]).is_err());

    let mut bad_signature = image.clone();
    bad_signature[0] = 0x2e;
    assert!(decode(&bad_signature).is_err());
}
