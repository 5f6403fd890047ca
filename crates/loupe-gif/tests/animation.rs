/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Animated GIFs built in memory

use loupe_core::animation::DecodeState;
use loupe_core::bitmap::Rect;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::{Blend, Disposal};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::DecoderPlugin;
use loupe_gif::GifDecoder;
use xxhash_rust::xxh3::xxh3_64;

const RED: [u8; 3] = [255, 0, 0];
const GREEN: [u8; 3] = [0, 255, 0];
const BLUE: [u8; 3] = [0, 0, 255];
const WHITE: [u8; 3] = [255, 255, 255];

const PALETTE: [[u8; 3]; 4] = [RED, GREEN, BLUE, WHITE];

#[derive(Default)]
struct LsbWriter {
    bytes: Vec<u8>,
    acc:   u64,
    bits:  u32
}

impl LsbWriter {
    fn write(&mut self, value: u32, width: u32) {
        self.acc |= u64::from(value) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

/// Encode every index as a literal, clearing before the code width grows
fn lzw_literals(indices: &[u8], min_code_size: u8) -> Vec<u8> {
    let clear = 1_u32 << min_code_size;
    let width = u32::from(min_code_size) + 1;
    let per_run = (1_usize << width) - (clear as usize + 2);

    let mut writer = LsbWriter::default();
    for run in indices.chunks(per_run) {
        writer.write(clear, width);
        for index in run {
            writer.write(u32::from(*index), width);
        }
    }
    writer.write(clear + 1, width);
    writer.finish()
}

struct GifBuilder {
    bytes: Vec<u8>
}

impl GifBuilder {
    /// A canvas with the four colour global table
    fn new(width: u16, height: u16) -> GifBuilder {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        // global table of 2 << 1 entries
        bytes.extend_from_slice(&[0x81, 0, 0]);
        bytes.extend(PALETTE.iter().flatten());
        GifBuilder { bytes }
    }

    fn looping(mut self, loops: u16) -> GifBuilder {
        self.bytes.extend_from_slice(&[0x21, 0xFF, 11]);
        self.bytes.extend_from_slice(b"NETSCAPE2.0");
        self.bytes.extend_from_slice(&[3, 1]);
        self.bytes.extend_from_slice(&loops.to_le_bytes());
        self.bytes.push(0);
        self
    }

    fn comment(mut self, text: &str) -> GifBuilder {
        self.bytes.extend_from_slice(&[0x21, 0xFE, text.len() as u8]);
        self.bytes.extend_from_slice(text.as_bytes());
        self.bytes.push(0);
        self
    }

    fn control(mut self, disposal: u8, delay: u16, transparent: Option<u8>) -> GifBuilder {
        let packed = (disposal << 2) | u8::from(transparent.is_some());
        self.bytes.extend_from_slice(&[0x21, 0xF9, 4, packed]);
        self.bytes.extend_from_slice(&delay.to_le_bytes());
        self.bytes.extend_from_slice(&[transparent.unwrap_or(0), 0]);
        self
    }

    fn image(self, region: (u16, u16, u16, u16), indices: &[u8]) -> GifBuilder {
        self.image_with(region, 0, &lzw_literals(indices, 2))
    }

    fn image_with(mut self, region: (u16, u16, u16, u16), packed: u8, lzw: &[u8]) -> GifBuilder {
        self.bytes.push(0x2C);
        for value in [region.0, region.1, region.2, region.3] {
            self.bytes.extend_from_slice(&value.to_le_bytes());
        }
        self.bytes.push(packed);
        self.bytes.push(2);
        for block in lzw.chunks(255) {
            self.bytes.push(block.len() as u8);
            self.bytes.extend_from_slice(block);
        }
        self.bytes.push(0);
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.bytes.push(0x3B);
        self.bytes
    }
}

fn rgba(rgb: [u8; 3]) -> Option<[u8; 4]> {
    Some([rgb[0], rgb[1], rgb[2], 255])
}

/// Four frames on a 4x4 canvas exercising every disposal
fn four_frames() -> Vec<u8> {
    GifBuilder::new(4, 4)
        .looping(0)
        .control(1, 40, None)
        .image((0, 0, 4, 4), &[0; 16])
        .control(3, 20, Some(3))
        .image((1, 1, 2, 2), &[1, 3, 3, 1])
        .control(2, 1, None)
        .image((0, 0, 2, 2), &[2; 4])
        .control(0, 0, None)
        .image((2, 2, 2, 2), &[3; 4])
        .finish()
}

#[test]
fn structure_is_known_before_decoding() {
    let data = four_frames();
    let decoder = GifDecoder::create(&data).unwrap();

    assert_eq!(decoder.size(), (4, 4));
    assert_eq!(decoder.frame_count(), 4);
    assert!(decoder.is_animated());
    assert_eq!(decoder.loop_count(), Some(0));

    let info = decoder.frame_info(1).unwrap();
    assert_eq!(info.region, Rect::new(1, 1, 2, 2));
    assert_eq!(info.duration, 200);
    assert_eq!(info.disposal, Disposal::RestorePrevious);
    assert_eq!(info.blend, Blend::SourceOver);
    assert_eq!(
        decoder.frame_info(4).unwrap_err(),
        DecodeErrors::OutOfRange { index: 4, count: 4 }
    );
    assert_eq!(decoder.decode_state(), DecodeState::HeaderParsed);
}

#[test]
fn disposal_and_transparency() {
    let data = four_frames();
    let mut decoder = GifDecoder::create(&data).unwrap();

    let first = decoder.frame(0).unwrap();
    assert_eq!(first.duration, 400);
    assert_eq!(first.blend, Blend::SourceOver);
    assert!(first.bitmap.pixels().chunks_exact(4).all(|px| px == [255, 0, 0, 255]));

    // transparent index 3 shows the red frame underneath
    let second = decoder.frame(1).unwrap();
    assert_eq!(second.duration, 200);
    assert_eq!(second.disposal, Disposal::RestorePrevious);
    assert_eq!(second.region, Rect::new(1, 1, 2, 2));
    assert_eq!(second.bitmap.pixel(1, 1), rgba(GREEN));
    assert_eq!(second.bitmap.pixel(2, 1), rgba(RED));
    assert_eq!(second.bitmap.pixel(2, 2), rgba(GREEN));

    // frame 1 restored before drawing
    let third = decoder.frame(2).unwrap();
    assert_eq!(third.duration, 100);
    assert_eq!(third.bitmap.pixel(1, 1), rgba(BLUE));
    assert_eq!(third.bitmap.pixel(2, 2), rgba(RED));

    // frame 2 cleared to transparent
    let fourth = decoder.frame(3).unwrap();
    assert_eq!(fourth.bitmap.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(fourth.bitmap.pixel(1, 1), Some([0, 0, 0, 0]));
    assert_eq!(fourth.bitmap.pixel(3, 0), rgba(RED));
    assert_eq!(fourth.bitmap.pixel(3, 3), rgba(WHITE));
    assert_eq!(decoder.decode_state(), DecodeState::Exhausted);
}

#[test]
fn background_disposal_leaves_transparent_canvas() {
    let data = GifBuilder::new(4, 4)
        .control(2, 10, None)
        .image((0, 0, 4, 4), &[0; 16])
        .control(0, 10, None)
        .image((1, 1, 2, 2), &[2; 4])
        .finish();
    let mut decoder = GifDecoder::create(&data).unwrap();
    let bitmap = decoder.frame(1).unwrap().bitmap;

    for y in 0..4 {
        for x in 0..4 {
            let expected = if Rect::new(1, 1, 2, 2).contains(x, y) {
                rgba(BLUE)
            } else {
                Some([0, 0, 0, 0])
            };
            assert_eq!(bitmap.pixel(x, y), expected, "pixel ({x},{y})");
        }
    }
}

#[test]
fn replay_matches_sequential_access() {
    let data = four_frames();

    let mut sequential = GifDecoder::create(&data).unwrap();
    let hashes: Vec<u64> = (0..4)
        .map(|i| xxh3_64(sequential.frame(i).unwrap().bitmap.pixels()))
        .collect();

    let mut random = GifDecoder::create(&data).unwrap();
    for i in [3, 1, 2, 0, 3, 2] {
        let frame = random.frame(i).unwrap();
        assert_eq!(xxh3_64(frame.bitmap.pixels()), hashes[i], "frame {i}");
    }

    // same index twice
    let again = xxh3_64(random.frame(2).unwrap().bitmap.pixels());
    assert_eq!(again, hashes[2]);
}

#[test]
fn interlaced_rows() {
    // rows 0, 4, 2, 1, 3 in storage order
    let data = GifBuilder::new(1, 5)
        .image_with((0, 0, 1, 5), 0x40, &lzw_literals(&[0, 0, 2, 1, 3], 2))
        .finish();
    let mut decoder = GifDecoder::create(&data).unwrap();
    let bitmap = decoder.frame(0).unwrap().bitmap;

    assert_eq!(bitmap.pixel(0, 0), rgba(RED));
    assert_eq!(bitmap.pixel(0, 1), rgba(GREEN));
    assert_eq!(bitmap.pixel(0, 2), rgba(BLUE));
    assert_eq!(bitmap.pixel(0, 3), rgba(WHITE));
    assert_eq!(bitmap.pixel(0, 4), rgba(RED));
}

#[test]
fn corrupt_later_frame_keeps_earlier_ones() {
    // clear followed by code 7, which is not in the table yet
    let mut bad = LsbWriter::default();
    bad.write(4, 3);
    bad.write(7, 3);
    let bad = bad.finish();

    let data = GifBuilder::new(2, 2)
        .image((0, 0, 2, 2), &[1; 4])
        .image_with((0, 0, 2, 2), 0, &bad)
        .finish();
    let mut decoder = GifDecoder::create(&data).unwrap();
    assert_eq!(decoder.frame_count(), 2);

    let err = decoder.frame(1).unwrap_err();
    assert!(matches!(err, DecodeErrors::InvalidCode(_)));
    assert_eq!(decoder.frame(1).unwrap_err(), err);
    assert_eq!(decoder.decode_state(), DecodeState::Errored(1));

    let first = decoder.frame(0).unwrap();
    assert_eq!(first.bitmap.pixel(1, 1), rgba(GREEN));
}

#[test]
fn data_cut_after_the_last_pixel() {
    // every pixel but no end code, and the file stops after the data
    let mut lzw = LsbWriter::default();
    for code in [4, 2, 2, 4, 2, 2] {
        lzw.write(code, 3);
    }
    let mut data = GifBuilder::new(2, 2)
        .image_with((0, 0, 2, 2), 0, &lzw.finish())
        .finish();
    // block terminator and trailer
    data.truncate(data.len() - 2);

    let mut decoder = GifDecoder::create(&data).unwrap();
    let frame = decoder.frame(0).unwrap();
    assert_eq!(frame.bitmap.pixel(1, 1), rgba(BLUE));
}

#[test]
fn data_cut_before_the_last_pixel() {
    let mut data = GifBuilder::new(8, 8).image((0, 0, 8, 8), &[1; 64]).finish();
    data.truncate(data.len() - 12);

    let mut decoder = GifDecoder::create(&data).unwrap();
    assert_eq!(decoder.frame(0).unwrap_err(), DecodeErrors::Truncated);
}

#[test]
fn early_end_code() {
    // end code after one of four pixels
    let mut lzw = LsbWriter::default();
    lzw.write(4, 3);
    lzw.write(1, 3);
    lzw.write(5, 3);
    let lzw = lzw.finish();

    let data = GifBuilder::new(2, 2).image_with((0, 0, 2, 2), 0, &lzw).finish();

    let mut decoder = GifDecoder::create(&data).unwrap();
    assert_eq!(decoder.frame(0).unwrap_err(), DecodeErrors::Truncated);
    assert_eq!(decoder.decode_state(), DecodeState::Errored(0));

    let options = DecoderOptions::default().set_strict_mode(true);
    let mut decoder = GifDecoder::create_with_options(&data, options).unwrap();
    assert_eq!(decoder.frame(0).unwrap_err(), DecodeErrors::Truncated);
}

#[test]
fn single_pixel_for_a_two_pixel_frame() {
    let mut lzw = LsbWriter::default();
    lzw.write(4, 3);
    lzw.write(1, 3);
    lzw.write(5, 3);
    let lzw = lzw.finish();

    let data = GifBuilder::new(2, 1).image_with((0, 0, 2, 1), 0, &lzw).finish();

    let mut decoder = GifDecoder::create(&data).unwrap();
    assert_eq!(decoder.frame_count(), 1);
    assert!(matches!(decoder.frame(0), Err(DecodeErrors::Truncated)));
}

#[test]
fn frame_limit_and_range() {
    let data = four_frames();
    let options = DecoderOptions::default().set_max_frames(3);
    assert!(matches!(
        GifDecoder::create_with_options(&data, options),
        Err(DecodeErrors::Malformed(_))
    ));

    let mut decoder = GifDecoder::create(&data).unwrap();
    assert_eq!(
        decoder.frame(4).unwrap_err(),
        DecodeErrors::OutOfRange { index: 4, count: 4 }
    );
}

#[test]
fn comments_become_metadata() {
    let data = GifBuilder::new(1, 1)
        .comment("made by hand")
        .image((0, 0, 1, 1), &[0])
        .finish();
    let decoder = GifDecoder::create(&data).unwrap();
    let metadata = decoder.metadata().unwrap();
    assert_eq!(metadata.get("Comment"), Some("made by hand"));
}

#[test]
fn sniff_is_never_stricter_than_create() {
    let data = four_frames();
    for len in 0..data.len() {
        let prefix = &data[..len];
        if !GifDecoder::sniff(prefix) {
            assert!(GifDecoder::create(prefix).is_err(), "prefix of {len} bytes");
        }
    }
}
