/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! One pixel images of every format, assembled by hand

use loupe_core::bitmap::Rect;
use loupe_core::errors::DecodeErrors;
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::DecoderPlugin;
use loupe_image::{guess_format, ImageDecoder, ImageFormat};
use xxhash_rust::xxh3::xxh3_64;

fn crc32(data: &[u8]) -> u32 {
    let mut crc = u32::MAX;
    for byte in data {
        crc ^= u32::from(*byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

fn chunk(out: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let start = out.len();
    out.extend_from_slice(name);
    out.extend_from_slice(data);
    let crc = crc32(&out[start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

fn png(rgba: [u8; 4]) -> Vec<u8> {
    let raw = [0, rgba[0], rgba[1], rgba[2], rgba[3]];
    let (mut a, mut b) = (1_u32, 0_u32);
    for byte in raw {
        a = (a + u32::from(byte)) % 65521;
        b = (b + a) % 65521;
    }
    let mut zlib = vec![0x78, 0x01, 1, 5, 0, 0xFA, 0xFF];
    zlib.extend_from_slice(&raw);
    zlib.extend_from_slice(&((b << 16) | a).to_be_bytes());

    let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
    chunk(&mut out, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]);
    chunk(&mut out, b"IDAT", &zlib);
    chunk(&mut out, b"IEND", &[]);
    out
}

/// Palette index 1 of a two colour table
fn gif(rgb: [u8; 3]) -> Vec<u8> {
    let mut out = b"GIF89a\x01\0\x01\0\x80\0\0".to_vec();
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&rgb);
    out.extend_from_slice(&[0x2C, 0, 0, 0, 0, 1, 0, 1, 0, 0]);
    // minimum code size 2, codes clear, 1, end
    out.extend_from_slice(&[2, 2, 0x4C, 0x01, 0]);
    out.push(0x3B);
    out
}

fn qoi(width: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut out = b"qoif".to_vec();
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&1_u32.to_be_bytes());
    out.extend_from_slice(&[4, 0, 0xFF]);
    out.extend_from_slice(&rgba);
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
    out
}

/// Eight bit greyscale
fn tiff(grey: u8) -> Vec<u8> {
    let mut out = b"II*\0\x08\0\0\0".to_vec();
    out.extend_from_slice(&8_u16.to_le_bytes());
    #[rustfmt::skip]
    let entries: [(u16, u16, u32); 8] = [
        (256, 4, 1), (257, 4, 1), (258, 3, 8), (262, 3, 1),
        (273, 4, 110), (277, 3, 1), (278, 4, 1), (279, 4, 1)
    ];
    for (tag, kind, value) in entries {
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&1_u32.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&[0; 4]);
    assert_eq!(out.len(), 110);
    out.push(grey);
    out
}

fn bmp(rgb: [u8; 3]) -> Vec<u8> {
    let mut out = b"BM".to_vec();
    out.extend_from_slice(&58_u32.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&54_u32.to_le_bytes());
    out.extend_from_slice(&40_u32.to_le_bytes());
    out.extend_from_slice(&1_i32.to_le_bytes());
    out.extend_from_slice(&1_i32.to_le_bytes());
    out.extend_from_slice(&1_u16.to_le_bytes());
    out.extend_from_slice(&24_u16.to_le_bytes());
    out.extend_from_slice(&[0; 24]);
    out.extend_from_slice(&[rgb[2], rgb[1], rgb[0], 0]);
    out
}

fn ico(payload: Vec<u8>) -> Vec<u8> {
    let mut out = vec![0, 0, 1, 0, 1, 0, 1, 1, 0, 0, 1, 0, 32, 0];
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&22_u32.to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Lossless, every prefix code holds one symbol so the pixel takes no bits
fn webp(rgba: [u8; 4]) -> Vec<u8> {
    // signature, 1x1 with alpha, no transform, cache or meta codes
    let mut fields = vec![(0x2F, 8), (0, 14), (0, 14), (1, 1), (0, 3), (0, 3)];
    for value in [rgba[1], rgba[0], rgba[2], rgba[3]] {
        fields.extend_from_slice(&[(1, 1), (0, 1), (1, 1), (u32::from(value), 8)]);
    }
    // distance code
    fields.extend_from_slice(&[(1, 1), (0, 1), (0, 1), (0, 1)]);

    let (mut vp8l, mut acc, mut bits) = (Vec::new(), 0_u64, 0);
    for (value, width) in fields {
        acc |= u64::from(value) << bits;
        bits += width;
        while bits >= 8 {
            vp8l.push(acc as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 {
        vp8l.push(acc as u8);
    }
    let padded = vp8l.len() + vp8l.len() % 2;

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&((12 + padded) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBPVP8L");
    out.extend_from_slice(&(vp8l.len() as u32).to_le_bytes());
    out.extend_from_slice(&vp8l);
    out.resize(20 + padded, 0);
    out
}

fn samples() -> Vec<(ImageFormat, Vec<u8>, [u8; 4])> {
    vec![
        (ImageFormat::PNG, png([1, 2, 3, 4]), [1, 2, 3, 4]),
        (ImageFormat::GIF, gif([10, 20, 30]), [10, 20, 30, 255]),
        (ImageFormat::QOI, qoi(1, [5, 6, 7, 8]), [5, 6, 7, 8]),
        (ImageFormat::TIFF, tiff(77), [77, 77, 77, 255]),
        (ImageFormat::ICO, ico(png([9, 9, 9, 9])), [9, 9, 9, 9]),
        (ImageFormat::WEBP, webp([11, 22, 33, 44]), [11, 22, 33, 44]),
        (ImageFormat::BMP, bmp([200, 100, 50]), [200, 100, 50, 255]),
    ]
}

#[test]
fn every_format_is_recognized_and_decoded() {
    for (format, data, pixel) in samples() {
        assert_eq!(guess_format(&data), Some(format), "{format}");
        assert!(format.sniff(&data));
        assert!(ImageDecoder::sniff(&data));

        let mut decoder = ImageDecoder::new(&data).unwrap();
        assert_eq!(decoder.format(), format);
        assert_eq!(decoder.size(), (1, 1), "{format}");
        assert_eq!(decoder.frame_count(), 1, "{format}");
        assert!(!decoder.is_animated(), "{format}");

        let info = decoder.frame_info(0).unwrap();
        assert_eq!(info.region, Rect::new(0, 0, 1, 1), "{format}");

        let frame = decoder.frame(0).unwrap();
        assert_eq!(frame.bitmap.pixel(0, 0), Some(pixel), "{format}");
        assert_eq!(frame.region, info.region, "{format}");
        assert_eq!(
            decoder.frame(1).unwrap_err(),
            DecodeErrors::OutOfRange { index: 1, count: 1 }
        );
    }
}

#[test]
fn sniffers_only_accept_their_own_format() {
    for (format, data, _) in samples() {
        for other in ImageFormat::all() {
            assert_eq!(other.sniff(&data), other == format, "{other} sniffing {format}");
        }
    }
}

#[test]
fn formats_are_tried_in_a_fixed_order() {
    assert_eq!(
        ImageFormat::all(),
        [
            ImageFormat::PNG,
            ImageFormat::GIF,
            ImageFormat::QOI,
            ImageFormat::TIFF,
            ImageFormat::ICO,
            ImageFormat::WEBP,
            ImageFormat::BMP
        ]
    );
}

#[test]
fn unknown_data() {
    for data in [&b""[..], b"hello world", b"BM", b"\xFF\xD8\xFF\xE0"] {
        assert_eq!(guess_format(data), None);
        assert!(!ImageDecoder::sniff(data));
        assert!(matches!(
            ImageDecoder::new(data),
            Err(DecodeErrors::Unsupported(_))
        ));
    }
}

#[test]
fn broken_files_report_their_own_errors() {
    let tiff = b"II*\0\x08\0";
    assert_eq!(guess_format(tiff), Some(ImageFormat::TIFF));
    assert!(matches!(ImageDecoder::new(tiff), Err(DecodeErrors::Malformed(_))));
}

#[test]
fn options_reach_the_format_decoder() {
    let data = qoi(2, [0; 4]);
    let options = DecoderOptions::default().set_max_width(1);
    assert!(matches!(
        ImageDecoder::new_with_options(&data, options),
        Err(DecodeErrors::Malformed(_))
    ));
    assert!(ImageFormat::QOI.decoder_with_options(&data, options).is_err());
}

#[test]
fn queries_are_forwarded() {
    let gif = gif([0; 3]);
    let decoder = ImageDecoder::new(&gif).unwrap();
    assert_eq!(decoder.loop_count(), Some(1));
    assert_eq!(decoder.icc_data().unwrap(), None);

    let png = png([0; 4]);
    let decoder = ImageFormat::PNG.decoder(&png).unwrap();
    assert_eq!(decoder.loop_count(), None);
    assert!(decoder.metadata().is_none());
    assert!(matches!(decoder, ImageDecoder::PNG(_)));

    let webp = webp([0; 4]);
    let decoder = ImageDecoder::new(&webp).unwrap();
    assert_eq!(decoder.loop_count(), None);
    assert!(matches!(decoder, ImageDecoder::WEBP(_)));
}

#[test]
fn decoding_twice_gives_the_same_canvas() {
    for (format, data, _) in samples() {
        let mut decoder = ImageDecoder::new(&data).unwrap();
        let first = xxh3_64(decoder.frame(0).unwrap().bitmap.pixels());
        let second = xxh3_64(decoder.frame(0).unwrap().bitmap.pixels());
        assert_eq!(first, second, "{format}");
    }
}

#[test]
fn extensions() {
    assert_eq!(ImageFormat::from_extension("png"), Some(ImageFormat::PNG));
    assert_eq!(ImageFormat::from_extension("TIF"), Some(ImageFormat::TIFF));
    assert_eq!(ImageFormat::from_extension("cur"), Some(ImageFormat::ICO));
    assert_eq!(ImageFormat::from_extension("WebP"), Some(ImageFormat::WEBP));
    assert_eq!(ImageFormat::from_extension("jpg"), None);
    assert_eq!(ImageFormat::GIF.to_string(), "GIF");
    assert_eq!(ImageFormat::WEBP.to_string(), "WEBP");
}
