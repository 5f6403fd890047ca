/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use loupe_core::errors::DecodeErrors;
use loupe_core::plugin::DecoderPlugin;
use loupe_qoi::QoiDecoder;
use nanorand::{Rng, WyRand};

/// A 16x16 image made of random rgb, diff and run ops
fn random_image(seed: u64) -> Vec<u8> {
    let mut rng = WyRand::new_seed(seed);
    let mut out = b"qoif".to_vec();
    out.extend_from_slice(&16_u32.to_be_bytes());
    out.extend_from_slice(&16_u32.to_be_bytes());
    out.extend_from_slice(&[4, 0]);

    let mut pixels = 0;
    while pixels < 256 {
        match rng.generate_range(0_u8..3) {
            0 => {
                out.push(0xfe);
                out.extend_from_slice(&[rng.generate(), rng.generate(), rng.generate()]);
                pixels += 1;
            }
            1 => {
                out.push(0x40 | rng.generate_range(0_u8..64));
                pixels += 1;
            }
            _ => {
                let run = rng.generate_range(1_usize..=8).min(256 - pixels);
                out.push(0xc0 | (run - 1) as u8);
                pixels += run;
            }
        }
    }
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
    out
}

#[test]
fn sniff_is_never_stricter_than_create() {
    let data = random_image(3);

    for len in 0..data.len() {
        let prefix = &data[..len];
        if QoiDecoder::create(prefix).is_ok() {
            assert!(QoiDecoder::sniff(prefix), "prefix of {len} bytes");
        }
    }
}

#[test]
fn truncation_never_succeeds() {
    let data = random_image(11);
    let full = QoiDecoder::create(&data).unwrap().frame(0).unwrap();
    assert_eq!(full.bitmap.dimensions(), (16, 16));

    // drop the end marker and at least one op byte
    for len in 14..data.len() - 8 {
        let mut decoder = QoiDecoder::create(&data[..len]).unwrap();
        assert_eq!(decoder.frame(0).map(|_| ()), Err(DecodeErrors::Truncated));
    }
}

#[test]
fn decoding_twice_is_identical() {
    let data = random_image(5);
    let mut decoder = QoiDecoder::create(&data).unwrap();

    let first = decoder.frame(0).unwrap();
    let second = decoder.frame(0).unwrap();
    assert_eq!(first, second);
}
