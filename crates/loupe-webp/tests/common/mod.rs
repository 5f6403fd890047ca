/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! WebP files built in memory
//!
//! Image data is VP8L where every prefix code gives its symbols the same
//! length, enough to reach every part of the bitstream.
#![allow(dead_code)]

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

// VP8X flags
pub const ANIMATION: u8 = 0x02;
pub const XMP: u8 = 0x04;
pub const EXIF: u8 = 0x08;
pub const ALPHA: u8 = 0x10;
pub const ICC: u8 = 0x20;

const CODE_LENGTH_ORDER: [usize; 19] = [
    17, 18, 0, 1, 2, 3, 4, 5, 16, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15
];

#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    acc:   u64,
    bits:  u32
}

impl BitWriter {
    pub fn write(&mut self, value: u32, width: u32) {
        self.acc |= u64::from(value) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

/// A prefix code giving each of a power of two symbols the same length
pub struct Code {
    symbols: Vec<usize>,
    length:  u32
}

impl Code {
    /// Write a code holding at least `used`, unused symbols pad it out
    pub fn write(writer: &mut BitWriter, alphabet: usize, used: &[usize]) -> Code {
        let mut symbols = used.to_vec();
        symbols.sort_unstable();
        symbols.dedup();

        let mut filler = 0;
        while !symbols.len().is_power_of_two() {
            while symbols.contains(&filler) {
                filler += 1;
            }
            symbols.push(filler);
            symbols.sort_unstable();
        }
        let length = symbols.len().trailing_zeros().max(1);

        if symbols.len() <= 2 && symbols.iter().all(|s| *s < 256) {
            // simple code
            writer.write(1, 1);
            writer.write(u32::from(symbols.len() == 2), 1);
            if symbols[0] < 2 {
                writer.write(0, 1);
                writer.write(symbols[0] as u32, 1);
            } else {
                writer.write(1, 1);
                writer.write(symbols[0] as u32, 8);
            }
            if let Some(second) = symbols.get(1) {
                writer.write(*second as u32, 8);
            }
        } else {
            // code lengths are 0 or `length`, each with a one bit code
            writer.write(0, 1);
            let position = CODE_LENGTH_ORDER
                .iter()
                .position(|s| *s == length as usize)
                .unwrap();
            let count = (position + 1).max(4);

            writer.write((count - 4) as u32, 4);
            for symbol in &CODE_LENGTH_ORDER[..count] {
                writer.write(u32::from(*symbol == 0 || *symbol == length as usize), 3);
            }
            // no max symbol
            writer.write(0, 1);
            for symbol in 0..alphabet {
                writer.write(u32::from(symbols.contains(&symbol)), 1);
            }
        }
        Code { symbols, length }
    }

    pub fn put(&self, writer: &mut BitWriter, symbol: usize) {
        if self.symbols.len() == 1 {
            return;
        }
        let code = self.symbols.iter().position(|s| *s == symbol).unwrap() as u32;
        // most significant bit of the code first
        for bit in (0..self.length).rev() {
            writer.write((code >> bit) & 1, 1);
        }
    }
}

/// The five codes of a prefix code group
pub struct Group {
    pub green:    Code,
    pub red:      Code,
    pub blue:     Code,
    pub alpha:    Code,
    pub distance: Code
}

impl Group {
    /// Write codes for `pixels` as literals, plus extra green and distance symbols
    pub fn write(
        writer: &mut BitWriter, pixels: &[[u8; 4]], cache_bits: u32, extra_green: &[usize],
        distances: &[usize]
    ) -> Group {
        let cache_size = if cache_bits > 0 { 1 << cache_bits } else { 0 };
        let channel = |c: usize| pixels.iter().map(|p| usize::from(p[c])).collect::<Vec<_>>();

        let mut greens = channel(1);
        greens.extend_from_slice(extra_green);

        Group {
            green:    Code::write(writer, 256 + 24 + cache_size, &greens),
            red:      Code::write(writer, 256, &channel(0)),
            blue:     Code::write(writer, 256, &channel(2)),
            alpha:    Code::write(writer, 256, &channel(3)),
            distance: Code::write(writer, 40, distances)
        }
    }

    pub fn literal(&self, writer: &mut BitWriter, [r, g, b, a]: [u8; 4]) {
        self.green.put(writer, usize::from(g));
        self.red.put(writer, usize::from(r));
        self.blue.put(writer, usize::from(b));
        self.alpha.put(writer, usize::from(a));
    }
}

pub fn vp8l_header(writer: &mut BitWriter, width: usize, height: usize, alpha_is_used: bool) {
    writer.write(0x2f, 8);
    writer.write(width as u32 - 1, 14);
    writer.write(height as u32 - 1, 14);
    writer.write(u32::from(alpha_is_used), 1);
    writer.write(0, 3);
}

/// A VP8L stream of literal RGBA pixels
pub fn lossless_image(width: usize, height: usize, pixels: &[[u8; 4]], alpha_is_used: bool) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height);

    let mut writer = BitWriter::default();
    vp8l_header(&mut writer, width, height, alpha_is_used);
    // no transform, no colour cache, no meta codes
    writer.write(0, 3);

    let group = Group::write(&mut writer, pixels, 0, &[], &[]);
    for pixel in pixels {
        group.literal(&mut writer, *pixel);
    }
    writer.finish()
}

pub fn lossless(width: usize, height: usize, pixels: &[[u8; 4]]) -> Vec<u8> {
    lossless_image(width, height, pixels, true)
}

pub fn solid(width: usize, height: usize, pixel: [u8; 4]) -> Vec<u8> {
    lossless(width, height, &vec![pixel; width * height])
}

/// A RIFF chunk, padded to an even size
pub fn chunk(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = fourcc.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

pub fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body = [b"WEBP".to_vec(), chunks.concat()].concat();

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn u24(value: usize) -> [u8; 3] {
    let [a, b, c, _] = (value as u32).to_le_bytes();
    [a, b, c]
}

pub fn vp8x(flags: u8, width: usize, height: usize) -> Vec<u8> {
    let mut payload = vec![flags, 0, 0, 0];
    payload.extend_from_slice(&u24(width - 1));
    payload.extend_from_slice(&u24(height - 1));
    chunk(b"VP8X", &payload)
}

/// ANIM chunk, `background` in BGRA order
pub fn anim(background: [u8; 4], loops: u16) -> Vec<u8> {
    let mut payload = background.to_vec();
    payload.extend_from_slice(&loops.to_le_bytes());
    chunk(b"ANIM", &payload)
}

/// ANMF chunk around already built image chunks, `x` and `y` must be even
pub fn anmf(
    (x, y, width, height): (usize, usize, usize, usize), duration: usize, flags: u8, image: &[u8]
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&u24(x / 2));
    payload.extend_from_slice(&u24(y / 2));
    payload.extend_from_slice(&u24(width - 1));
    payload.extend_from_slice(&u24(height - 1));
    payload.extend_from_slice(&u24(duration));
    payload.push(flags);
    payload.extend_from_slice(image);
    chunk(b"ANMF", &payload)
}

/// The frame header of a VP8 key frame, no image data follows
pub fn vp8_header(width: u16, height: u16) -> Vec<u8> {
    let mut payload = vec![0x00, 0x00, 0x00, 0x9d, 0x01, 0x2a];
    payload.extend_from_slice(&width.to_le_bytes());
    payload.extend_from_slice(&height.to_le_bytes());
    chunk(b"VP8 ", &payload)
}
