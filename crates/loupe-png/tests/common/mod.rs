/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! PNG files built in memory, image data is stored uncompressed
#![allow(dead_code)]

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

fn adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1_u32, 0_u32);
    for byte in data {
        a = (a + u32::from(*byte)) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}

/// A zlib stream of stored deflate blocks
pub fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01];
    let blocks: Vec<&[u8]> = if data.is_empty() {
        vec![&[]]
    } else {
        data.chunks(65535).collect()
    };
    for (i, block) in blocks.iter().enumerate() {
        out.push(u8::from(i + 1 == blocks.len()));
        let len = block.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(block);
    }
    out.extend_from_slice(&adler32(data).to_be_bytes());
    out
}

/// Prefix every row with filter type 0
pub fn unfiltered(rows: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for row in rows {
        out.push(0);
        out.extend_from_slice(row);
    }
    out
}

/// Unfiltered rows of a solid RGBA8 image
pub fn solid(width: usize, height: usize, color: [u8; 4]) -> Vec<u8> {
    let row = color.repeat(width);
    unfiltered(&vec![row.as_slice(); height])
}

pub struct PngBuilder {
    bytes: Vec<u8>
}

impl PngBuilder {
    pub fn new(width: u32, height: u32, depth: u8, color: u8) -> PngBuilder {
        PngBuilder::with_interlace(width, height, depth, color, 0)
    }

    pub fn with_interlace(width: u32, height: u32, depth: u8, color: u8, interlace: u8) -> PngBuilder {
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[depth, color, 0, 0, interlace]);

        let builder = PngBuilder {
            bytes: vec![137, 80, 78, 71, 13, 10, 26, 10]
        };
        builder.chunk(b"IHDR", &ihdr)
    }

    pub fn chunk(mut self, name: &[u8; 4], data: &[u8]) -> PngBuilder {
        self.bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
        self.bytes.extend_from_slice(name);
        self.bytes.extend_from_slice(data);

        let mut covered = name.to_vec();
        covered.extend_from_slice(data);
        self.bytes.extend_from_slice(&crc32(&covered).to_be_bytes());
        self
    }

    /// One IDAT chunk holding `raw`, filter bytes included
    pub fn image_data(self, raw: &[u8]) -> PngBuilder {
        self.chunk(b"IDAT", &zlib_stored(raw))
    }

    pub fn actl(self, num_frames: u32, num_plays: u32) -> PngBuilder {
        let mut data = num_frames.to_be_bytes().to_vec();
        data.extend_from_slice(&num_plays.to_be_bytes());
        self.chunk(b"acTL", &data)
    }

    /// `region` is x, y, width, height, `delay` numerator and denominator
    pub fn fctl(
        self, sequence: u32, region: (u32, u32, u32, u32), delay: (u16, u16), dispose: u8,
        blend: u8
    ) -> PngBuilder {
        let mut data = sequence.to_be_bytes().to_vec();
        for value in [region.2, region.3, region.0, region.1] {
            data.extend_from_slice(&value.to_be_bytes());
        }
        data.extend_from_slice(&delay.0.to_be_bytes());
        data.extend_from_slice(&delay.1.to_be_bytes());
        data.extend_from_slice(&[dispose, blend]);
        self.chunk(b"fcTL", &data)
    }

    pub fn fdat(self, sequence: u32, zlib: &[u8]) -> PngBuilder {
        let mut data = sequence.to_be_bytes().to_vec();
        data.extend_from_slice(zlib);
        self.chunk(b"fdAT", &data)
    }

    pub fn finish(self) -> Vec<u8> {
        self.chunk(b"IEND", &[]).bytes
    }

    /// The file without an IEND chunk
    pub fn unterminated(self) -> Vec<u8> {
        self.bytes
    }
}
