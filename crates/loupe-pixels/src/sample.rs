/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Unpacked sample storage
//!
//! Formats store samples packed at depths from 1 to 16 bits. A
//! [`SampleBuffer`] holds them unpacked, one `u16` per sample, so the
//! later passes only deal with one layout.
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use loupe_core::bit_depth::{BitDepth, ByteEndian};
use loupe_core::errors::DecodeErrors;

/// Number of bytes a packed row of `samples` samples occupies
///
/// Rows always start on a byte boundary
pub fn packed_row_bytes(samples: usize, depth: BitDepth) -> Option<usize> {
    samples
        .checked_mul(usize::from(depth.bits()))
        .map(|bits| bits.div_ceil(8))
}

/// Unpack one row of samples from `src` into `out`
///
/// Sub byte samples are stored most significant bits first, 16 bit
/// samples use `endian`. Exactly `out.len()` samples are produced.
///
/// # Errors
/// [`DecodeErrors::Truncated`] if `src` holds fewer samples than `out` needs
pub fn unpack_row(
    src: &[u8], depth: BitDepth, endian: ByteEndian, out: &mut [u16]
) -> Result<(), DecodeErrors> {
    let needed = packed_row_bytes(out.len(), depth).ok_or(DecodeErrors::Truncated)?;

    if src.len() < needed {
        return Err(DecodeErrors::Truncated);
    }

    match depth {
        BitDepth::Eight => {
            for (o, i) in out.iter_mut().zip(src) {
                *o = u16::from(*i);
            }
        }
        BitDepth::Sixteen => {
            for (o, i) in out.iter_mut().zip(src.chunks_exact(2)) {
                let bytes = [i[0], i[1]];
                *o = match endian {
                    ByteEndian::BE => u16::from_be_bytes(bytes),
                    ByteEndian::LE => u16::from_le_bytes(bytes)
                };
            }
        }
        BitDepth::One | BitDepth::Two | BitDepth::Four => {
            let bits = usize::from(depth.bits());
            let per_byte = 8 / bits;
            let mask = (1_u16 << bits) - 1;

            for (pos, o) in out.iter_mut().enumerate() {
                let byte = u16::from(src[pos / per_byte]);
                let shift = 8 - bits * (pos % per_byte + 1);
                *o = (byte >> shift) & mask;
            }
        }
    }
    Ok(())
}

/// Scale a sample of `depth` bits to the 0..=255 range
#[inline]
pub fn scale_to_u8(value: u16, depth: BitDepth) -> u8 {
    match depth {
        BitDepth::One => (value & 1) as u8 * 0xFF,
        BitDepth::Two => (value & 3) as u8 * 0x55,
        BitDepth::Four => (value & 15) as u8 * 0x11,
        BitDepth::Eight => value as u8,
        BitDepth::Sixteen => ((u32::from(value) * 255 + 32767) / 65535) as u8
    }
}

/// A two dimensional buffer of unpacked samples
///
/// Dimensions and channel count are fixed at allocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SampleBuffer {
    width:    usize,
    height:   usize,
    channels: usize,
    depth:    BitDepth,
    data:     Vec<u16>
}

impl SampleBuffer {
    /// Allocate a zeroed buffer
    ///
    /// # Errors
    /// [`DecodeErrors::Malformed`] for a channel count outside 1..=4
    /// or dimensions whose size overflows
    pub fn new(
        width: usize, height: usize, channels: usize, depth: BitDepth
    ) -> Result<SampleBuffer, DecodeErrors> {
        if !(1..=4).contains(&channels) {
            return Err(DecodeErrors::Malformed(format!(
                "Unsupported number of channels {channels}, expected 1 to 4"
            )));
        }
        let size = width
            .checked_mul(height)
            .and_then(|x| x.checked_mul(channels))
            .ok_or(DecodeErrors::Malformed(format!(
                "Sample buffer of {width}x{height}x{channels} overflows"
            )))?;

        Ok(SampleBuffer {
            width,
            height,
            channels,
            depth,
            data: vec![0; size]
        })
    }

    /// Unpack rows of packed samples, each row starting on a byte boundary
    ///
    /// # Errors
    /// - [`DecodeErrors::Truncated`] if `packed` holds fewer than `height` rows
    /// - Any error of [`SampleBuffer::new`]
    pub fn from_packed(
        packed: &[u8], width: usize, height: usize, channels: usize, depth: BitDepth,
        endian: ByteEndian
    ) -> Result<SampleBuffer, DecodeErrors> {
        let mut buffer = SampleBuffer::new(width, height, channels, depth)?;
        let stride = buffer.packed_stride()?;

        if stride == 0 {
            return Ok(buffer);
        }
        let row_samples = width * channels;

        for (row, out) in buffer.data.chunks_exact_mut(row_samples).enumerate() {
            let start = row * stride;
            let src = packed.get(start..start + stride).ok_or(DecodeErrors::Truncated)?;
            unpack_row(src, depth, endian, out)?;
        }
        Ok(buffer)
    }

    /// Bytes per row when packed at this buffer's depth
    pub fn packed_stride(&self) -> Result<usize, DecodeErrors> {
        packed_row_bytes(self.width * self.channels, self.depth).ok_or(DecodeErrors::Malformed(
            "Packed row size overflows".into()
        ))
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub const fn depth(&self) -> BitDepth {
        self.depth
    }

    /// The sample of `channel` at `(row, column)`
    pub fn get(&self, row: usize, column: usize, channel: usize) -> Option<u16> {
        if row >= self.height || column >= self.width || channel >= self.channels {
            return None;
        }
        self.data
            .get((row * self.width + column) * self.channels + channel)
            .copied()
    }

    /// All samples of one row, channels interleaved
    pub fn row(&self, row: usize) -> &[u16] {
        let stride = self.width * self.channels;
        &self.data[row * stride..(row + 1) * stride]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [u16] {
        let stride = self.width * self.channels;
        &mut self.data[row * stride..(row + 1) * stride]
    }

    pub fn samples(&self) -> &[u16] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    /// Scale every sample to 8 bits, keeping the channel layout
    pub fn to_u8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|x| scale_to_u8(*x, self.depth))
            .collect()
    }
}
