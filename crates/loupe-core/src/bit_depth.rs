/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image bit depth and byte order information
//!
//! Sample buffers remember the depth their values were decoded at,
//! this lets the pixel path scale them to 8 bits per channel.

/// The number of bits a single channel sample occupies
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BitDepth {
    One,
    Two,
    Four,
    Eight,
    Sixteen
}

impl BitDepth {
    /// Map a bits per sample value found in an image header
    /// to a bit depth, returning `None` for unsupported widths
    pub const fn from_bits(bits: u16) -> Option<BitDepth> {
        match bits {
            1 => Some(BitDepth::One),
            2 => Some(BitDepth::Two),
            4 => Some(BitDepth::Four),
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            _ => None
        }
    }

    /// Number of bits per sample
    pub const fn bits(self) -> u8 {
        match self {
            BitDepth::One => 1,
            BitDepth::Two => 2,
            BitDepth::Four => 4,
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16
        }
    }

    /// Largest value a sample of this depth can hold
    pub const fn max_value(self) -> u16 {
        match self {
            BitDepth::Sixteen => u16::MAX,
            _ => (1 << self.bits()) - 1
        }
    }
}

/// The byte order of multi-byte values
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ByteEndian {
    /// Little Endian byte-order
    LE,
    /// Big Endian byte-order
    BE
}
