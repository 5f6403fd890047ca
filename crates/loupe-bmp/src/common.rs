/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::format;

use loupe_core::errors::DecodeErrors;

/// Sizes of the info headers the decoder understands
pub(crate) const KNOWN_HEADER_SIZES: [u32; 8] = [12, 16, 40, 52, 56, 64, 108, 124];

/// `PROFILE_EMBEDDED`, colour space type of a v5 header carrying an ICC profile
pub(crate) const PROFILE_EMBEDDED: u32 = 0x4D42_4544;

/// How the pixel array is stored
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BmpCompression {
    RGB,
    RLE8,
    RLE4,
    BITFIELDS,
    ALPHABITFIELDS
}

impl BmpCompression {
    /// Map the compression field of an info header
    ///
    /// OS/2 headers reuse values 3 and 4 for Huffman and RLE24
    pub fn from_u32(num: u32, os2: bool) -> Result<BmpCompression, DecodeErrors> {
        match (num, os2) {
            (0, _) => Ok(BmpCompression::RGB),
            (1, _) => Ok(BmpCompression::RLE8),
            (2, _) => Ok(BmpCompression::RLE4),
            (3, false) => Ok(BmpCompression::BITFIELDS),
            (6, false) => Ok(BmpCompression::ALPHABITFIELDS),
            (3, true) => Err(DecodeErrors::unsupported("OS/2 Huffman 1D compression")),
            (4, true) => Err(DecodeErrors::unsupported("OS/2 RLE24 compression")),
            (4, false) => Err(DecodeErrors::unsupported("Embedded JPEG in BMP")),
            (5, false) => Err(DecodeErrors::unsupported("Embedded PNG in BMP")),
            _ => Err(DecodeErrors::Malformed(format!("Unknown BMP compression {num}")))
        }
    }

    pub const fn is_rle(self) -> bool {
        matches!(self, BmpCompression::RLE4 | BmpCompression::RLE8)
    }

    pub const fn has_masks(self) -> bool {
        matches!(self, BmpCompression::BITFIELDS | BmpCompression::ALPHABITFIELDS)
    }
}
