/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
#![allow(clippy::upper_case_acronyms)]

/// How strips and tiles are compressed
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TiffCompression {
    None,
    /// CCITT modified Huffman run-length encoding
    CcittRle,
    /// CCITT T.4, also called Group 3 fax
    CcittGroup3,
    /// CCITT T.6, also called Group 4 fax
    CcittGroup4,
    Lzw,
    /// zlib streams, both the registered and the Adobe tag value
    Deflate,
    PackBits
}

impl TiffCompression {
    pub fn from_int(int: u32) -> Option<TiffCompression> {
        match int {
            1 => Some(Self::None),
            2 => Some(Self::CcittRle),
            3 => Some(Self::CcittGroup3),
            4 => Some(Self::CcittGroup4),
            5 => Some(Self::Lzw),
            8 | 32946 => Some(Self::Deflate),
            32773 => Some(Self::PackBits),
            _ => None
        }
    }

    pub const fn is_ccitt(self) -> bool {
        matches!(self, Self::CcittRle | Self::CcittGroup3 | Self::CcittGroup4)
    }
}

/// How sample values map to colours
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Photometric {
    /// Bilevel and greyscale, zero is white
    WhiteIsZero,
    /// Bilevel and greyscale, zero is black
    BlackIsZero,
    RGB,
    /// Samples index a colour map
    Palette,
    /// Separated, with the CMYK ink set
    CMYK,
    YCbCr
}

impl Photometric {
    pub fn from_int(int: u32) -> Option<Photometric> {
        match int {
            0 => Some(Self::WhiteIsZero),
            1 => Some(Self::BlackIsZero),
            2 => Some(Self::RGB),
            3 => Some(Self::Palette),
            5 => Some(Self::CMYK),
            6 => Some(Self::YCbCr),
            _ => None
        }
    }

    /// Samples per pixel before any extra samples
    pub const fn color_channels(self) -> usize {
        match self {
            Self::WhiteIsZero | Self::BlackIsZero | Self::Palette => 1,
            Self::RGB | Self::YCbCr => 3,
            Self::CMYK => 4
        }
    }
}

/// Meaning of the first extra sample
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExtraSample {
    Unspecified,
    /// Colour samples are premultiplied by alpha
    AssociatedAlpha,
    UnassociatedAlpha
}

impl ExtraSample {
    pub fn from_int(int: u32) -> ExtraSample {
        match int {
            1 => Self::AssociatedAlpha,
            2 => Self::UnassociatedAlpha,
            _ => Self::Unspecified
        }
    }
}

/// Field types an IFD entry may hold
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Ifd
}

impl FieldType {
    pub(crate) fn from_int(int: u16) -> Option<FieldType> {
        match int {
            1 => Some(Self::Byte),
            2 => Some(Self::Ascii),
            3 => Some(Self::Short),
            4 => Some(Self::Long),
            5 => Some(Self::Rational),
            6 => Some(Self::SByte),
            7 => Some(Self::Undefined),
            8 => Some(Self::SShort),
            9 => Some(Self::SLong),
            10 => Some(Self::SRational),
            11 => Some(Self::Float),
            12 => Some(Self::Double),
            13 => Some(Self::Ifd),
            _ => None
        }
    }

    /// Bytes one value of this type occupies
    pub(crate) const fn size(self) -> usize {
        match self {
            Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
            Self::Short | Self::SShort => 2,
            Self::Long | Self::SLong | Self::Float | Self::Ifd => 4,
            Self::Rational | Self::SRational | Self::Double => 8
        }
    }
}
