/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
#![allow(clippy::upper_case_acronyms, non_camel_case_types)]

use loupe_core::colorspace::ColorSpace;
use loupe_core::frame::{Blend, Disposal};

/// Chunk types the decoder understands
///
/// See <https://www.w3.org/TR/2003/REC-PNG-20031110/> and the APNG
/// extension at <https://wiki.mozilla.org/APNG_Specification>
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum PngChunkType {
    IHDR,
    PLTE,
    IDAT,
    IEND,
    tRNS,
    iCCP,
    eXIf,
    tEXt,
    zTXt,
    iTXt,
    acTL,
    fcTL,
    fdAT,
    unkn
}

impl PngChunkType {
    pub(crate) fn from_bytes(chunk: [u8; 4]) -> PngChunkType {
        match &chunk {
            b"IHDR" => Self::IHDR,
            b"PLTE" => Self::PLTE,
            b"IDAT" => Self::IDAT,
            b"IEND" => Self::IEND,
            b"tRNS" => Self::tRNS,
            b"iCCP" => Self::iCCP,
            b"eXIf" => Self::eXIf,
            b"tEXt" => Self::tEXt,
            b"zTXt" => Self::zTXt,
            b"iTXt" => Self::iTXt,
            b"acTL" => Self::acTL,
            b"fcTL" => Self::fcTL,
            b"fdAT" => Self::fdAT,
            _ => Self::unkn
        }
    }
}

/// Whether a decoder must understand a chunk to show the image,
/// bit 5 of the first byte clear
pub(crate) const fn is_critical(chunk: [u8; 4]) -> bool {
    chunk[0] & 0x20 == 0
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum InterlaceMethod {
    #[default]
    Standard,
    Adam7
}

impl InterlaceMethod {
    pub fn from_int(int: u8) -> Option<InterlaceMethod> {
        match int {
            0 => Some(Self::Standard),
            1 => Some(Self::Adam7),
            _ => None
        }
    }
}

/// The colour type of an image, from its IHDR chunk
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PngColor {
    #[default]
    Luma,
    Palette,
    LumaA,
    RGB,
    RGBA
}

impl PngColor {
    pub(crate) const fn num_components(self) -> usize {
        match self {
            PngColor::Luma | PngColor::Palette => 1,
            PngColor::LumaA => 2,
            PngColor::RGB => 3,
            PngColor::RGBA => 4
        }
    }

    pub(crate) fn from_int(int: u8) -> Option<PngColor> {
        match int {
            0 => Some(Self::Luma),
            2 => Some(Self::RGB),
            3 => Some(Self::Palette),
            4 => Some(Self::LumaA),
            6 => Some(Self::RGBA),
            _ => None
        }
    }

    /// The colourspace samples of this colour type are stored in
    pub const fn colorspace(self) -> ColorSpace {
        match self {
            PngColor::Luma => ColorSpace::Luma,
            PngColor::Palette => ColorSpace::Palette,
            PngColor::LumaA => ColorSpace::LumaA,
            PngColor::RGB => ColorSpace::RGB,
            PngColor::RGBA => ColorSpace::RGBA
        }
    }
}

/// `dispose_op` of an fcTL chunk
pub(crate) fn dispose_from_int(int: u8) -> Option<Disposal> {
    match int {
        0 => Some(Disposal::None),
        1 => Some(Disposal::RestoreBackground),
        2 => Some(Disposal::RestorePrevious),
        _ => None
    }
}

/// `blend_op` of an fcTL chunk
pub(crate) fn blend_from_int(int: u8) -> Option<Blend> {
    match int {
        0 => Some(Blend::Source),
        1 => Some(Blend::SourceOver),
        _ => None
    }
}
