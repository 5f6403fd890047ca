/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image Colorspace information
//!
//! These are the layouts decoded samples can arrive in before
//! the pixel path converts them to RGBA

/// All colorspaces a sample buffer may hold
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColorSpace {
    /// Red, Green, Blue
    RGB,
    /// Red, Green, Blue, Alpha
    RGBA,
    /// YCbCr, luma with blue and red chroma differences
    YCbCr,
    /// Monochrome
    Luma,
    /// Monochrome with alpha channel
    LumaA,
    /// Cyan, Magenta, Yellow, Black
    CMYK,
    /// Cyan, Magenta, Yellow, Black and alpha
    CMYKA,
    /// Indices into a color table
    Palette
}

impl ColorSpace {
    /// Number of color channels present for a certain colorspace
    ///
    /// E.g. RGB returns 3 since it contains R,G and B colors to make up a pixel
    pub const fn num_components(&self) -> usize {
        match self {
            Self::RGB | Self::YCbCr => 3,
            Self::RGBA | Self::CMYK => 4,
            Self::CMYKA => 5,
            Self::Luma | Self::Palette => 1,
            Self::LumaA => 2
        }
    }

    pub const fn has_alpha(&self) -> bool {
        matches!(self, Self::RGBA | Self::LumaA | Self::CMYKA)
    }

    pub const fn is_grayscale(&self) -> bool {
        matches!(self, Self::LumaA | Self::Luma)
    }
}
