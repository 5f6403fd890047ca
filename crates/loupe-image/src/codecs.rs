/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The formats the library understands and how they are told apart

use loupe_bmp::BmpDecoder;
use loupe_core::errors::DecodeErrors;
use loupe_core::log::trace;
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::DecoderPlugin;
use loupe_gif::GifDecoder;
use loupe_ico::IcoDecoder;
use loupe_png::PngDecoder;
use loupe_qoi::QoiDecoder;
use loupe_tiff::TiffDecoder;
use loupe_webp::WebpDecoder;

use crate::decoder::ImageDecoder;

/// All supported image formats
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ImageFormat {
    /// Portable Network Graphics, including animated PNGs
    PNG,
    /// Graphics Interchange Format
    GIF,
    /// Quite Okay Image
    QOI,
    /// Tagged Image File Format
    TIFF,
    /// Windows icons and cursors
    ICO,
    /// WebP, lossless and animated
    WEBP,
    /// Windows Bitmap Files
    BMP
}

impl ImageFormat {
    /// Every format, in the order [`guess_format`] tries them
    ///
    /// Formats with long magic numbers come first, BMP with its two
    /// byte `BM` is last.
    pub const fn all() -> [ImageFormat; 7] {
        [
            ImageFormat::PNG,
            ImageFormat::GIF,
            ImageFormat::QOI,
            ImageFormat::TIFF,
            ImageFormat::ICO,
            ImageFormat::WEBP,
            ImageFormat::BMP
        ]
    }

    pub const fn name(self) -> &'static str {
        match self {
            ImageFormat::PNG => "PNG",
            ImageFormat::GIF => "GIF",
            ImageFormat::QOI => "QOI",
            ImageFormat::TIFF => "TIFF",
            ImageFormat::ICO => "ICO",
            ImageFormat::WEBP => "WEBP",
            ImageFormat::BMP => "BMP"
        }
    }

    /// The format files with this extension usually hold
    pub fn from_extension<P: AsRef<str>>(extension: P) -> Option<ImageFormat> {
        let format = match extension.as_ref().to_ascii_lowercase().as_str() {
            "png" | "apng" => ImageFormat::PNG,
            "gif" => ImageFormat::GIF,
            "qoi" => ImageFormat::QOI,
            "tif" | "tiff" => ImageFormat::TIFF,
            "ico" | "cur" => ImageFormat::ICO,
            "webp" => ImageFormat::WEBP,
            "bmp" | "dib" => ImageFormat::BMP,
            _ => return None
        };
        Some(format)
    }

    /// Whether `bytes` plausibly hold an image of this format
    pub fn sniff(self, bytes: &[u8]) -> bool {
        match self {
            ImageFormat::PNG => PngDecoder::sniff(bytes),
            ImageFormat::GIF => GifDecoder::sniff(bytes),
            ImageFormat::QOI => QoiDecoder::sniff(bytes),
            ImageFormat::TIFF => TiffDecoder::sniff(bytes),
            ImageFormat::ICO => IcoDecoder::sniff(bytes),
            ImageFormat::WEBP => WebpDecoder::sniff(bytes),
            ImageFormat::BMP => BmpDecoder::sniff(bytes)
        }
    }

    /// Create a decoder for `bytes` assuming they are of this format
    pub fn decoder(self, bytes: &[u8]) -> Result<ImageDecoder, DecodeErrors> {
        self.decoder_with_options(bytes, DecoderOptions::default())
    }

    pub fn decoder_with_options(
        self, bytes: &[u8], options: DecoderOptions
    ) -> Result<ImageDecoder, DecodeErrors> {
        let decoder = match self {
            ImageFormat::PNG => ImageDecoder::PNG(PngDecoder::create_with_options(bytes, options)?),
            ImageFormat::GIF => ImageDecoder::GIF(GifDecoder::create_with_options(bytes, options)?),
            ImageFormat::QOI => ImageDecoder::QOI(QoiDecoder::create_with_options(bytes, options)?),
            ImageFormat::TIFF => {
                ImageDecoder::TIFF(TiffDecoder::create_with_options(bytes, options)?)
            }
            ImageFormat::ICO => ImageDecoder::ICO(IcoDecoder::create_with_options(bytes, options)?),
            ImageFormat::WEBP => {
                ImageDecoder::WEBP(WebpDecoder::create_with_options(bytes, options)?)
            }
            ImageFormat::BMP => ImageDecoder::BMP(BmpDecoder::create_with_options(bytes, options)?)
        };
        Ok(decoder)
    }
}

impl core::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Guess the format of an image from its first bytes
///
/// Formats are tried in the order of [`ImageFormat::all`], the
/// first whose sniffer accepts the bytes wins.
pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
    let format = ImageFormat::all()
        .into_iter()
        .find(|format| format.sniff(bytes));

    trace!("Guessed format {format:?}");
    format
}
