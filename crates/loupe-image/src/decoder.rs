/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::string::ToString;
use alloc::vec::Vec;

use loupe_bmp::BmpDecoder;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::{FrameDescriptor, FrameInfo};
use loupe_core::log::debug;
use loupe_core::metadata::Metadata;
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::DecoderPlugin;
use loupe_gif::GifDecoder;
use loupe_ico::IcoDecoder;
use loupe_png::PngDecoder;
use loupe_qoi::QoiDecoder;
use loupe_tiff::TiffDecoder;
use loupe_webp::WebpDecoder;

use crate::codecs::{guess_format, ImageFormat};

/// A decoder for any supported format
///
/// Every method forwards to the decoder of the detected format, the
/// concrete decoder is reachable by matching on the variants.
#[allow(clippy::large_enum_variant)]
pub enum ImageDecoder<'a> {
    PNG(PngDecoder<'a>),
    GIF(GifDecoder<'a>),
    QOI(QoiDecoder<'a>),
    TIFF(TiffDecoder<'a>),
    ICO(IcoDecoder<'a>),
    WEBP(WebpDecoder<'a>),
    BMP(BmpDecoder<'a>)
}

/// Run `$body` with `$decoder` bound to whichever decoder `$self` holds
macro_rules! delegate {
    ($self:expr, $decoder:ident => $body:expr) => {
        match $self {
            ImageDecoder::PNG($decoder) => $body,
            ImageDecoder::GIF($decoder) => $body,
            ImageDecoder::QOI($decoder) => $body,
            ImageDecoder::TIFF($decoder) => $body,
            ImageDecoder::ICO($decoder) => $body,
            ImageDecoder::WEBP($decoder) => $body,
            ImageDecoder::BMP($decoder) => $body
        }
    };
}

impl<'a> ImageDecoder<'a> {
    /// Detect the format of `bytes` and create its decoder
    ///
    /// # Errors
    /// - [`DecodeErrors::Unsupported`] if no format recognizes the bytes
    /// - Whatever creating the format's decoder fails with
    pub fn new(bytes: &'a [u8]) -> Result<ImageDecoder<'a>, DecodeErrors> {
        ImageDecoder::new_with_options(bytes, DecoderOptions::default())
    }

    pub fn new_with_options(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<ImageDecoder<'a>, DecodeErrors> {
        let format = guess_format(bytes)
            .ok_or_else(|| DecodeErrors::Unsupported("Unknown image format".to_string()))?;

        debug!("Decoding as {format}");
        format.decoder_with_options(bytes, options)
    }

    /// The format this decoder handles
    pub const fn format(&self) -> ImageFormat {
        match self {
            ImageDecoder::PNG(_) => ImageFormat::PNG,
            ImageDecoder::GIF(_) => ImageFormat::GIF,
            ImageDecoder::QOI(_) => ImageFormat::QOI,
            ImageDecoder::TIFF(_) => ImageFormat::TIFF,
            ImageDecoder::ICO(_) => ImageFormat::ICO,
            ImageDecoder::WEBP(_) => ImageFormat::WEBP,
            ImageDecoder::BMP(_) => ImageFormat::BMP
        }
    }
}

impl<'a> DecoderPlugin<'a> for ImageDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        guess_format(bytes).is_some()
    }

    fn create_with_options(bytes: &'a [u8], options: DecoderOptions) -> Result<Self, DecodeErrors> {
        ImageDecoder::new_with_options(bytes, options)
    }

    fn size(&self) -> (usize, usize) {
        delegate!(self, decoder => decoder.size())
    }

    fn frame_count(&self) -> usize {
        delegate!(self, decoder => decoder.frame_count())
    }

    fn is_animated(&self) -> bool {
        delegate!(self, decoder => decoder.is_animated())
    }

    fn loop_count(&self) -> Option<u32> {
        delegate!(self, decoder => decoder.loop_count())
    }

    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        delegate!(self, decoder => decoder.frame_info(index))
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        delegate!(self, decoder => decoder.frame(index))
    }

    fn metadata(&self) -> Option<&Metadata> {
        delegate!(self, decoder => decoder.metadata())
    }

    fn icc_data(&self) -> Result<Option<Vec<u8>>, DecodeErrors> {
        delegate!(self, decoder => decoder.icc_data())
    }
}
