/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

#![allow(clippy::identity_op)]

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use loupe_core::bitmap::Bitmap;
use loupe_core::bytestream::ByteReader;
use loupe_core::colorspace::ColorSpace;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::FrameDescriptor;
use loupe_core::log::{trace, warn};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::{check_frame_index, DecoderPlugin};

use crate::constants::{
    QOI_END_MARKER, QOI_HEADER_SIZE, QOI_MASK_2, QOI_OP_DIFF, QOI_OP_INDEX, QOI_OP_LUMA,
    QOI_OP_RGB, QOI_OP_RGBA, QOI_OP_RUN
};

/// Transfer function declared in the header, informative only
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QoiColorspace {
    sRGB,
    /// All channels linear
    Linear
}

/// A Quite OK Image decoder
///
/// Headers are parsed by [`create`](DecoderPlugin::create), pixels are
/// decoded on every call to [`frame`](DecoderPlugin::frame).
pub struct QoiDecoder<'a> {
    data:              &'a [u8],
    width:             usize,
    height:            usize,
    colorspace:        ColorSpace,
    colorspace_layout: QoiColorspace,
    options:           DecoderOptions
}

impl<'a> QoiDecoder<'a> {
    /// Colorspace of the stored pixels, either [`ColorSpace::RGB`] or [`ColorSpace::RGBA`]
    pub const fn colorspace(&self) -> ColorSpace {
        self.colorspace
    }

    pub const fn colorspace_layout(&self) -> QoiColorspace {
        self.colorspace_layout
    }

    /// Decode the image into RGBA pixels
    ///
    /// Three channel images come out opaque.
    ///
    /// # Errors
    /// [`DecodeErrors::Truncated`] if the stream ends before every pixel is known
    pub fn decode_rgba(&self) -> Result<Vec<u8>, DecodeErrors> {
        let mut pixels = vec![0; self.width * self.height * 4];
        let mut stream = ByteReader::new(self.data);
        stream.skip(QOI_HEADER_SIZE)?;

        let mut index = [[0_u8; 4]; 64];
        // starting pixel
        let mut px = [0, 0, 0, 255];

        let mut run = 0;

        for pix_chunk in pixels.chunks_exact_mut(4) {
            if run > 0 {
                run -= 1;
                pix_chunk.copy_from_slice(&px);
                continue;
            }
            let chunk = stream.get_u8_err()?;

            if chunk == QOI_OP_RGB {
                let packed_bytes = stream.get_fixed_bytes_or_err::<3>()?;
                px[..3].copy_from_slice(&packed_bytes);
            } else if chunk == QOI_OP_RGBA {
                px = stream.get_fixed_bytes_or_err::<4>()?;
            } else if (chunk & QOI_MASK_2) == QOI_OP_INDEX {
                px = index[usize::from(chunk & 63)];
            } else if (chunk & QOI_MASK_2) == QOI_OP_DIFF {
                px[0] = px[0].wrapping_add(((chunk >> 4) & 0x03).wrapping_sub(2));
                px[1] = px[1].wrapping_add(((chunk >> 2) & 0x03).wrapping_sub(2));
                px[2] = px[2].wrapping_add(((chunk >> 0) & 0x03).wrapping_sub(2));
            } else if (chunk & QOI_MASK_2) == QOI_OP_LUMA {
                let b2 = stream.get_u8_err()?;
                let vg = (chunk & 0x3f).wrapping_sub(32);

                px[0] = px[0].wrapping_add(vg.wrapping_sub(8).wrapping_add((b2 >> 4) & 0x0f));
                px[1] = px[1].wrapping_add(vg);
                px[2] = px[2].wrapping_add(vg.wrapping_sub(8).wrapping_add((b2 >> 0) & 0x0f));
            } else if (chunk & QOI_MASK_2) == QOI_OP_RUN {
                run = usize::from(chunk & 0x3f);
            }

            pix_chunk.copy_from_slice(&px);
            index[color_hash(px)] = px;
        }

        if stream.peek_fixed::<8>().ok() != Some(QOI_END_MARKER) {
            if self.options.get_strict_mode() {
                return Err(DecodeErrors::Malformed(
                    "Last bytes do not match QOI end marker".into()
                ));
            }
            warn!("Last bytes do not match QOI end marker");
        }
        if self.colorspace == ColorSpace::RGB {
            // the alpha of a three channel image is not part of the image
            for px in pixels.chunks_exact_mut(4) {
                px[3] = 255;
            }
        }
        trace!("Finished decoding image");

        Ok(pixels)
    }
}

#[inline]
fn color_hash(px: [u8; 4]) -> usize {
    let [r, g, b, a] = px.map(usize::from);
    (r * 3 + g * 5 + b * 7 + a * 11) % 64
}

impl<'a> DecoderPlugin<'a> for QoiDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        bytes.len() >= QOI_HEADER_SIZE && bytes.starts_with(b"qoif")
    }

    fn create_with_options(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<QoiDecoder<'a>, DecodeErrors> {
        QoiDecoder::decode_headers(bytes, options).map_err(DecodeErrors::in_header)
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame_count(&self) -> usize {
        1
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        check_frame_index(index, 1)?;

        let pixels = self.decode_rgba()?;
        let bitmap = Bitmap::from_rgba(self.width, self.height, pixels)?;

        Ok(FrameDescriptor::still(bitmap))
    }
}

impl<'a> QoiDecoder<'a> {
    fn decode_headers(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<QoiDecoder<'a>, DecodeErrors> {
        let mut stream = ByteReader::new(bytes);

        let magic = stream.get_fixed_bytes_or_err::<4>()?;

        if &magic != b"qoif" {
            return Err(DecodeErrors::Malformed(format!(
                "Wrong magic bytes, expected `qoif` but found {magic:?}"
            )));
        }
        let width = stream.get_u32_be_err()? as usize;
        let height = stream.get_u32_be_err()? as usize;
        let channels = stream.get_u8_err()?;
        let colorspace_layout = stream.get_u8_err()?;

        options.check_dimensions(width, height)?;

        let colorspace = match channels {
            3 => ColorSpace::RGB,
            4 => ColorSpace::RGBA,
            _ => {
                return Err(DecodeErrors::Malformed(format!(
                    "Unknown number of channels {channels}, expected 3 or 4"
                )))
            }
        };
        let colorspace_layout = match colorspace_layout {
            0 => QoiColorspace::sRGB,
            1 => QoiColorspace::Linear,
            _ => {
                if options.get_strict_mode() {
                    return Err(DecodeErrors::Malformed(format!(
                        "Unknown colorspace value {colorspace_layout}, expected 0 or 1"
                    )));
                }
                warn!("Unknown/invalid colorspace value {colorspace_layout}, expected 0 or 1");
                QoiColorspace::sRGB
            }
        };

        trace!("Image width: {:?}", width);
        trace!("Image height: {:?}", height);
        trace!("Image colorspace:{:?}", colorspace);

        Ok(QoiDecoder {
            data: bytes,
            width,
            height,
            colorspace,
            colorspace_layout,
            options
        })
    }
}
