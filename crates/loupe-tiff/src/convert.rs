/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Turning decompressed rows into RGBA
use alloc::format;
use alloc::vec::Vec;

use loupe_core::bit_depth::{BitDepth, ByteEndian};
use loupe_core::errors::DecodeErrors;
use loupe_pixels::color_convert::{cmyk_to_rgb, ycbcr_to_rgb};
use loupe_pixels::predictor::{undo_horizontal_u16, undo_horizontal_u8};
use loupe_pixels::sample::{scale_to_u8, unpack_row};

use crate::decoder::TiffInfo;
use crate::enums::Photometric;

/// Converts rows of one image, reusing its sample buffer between rows
pub(crate) struct RowConverter<'i> {
    info:    &'i TiffInfo,
    endian:  ByteEndian,
    samples: Vec<u16>
}

impl<'i> RowConverter<'i> {
    pub(crate) fn new(info: &'i TiffInfo, endian: ByteEndian) -> RowConverter<'i> {
        RowConverter {
            info,
            endian,
            samples: Vec::new()
        }
    }

    /// Convert a packed row of `width` pixels to RGBA in `out`
    ///
    /// `row` is modified in place when a predictor is undone.
    pub(crate) fn convert(
        &mut self, row: &mut [u8], width: usize, out: &mut [u8]
    ) -> Result<(), DecodeErrors> {
        let info = self.info;
        let spp = info.samples_per_pixel;
        let depth = info.depth;

        self.samples.resize(width * spp, 0);

        if info.horizontal_predictor && depth == BitDepth::Eight {
            undo_horizontal_u8(row, spp);
        }
        unpack_row(row, depth, self.endian, &mut self.samples)?;

        if info.horizontal_predictor && depth == BitDepth::Sixteen {
            undo_horizontal_u16(&mut self.samples, spp);
        }

        let scale = |value: u16| scale_to_u8(value, depth);
        let channels = info.photometric.color_channels();
        let palette = info.palette.as_ref();

        for (px, dst) in self.samples.chunks_exact(spp).zip(out.chunks_exact_mut(4)) {
            let [r, g, b] = match info.photometric {
                Photometric::WhiteIsZero => {
                    let grey = 255 - scale(px[0]);
                    [grey, grey, grey]
                }
                Photometric::BlackIsZero => {
                    let grey = scale(px[0]);
                    [grey, grey, grey]
                }
                Photometric::RGB => [scale(px[0]), scale(px[1]), scale(px[2])],
                Photometric::Palette => {
                    let index = usize::from(px[0]);
                    let entry = palette.and_then(|x| x.get(index)).ok_or_else(|| {
                        DecodeErrors::Malformed(format!("Colour map has no entry {index}"))
                    })?;
                    [entry[0], entry[1], entry[2]]
                }
                Photometric::CMYK => {
                    cmyk_to_rgb(scale(px[0]), scale(px[1]), scale(px[2]), scale(px[3]))
                }
                // eight bit samples only
                Photometric::YCbCr => ycbcr_to_rgb(px[0] as u8, px[1] as u8, px[2] as u8)
            };
            let alpha = match info.alpha {
                Some(_) => px.get(channels).map_or(255, |x| scale(*x)),
                None => 255
            };
            dst.copy_from_slice(&[r, g, b, alpha]);
        }
        Ok(())
    }
}
