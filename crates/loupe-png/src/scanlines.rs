/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! From compressed image data to RGBA pixels
//!
//! Inflates the zlib stream, reverses the per row filters of each
//! (possibly interlaced) pass and expands every row to RGBA8.
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use loupe_core::bit_depth::{BitDepth, ByteEndian};
use loupe_core::bitmap::Bitmap;
use loupe_core::errors::DecodeErrors;
use loupe_core::log::{trace, warn};
use loupe_core::options::DecoderOptions;
use loupe_inflate::{DeflateDecoder, DeflateOptions};
use loupe_pixels::color_convert::convert_row_to_rgba;
use loupe_pixels::predictor::{unfilter_row, FilterMethod};
use loupe_pixels::sample::{packed_row_bytes, scale_to_u8, unpack_row};
use loupe_pixels::Palette;

use crate::constants::{ADAM7_X_START, ADAM7_X_STEP, ADAM7_Y_START, ADAM7_Y_STEP};
use crate::decoder::PixelFormat;
use crate::enums::{InterlaceMethod, PngColor};

fn bit_depth(depth: u8) -> Result<BitDepth, DecodeErrors> {
    BitDepth::from_bits(u16::from(depth))
        .ok_or_else(|| DecodeErrors::Malformed(format!("Unknown bit depth {depth}")))
}

/// Bytes in one row of `width` pixels, without the filter byte
fn row_bytes(format: &PixelFormat, width: usize) -> Result<usize, DecodeErrors> {
    let samples = width
        .checked_mul(format.info.color.num_components())
        .ok_or(DecodeErrors::Malformed("Row size overflows".into()))?;

    packed_row_bytes(samples, bit_depth(format.info.depth)?)
        .ok_or(DecodeErrors::Malformed("Row size overflows".into()))
}

/// Width and height of an Adam7 pass
fn pass_size(pass: usize, width: usize, height: usize) -> (usize, usize) {
    let w = (width + ADAM7_X_STEP[pass] - 1 - ADAM7_X_START[pass]) / ADAM7_X_STEP[pass];
    let h = (height + ADAM7_Y_STEP[pass] - 1 - ADAM7_Y_START[pass]) / ADAM7_Y_STEP[pass];
    (w, h)
}

/// Size of the inflated data for an image of `width` x `height`, filter bytes included
fn raw_size(format: &PixelFormat, width: usize, height: usize) -> Result<usize, DecodeErrors> {
    match format.info.interlace {
        InterlaceMethod::Standard => Ok((row_bytes(format, width)? + 1) * height),
        InterlaceMethod::Adam7 => {
            let mut total = 0;
            for pass in 0..7 {
                let (w, h) = pass_size(pass, width, height);
                if w != 0 && h != 0 {
                    total += (row_bytes(format, w)? + 1) * h;
                }
            }
            Ok(total)
        }
    }
}

/// Expands unfiltered rows to RGBA8
struct RowConverter<'p> {
    color:    PngColor,
    depth:    BitDepth,
    palette:  Option<&'p Palette>,
    trns_key: Option<[u16; 3]>,
    samples:  Vec<u16>
}

impl<'p> RowConverter<'p> {
    fn new(format: &'p PixelFormat, width: usize) -> Result<RowConverter<'p>, DecodeErrors> {
        Ok(RowConverter {
            color:    format.info.color,
            depth:    bit_depth(format.info.depth)?,
            palette:  format.palette.as_ref(),
            trns_key: format.trns_key,
            samples:  vec![0; width * format.info.color.num_components()]
        })
    }

    fn convert(&mut self, row: &[u8], out: &mut [u8]) -> Result<(), DecodeErrors> {
        let pixels = out.len() / 4;

        // common case, bytes are already samples
        if self.depth == BitDepth::Eight && self.trns_key.is_none() && self.color != PngColor::Palette
        {
            return convert_row_to_rgba(self.color.colorspace(), row, out);
        }

        let samples = &mut self.samples[..pixels * self.color.num_components()];
        unpack_row(row, self.depth, ByteEndian::BE, samples)?;

        let depth = self.depth;
        let key = self.trns_key;

        match self.color {
            PngColor::Palette => {
                let palette = self
                    .palette
                    .ok_or(DecodeErrors::Malformed("Palette image without a PLTE chunk".into()))?;
                palette.expand(samples, out)?;
            }
            PngColor::Luma => {
                for (px, s) in out.chunks_exact_mut(4).zip(samples.iter()) {
                    let v = scale_to_u8(*s, depth);
                    let a = if key.is_some_and(|k| k[0] == *s) { 0 } else { 255 };
                    px.copy_from_slice(&[v, v, v, a]);
                }
            }
            PngColor::LumaA => {
                for (px, s) in out.chunks_exact_mut(4).zip(samples.chunks_exact(2)) {
                    let v = scale_to_u8(s[0], depth);
                    px.copy_from_slice(&[v, v, v, scale_to_u8(s[1], depth)]);
                }
            }
            PngColor::RGB => {
                for (px, s) in out.chunks_exact_mut(4).zip(samples.chunks_exact(3)) {
                    px[0] = scale_to_u8(s[0], depth);
                    px[1] = scale_to_u8(s[1], depth);
                    px[2] = scale_to_u8(s[2], depth);
                    px[3] = if key.is_some_and(|k| k == [s[0], s[1], s[2]]) { 0 } else { 255 };
                }
            }
            PngColor::RGBA => {
                for (px, s) in out.chunks_exact_mut(4).zip(samples.chunks_exact(4)) {
                    for (p, v) in px.iter_mut().zip(s) {
                        *p = scale_to_u8(*v, depth);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Reverse the filters of one pass, handing every finished row to `emit`
///
/// Returns the number of bytes of `data` the pass occupied
fn unfilter_pass<F>(
    data: &[u8], format: &PixelFormat, width: usize, height: usize, mut emit: F
) -> Result<usize, DecodeErrors>
where
    F: FnMut(usize, &[u8]) -> Result<(), DecodeErrors>
{
    let stride = row_bytes(format, width)?;
    // bytes per complete pixel, one for sub byte depths
    let components =
        (format.info.color.num_components() * usize::from(format.info.depth)).div_ceil(8);

    // the row above the first one is all zeroes
    let mut prev = vec![0_u8; stride];
    let mut current = vec![0_u8; stride];

    for (y, line) in data.chunks(stride + 1).take(height).enumerate() {
        if line.len() != stride + 1 {
            return Err(DecodeErrors::Truncated);
        }
        let filter = FilterMethod::from_int(line[0])
            .ok_or_else(|| DecodeErrors::Malformed(format!("Unknown filter {}", line[0])))?;

        unfilter_row(filter, &prev, &line[1..], &mut current, components);
        emit(y, &current)?;

        core::mem::swap(&mut prev, &mut current);
    }
    let used = (stride + 1) * height;

    if data.len() < used {
        return Err(DecodeErrors::Truncated);
    }
    Ok(used)
}

/// Decode one image (the default image or an APNG frame) of `width` x `height`
pub(crate) fn decode_image(
    format: &PixelFormat, width: usize, height: usize, zlib: &[u8], options: &DecoderOptions
) -> Result<Bitmap, DecodeErrors> {
    let expected = raw_size(format, width, height)?;

    let deflate_options = DeflateOptions::default()
        .set_confirm_checksum(options.inflate_get_confirm_adler())
        .set_limit(options.inflate_get_limit())
        .set_size_hint(expected);

    let data = DeflateDecoder::new_with_options(zlib, deflate_options).decode_zlib()?;

    trace!("Inflated {} bytes, expected {expected}", data.len());

    if data.len() > expected {
        warn!("{} bytes of extra image data", data.len() - expected);
    }

    let mut pixels = vec![0_u8; width * height * 4];
    let mut converter = RowConverter::new(format, width)?;

    match format.info.interlace {
        InterlaceMethod::Standard => {
            unfilter_pass(&data, format, width, height, |y, row| {
                converter.convert(row, &mut pixels[y * width * 4..(y + 1) * width * 4])
            })?;
        }
        InterlaceMethod::Adam7 => {
            let mut line = vec![0_u8; width * 4];
            let mut offset = 0;

            for pass in 0..7 {
                let (pass_width, pass_height) = pass_size(pass, width, height);

                if pass_width == 0 || pass_height == 0 {
                    continue;
                }
                let pass_data = data.get(offset..).ok_or(DecodeErrors::Truncated)?;

                offset += unfilter_pass(pass_data, format, pass_width, pass_height, |j, row| {
                    let line = &mut line[..pass_width * 4];
                    converter.convert(row, line)?;

                    let y = ADAM7_Y_START[pass] + j * ADAM7_Y_STEP[pass];

                    for (i, px) in line.chunks_exact(4).enumerate() {
                        let x = ADAM7_X_START[pass] + i * ADAM7_X_STEP[pass];
                        let start = (y * width + x) * 4;
                        pixels[start..start + 4].copy_from_slice(px);
                    }
                    Ok(())
                })?;
            }
        }
    }
    Bitmap::from_rgba(width, height, pixels)
}
