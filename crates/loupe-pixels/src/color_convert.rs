/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Colour space conversion to RGBA8
//!
//! YCbCr to RGB uses BT.601 full range coefficients in 14 bit fixed
//! point, results stay within one unit of the exact floating point
//! conversion.
use alloc::format;

use loupe_core::colorspace::ColorSpace;
use loupe_core::errors::DecodeErrors;

// Bt.601 Full Range inverse coefficients computed with 14 bits of precision
const Y_CF: i32 = 16384;
const CR_CF: i32 = 22970;
const CB_CF: i32 = 29032;
const C_G_CR_COEF_1: i32 = -11700;
const C_G_CB_COEF_2: i32 = -5638;
const YUV_PREC: i32 = 14;
// Rounding const for YUV -> RGB conversion: floating equivalent 0.499(9).
const YUV_RND: i32 = (1 << (YUV_PREC - 1)) - 1;

/// Limit values to 0 and 255
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp(a: i32) -> u8 {
    a.clamp(0, 255) as u8
}

/// Convert one YCbCr sample triple to RGB
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let cr = i32::from(cr) - 128;
    let cb = i32::from(cb) - 128;

    let y0 = i32::from(y) * Y_CF + YUV_RND;

    let r = (y0 + cr * CR_CF) >> YUV_PREC;
    let g = (y0 + cr * C_G_CR_COEF_1 + cb * C_G_CB_COEF_2) >> YUV_PREC;
    let b = (y0 + cb * CB_CF) >> YUV_PREC;

    [clamp(r), clamp(g), clamp(b)]
}

/// Multiply two values in the 0..=255 range, result also in 0..=255
#[inline]
fn blinn_8x8(in_val: u8, y: u8) -> u8 {
    let t = i32::from(in_val) * i32::from(y) + 128;
    ((t + (t >> 8)) >> 8) as u8
}

/// Convert one non inverted CMYK sample to RGB
///
/// `0` is no ink, `255` full ink: `R = (255 - C) * (255 - K) / 255`
#[inline]
pub fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - k;
    [blinn_8x8(255 - c, k), blinn_8x8(255 - m, k), blinn_8x8(255 - y, k)]
}

/// Convert a row of interleaved 8 bit samples in `colorspace` to RGBA
///
/// `out` receives four bytes per pixel, colour spaces without alpha
/// produce opaque pixels.
///
/// # Errors
/// - [`DecodeErrors::Malformed`] for [`ColorSpace::Palette`], which needs a
///   [`Palette`](crate::palette::Palette) instead
/// - [`DecodeErrors::Truncated`] if `input` holds fewer pixels than `out`
pub fn convert_row_to_rgba(
    colorspace: ColorSpace, input: &[u8], out: &mut [u8]
) -> Result<(), DecodeErrors> {
    let components = colorspace.num_components();
    let pixels = out.len() / 4;

    if colorspace == ColorSpace::Palette {
        return Err(DecodeErrors::Malformed(format!(
            "Cannot convert {colorspace:?} samples without a palette"
        )));
    }
    if input.len() < pixels * components {
        return Err(DecodeErrors::Truncated);
    }
    let dst = out.chunks_exact_mut(4);
    let src = input.chunks_exact(components);

    match colorspace {
        ColorSpace::RGB => {
            for (d, s) in dst.zip(src) {
                d[..3].copy_from_slice(s);
                d[3] = 255;
            }
        }
        ColorSpace::RGBA => {
            for (d, s) in dst.zip(src) {
                d.copy_from_slice(s);
            }
        }
        ColorSpace::Luma => {
            for (d, s) in dst.zip(src) {
                d.copy_from_slice(&[s[0], s[0], s[0], 255]);
            }
        }
        ColorSpace::LumaA => {
            for (d, s) in dst.zip(src) {
                d.copy_from_slice(&[s[0], s[0], s[0], s[1]]);
            }
        }
        ColorSpace::YCbCr => {
            for (d, s) in dst.zip(src) {
                d[..3].copy_from_slice(&ycbcr_to_rgb(s[0], s[1], s[2]));
                d[3] = 255;
            }
        }
        ColorSpace::CMYK => {
            for (d, s) in dst.zip(src) {
                d[..3].copy_from_slice(&cmyk_to_rgb(s[0], s[1], s[2], s[3]));
                d[3] = 255;
            }
        }
        ColorSpace::CMYKA => {
            for (d, s) in dst.zip(src) {
                d[..3].copy_from_slice(&cmyk_to_rgb(s[0], s[1], s[2], s[3]));
                d[3] = s[4];
            }
        }
        ColorSpace::Palette => ()
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use loupe_core::colorspace::ColorSpace;
    use loupe_core::errors::DecodeErrors;

    use crate::color_convert::{cmyk_to_rgb, convert_row_to_rgba, ycbcr_to_rgb};

    fn reference(y: u8, cb: u8, cr: u8) -> [f64; 3] {
        let y = f64::from(y);
        let cb = f64::from(cb) - 128.0;
        let cr = f64::from(cr) - 128.0;
        [
            y + 1.402 * cr,
            y - 0.344_136 * cb - 0.714_136 * cr,
            y + 1.772 * cb
        ]
    }

    #[test]
    fn ycbcr_within_one_of_float() {
        for y in (0..=255).step_by(5) {
            for cb in (0..=255).step_by(15) {
                for cr in (0..=255).step_by(15) {
                    let got = ycbcr_to_rgb(y, cb, cr);
                    let expected = reference(y, cb, cr);

                    for (g, e) in got.iter().zip(expected) {
                        let e = e.round().clamp(0.0, 255.0);
                        assert!(
                            (f64::from(*g) - e).abs() <= 1.0,
                            "({y},{cb},{cr}) -> {got:?}, expected {expected:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn ycbcr_grays() {
        assert_eq!(ycbcr_to_rgb(0, 128, 128), [0, 0, 0]);
        assert_eq!(ycbcr_to_rgb(255, 128, 128), [255, 255, 255]);
        assert_eq!(ycbcr_to_rgb(77, 128, 128), [77, 77, 77]);
    }

    #[test]
    fn cmyk_extremes() {
        assert_eq!(cmyk_to_rgb(0, 0, 0, 0), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb(0, 0, 0, 255), [0, 0, 0]);
        assert_eq!(cmyk_to_rgb(255, 0, 0, 0), [0, 255, 255]);
        assert_eq!(cmyk_to_rgb(0, 255, 255, 0), [255, 0, 0]);
    }

    #[test]
    fn gray_alpha_row() {
        let mut out = [0; 8];
        convert_row_to_rgba(ColorSpace::LumaA, &[10, 20, 30, 40], &mut out).unwrap();
        assert_eq!(out, [10, 10, 10, 20, 30, 30, 30, 40]);
    }

    #[test]
    fn palette_needs_a_palette() {
        let mut out = [0; 4];
        assert!(matches!(
            convert_row_to_rgba(ColorSpace::Palette, &[0], &mut out),
            Err(DecodeErrors::Malformed(_))
        ));
        assert_eq!(
            convert_row_to_rgba(ColorSpace::RGB, &[0, 0], &mut out),
            Err(DecodeErrors::Truncated)
        );
    }
}
