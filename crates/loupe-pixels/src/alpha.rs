/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Alpha pre-multiplication
//!
//! Premultiplied colour is `color * alpha / 255`, undoing it is
//! `color * 255 / alpha`. Both are done in integers, for u8 the
//! intermediate values are bounded by `0..=65535`.
//!
//! Undoing is lossy for small alpha values, a colour premultiplied with
//! an alpha of 1 can only come back as 0 or 255.
use loupe_core::bitmap::{AlphaState, Bitmap};

/// Premultiply RGBA pixels in place
pub fn premultiply_rgba(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = u16::from(px[3]);

        for color in &mut px[..3] {
            // rounded division by 255
            let temp = (alpha * u16::from(*color)) + 0x80;
            *color = ((temp + (temp >> 8)) >> 8) as u8;
        }
    }
}

/// Undo premultiplication of RGBA pixels in place
///
/// Fully transparent pixels become transparent black.
pub fn unpremultiply_rgba(pixels: &mut [u8]) {
    const MAX_VALUE: u32 = 255;

    for px in pixels.chunks_exact_mut(4) {
        let alpha = u32::from(px[3]);

        if alpha == 0 {
            px[..3].fill(0);
            continue;
        }
        for color in &mut px[..3] {
            let value = (u32::from(*color) * MAX_VALUE + alpha / 2) / alpha;
            *color = value.min(MAX_VALUE) as u8;
        }
    }
}

/// Convert `bitmap` to `target` if it is not already in that state
pub fn convert_alpha(bitmap: &mut Bitmap, target: AlphaState) {
    if bitmap.alpha_state() == target {
        return;
    }
    match target {
        AlphaState::PreMultiplied => premultiply_rgba(bitmap.pixels_mut()),
        AlphaState::NonPreMultiplied => unpremultiply_rgba(bitmap.pixels_mut())
    }
    bitmap.set_alpha_state(target);
}

/// Whether every pixel has an alpha of zero
///
/// Some writers store a fourth channel that is never filled in,
/// such images are meant to be opaque.
pub fn alpha_is_all_zero(pixels: &[u8]) -> bool {
    pixels.chunks_exact(4).all(|px| px[3] == 0)
}

/// Set the alpha of every pixel to 255
pub fn force_opaque(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px[3] = 255;
    }
}
