/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The four VP8L transforms and their inverses
//!
//! Pixels are ARGB packed into a `u32`, alpha in the top byte. Channel
//! arithmetic wraps modulo 256.
use alloc::vec::Vec;

/// Number of `1 << bits` wide blocks needed to cover `size`
pub(crate) const fn subsample(size: usize, bits: u8) -> usize {
    (size + (1 << bits) - 1) >> bits
}

#[derive(Clone, Debug)]
pub(crate) enum Transform {
    /// Spatial prediction, one mode per block in bits 8..12 of `modes`
    Predictor {
        bits:  u8,
        width: usize,
        modes: Vec<u32>
    },
    /// Cross colour decorrelation, one multiplier triple per block
    Color {
        bits:     u8,
        width:    usize,
        elements: Vec<u32>
    },
    SubtractGreen,
    /// Palette indices, `bits` tells how many indices share one pixel
    ColorIndexing {
        bits:    u8,
        width:   usize,
        palette: Vec<u32>
    }
}

impl Transform {
    /// The two bit transform type of the bitstream
    pub(crate) const fn kind(&self) -> u32 {
        match self {
            Transform::Predictor { .. } => 0,
            Transform::Color { .. } => 1,
            Transform::SubtractGreen => 2,
            Transform::ColorIndexing { .. } => 3
        }
    }

    /// Width of the pixels stored after this transform, given the width before it
    pub(crate) const fn coded_width(&self, width: usize) -> usize {
        match self {
            Transform::ColorIndexing { bits, .. } => subsample(width, *bits),
            _ => width
        }
    }

    /// Undo the transform on `pixels`, `height` rows of coded pixels
    pub(crate) fn inverse(&self, mut pixels: Vec<u32>, height: usize) -> Vec<u32> {
        match self {
            Transform::Predictor { bits, width, modes } => {
                undo_prediction(&mut pixels, *width, height, *bits, modes);
                pixels
            }
            Transform::Color {
                bits,
                width,
                elements
            } => {
                undo_color_transform(&mut pixels, *width, *bits, elements);
                pixels
            }
            Transform::SubtractGreen => {
                for pixel in &mut pixels {
                    let green = (*pixel >> 8) & 0xff;
                    *pixel = add_pixels(*pixel, (green << 16) | green);
                }
                pixels
            }
            Transform::ColorIndexing {
                bits,
                width,
                palette
            } => expand_indices(&pixels, *width, height, *bits, palette)
        }
    }
}

/// Per channel sum modulo 256
#[inline]
pub(crate) const fn add_pixels(a: u32, b: u32) -> u32 {
    let alpha_green = (a & 0xff00_ff00).wrapping_add(b & 0xff00_ff00);
    let red_blue = (a & 0x00ff_00ff).wrapping_add(b & 0x00ff_00ff);
    (alpha_green & 0xff00_ff00) | (red_blue & 0x00ff_00ff)
}

#[inline]
const fn channel(pixel: u32, shift: u32) -> i32 {
    ((pixel >> shift) & 0xff) as i32
}

#[inline]
const fn average2(a: u32, b: u32) -> u32 {
    (((a ^ b) & 0xfefe_fefe) >> 1) + (a & b)
}

/// Whichever of `left` and `top` is closer to the gradient `left + top - top_left`
fn select(left: u32, top: u32, top_left: u32) -> u32 {
    let mut to_left = 0;
    let mut to_top = 0;

    for shift in [24, 16, 8, 0] {
        to_left += (channel(top, shift) - channel(top_left, shift)).abs();
        to_top += (channel(left, shift) - channel(top_left, shift)).abs();
    }
    if to_left < to_top {
        left
    } else {
        top
    }
}

fn clamp_add_subtract_full(a: u32, b: u32, c: u32) -> u32 {
    let mut out = 0;
    for shift in [24, 16, 8, 0] {
        let value = channel(a, shift) + channel(b, shift) - channel(c, shift);
        out |= (value.clamp(0, 255) as u32) << shift;
    }
    out
}

fn clamp_add_subtract_half(a: u32, b: u32) -> u32 {
    let mut out = 0;
    for shift in [24, 16, 8, 0] {
        let (a, b) = (channel(a, shift), channel(b, shift));
        let value = a + (a - b) / 2;
        out |= (value.clamp(0, 255) as u32) << shift;
    }
    out
}

/// Prediction of predictor `mode` from the neighbours of a pixel
pub(crate) fn predict(mode: u32, left: u32, top: u32, top_left: u32, top_right: u32) -> u32 {
    match mode {
        1 => left,
        2 => top,
        3 => top_right,
        4 => top_left,
        5 => average2(average2(left, top_right), top),
        6 => average2(left, top_left),
        7 => average2(left, top),
        8 => average2(top_left, top),
        9 => average2(top, top_right),
        10 => average2(average2(left, top_left), average2(top, top_right)),
        11 => select(left, top, top_left),
        12 => clamp_add_subtract_full(left, top, top_left),
        13 => clamp_add_subtract_half(average2(left, top), top_left),
        // 0, and the unassigned 14 and 15
        _ => 0xff00_0000
    }
}

fn undo_prediction(pixels: &mut [u32], width: usize, height: usize, bits: u8, modes: &[u32]) {
    if pixels.is_empty() {
        return;
    }
    let blocks_per_row = subsample(width, bits);

    // opaque black above the first pixel, left neighbours along the top row
    pixels[0] = add_pixels(pixels[0], 0xff00_0000);
    for x in 1..width {
        pixels[x] = add_pixels(pixels[x], pixels[x - 1]);
    }

    for y in 1..height {
        let row = y * width;
        let block_row = (y >> bits) * blocks_per_row;

        pixels[row] = add_pixels(pixels[row], pixels[row - width]);

        for x in 1..width {
            let pos = row + x;
            let mode = (modes[block_row + (x >> bits)] >> 8) & 0xf;
            // past the right edge the top right neighbour is the
            // first pixel of the current row, which is where it sits in memory
            let prediction = predict(
                mode,
                pixels[pos - 1],
                pixels[pos - width],
                pixels[pos - width - 1],
                pixels[pos - width + 1]
            );
            pixels[pos] = add_pixels(pixels[pos], prediction);
        }
    }
}

#[inline]
const fn color_delta(multiplier: u32, color: u32) -> u32 {
    (((multiplier as u8 as i8 as i32) * (color as u8 as i8 as i32)) >> 5) as u32
}

fn undo_color_transform(pixels: &mut [u32], width: usize, bits: u8, elements: &[u32]) {
    let blocks_per_row = subsample(width, bits);

    for (y, row) in pixels.chunks_exact_mut(width).enumerate() {
        let block_row = (y >> bits) * blocks_per_row;

        for (x, pixel) in row.iter_mut().enumerate() {
            let element = elements[block_row + (x >> bits)];
            let green_to_red = element & 0xff;
            let green_to_blue = (element >> 8) & 0xff;
            let red_to_blue = (element >> 16) & 0xff;

            let green = (*pixel >> 8) & 0xff;
            let red = (*pixel >> 16).wrapping_add(color_delta(green_to_red, green)) & 0xff;
            let blue = pixel
                .wrapping_add(color_delta(green_to_blue, green))
                .wrapping_add(color_delta(red_to_blue, red))
                & 0xff;

            *pixel = (*pixel & 0xff00_ff00) | (red << 16) | blue;
        }
    }
}

fn expand_indices(
    packed: &[u32], width: usize, height: usize, bits: u8, palette: &[u32]
) -> Vec<u32> {
    let packed_width = subsample(width, bits);
    let bits_per_index = 8 >> bits;
    let mask = (1 << bits_per_index) - 1;
    let per_pixel_mask = (1 << bits) - 1;

    let mut out = Vec::with_capacity(width * height);

    for row in packed.chunks_exact(packed_width).take(height) {
        for x in 0..width {
            let green = (row[x >> bits] >> 8) & 0xff;
            let shift = (x & per_pixel_mask) * bits_per_index;
            let index = (green >> shift) & mask;
            // indices past the palette are transparent black
            out.push(palette.get(index as usize).copied().unwrap_or(0));
        }
    }
    out
}
