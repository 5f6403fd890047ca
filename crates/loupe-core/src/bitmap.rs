/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Decoded pixel buffers
//!
//! Every decoder hands out [`Bitmap`]s, 8 bits per channel RGBA
//! stored row after row without padding.
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::errors::DecodeErrors;
use crate::frame::Blend;

/// Contains information about whether the image
/// is pre multiplied with it's alpha
/// or it's not
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlphaState {
    PreMultiplied,
    NonPreMultiplied
}

/// A rectangle inside a canvas, in pixels
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Rect {
    pub x:      usize,
    pub y:      usize,
    pub width:  usize,
    pub height: usize
}

impl Rect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Rect {
        Rect {
            x,
            y,
            width,
            height
        }
    }

    /// A rectangle at the origin
    pub const fn from_size(width: usize, height: usize) -> Rect {
        Rect::new(0, 0, width, height)
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the pixel `(x, y)` lies inside the rectangle
    pub const fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }

    /// Whether `self` lies completely inside `other`
    pub fn fits_in(&self, other: &Rect) -> bool {
        self.x >= other.x
            && self.y >= other.y
            && self.x.saturating_add(self.width) <= other.x.saturating_add(other.width)
            && self.y.saturating_add(self.height) <= other.y.saturating_add(other.height)
    }

    /// The overlapping area of two rectangles, an empty
    /// rectangle if they do not overlap
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self
            .x
            .saturating_add(self.width)
            .min(other.x.saturating_add(other.width));
        let y1 = self
            .y
            .saturating_add(self.height)
            .min(other.y.saturating_add(other.height));

        if x1 <= x0 || y1 <= y0 {
            return Rect::new(x0, y0, 0, 0);
        }
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// An owned RGBA pixel buffer
#[derive(Clone, Eq, PartialEq)]
pub struct Bitmap {
    width:  usize,
    height: usize,
    alpha:  AlphaState,
    data:   Vec<u8>
}

impl Bitmap {
    /// Create a fully transparent bitmap
    pub fn new(width: usize, height: usize) -> Bitmap {
        Bitmap {
            width,
            height,
            alpha: AlphaState::NonPreMultiplied,
            data: vec![0; width * height * 4]
        }
    }

    /// Wrap already decoded RGBA pixels
    ///
    /// # Errors
    /// If `data` does not hold exactly `width * height * 4` bytes
    pub fn from_rgba(width: usize, height: usize, data: Vec<u8>) -> Result<Bitmap, DecodeErrors> {
        let expected = width
            .checked_mul(height)
            .and_then(|x| x.checked_mul(4))
            .ok_or(DecodeErrors::Malformed(format!(
                "Bitmap dimensions {width}x{height} overflow"
            )))?;

        if data.len() != expected {
            return Err(DecodeErrors::Malformed(format!(
                "Expected {expected} bytes for a {width}x{height} bitmap but found {}",
                data.len()
            )));
        }
        Ok(Bitmap {
            width,
            height,
            alpha: AlphaState::NonPreMultiplied,
            data
        })
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get image dimensions as a tuple of width and height
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub const fn alpha_state(&self) -> AlphaState {
        self.alpha
    }

    pub fn set_alpha_state(&mut self, state: AlphaState) {
        self.alpha = state;
    }

    /// The rectangle covering the whole bitmap
    pub const fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Return the RGBA value at `(x, y)`, `None` if outside the bitmap
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * 4;
        let mut out = [0; 4];
        out.copy_from_slice(self.data.get(start..start + 4)?);
        Some(out)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Copy the pixels inside `rect` (clipped to the bitmap) into a new bitmap
    pub fn region(&self, rect: Rect) -> Bitmap {
        let area = rect.intersect(&self.bounds());
        let mut out = Bitmap::new(area.width, area.height);
        out.alpha = self.alpha;

        if area.is_empty() {
            return out;
        }
        let stride = self.width * 4;
        let row_bytes = area.width * 4;

        for (row, dst) in out.data.chunks_exact_mut(row_bytes).enumerate() {
            let start = (area.y + row) * stride + area.x * 4;
            dst.copy_from_slice(&self.data[start..start + row_bytes]);
        }
        out
    }

    /// Set every pixel inside `rect` (clipped to the bitmap) to `color`
    pub fn fill_rect(&mut self, rect: Rect, color: [u8; 4]) {
        let area = rect.intersect(&self.bounds());
        let stride = self.width * 4;

        for row in self
            .data
            .chunks_exact_mut(stride)
            .skip(area.y)
            .take(area.height)
        {
            for px in row[area.x * 4..(area.x + area.width) * 4].chunks_exact_mut(4) {
                px.copy_from_slice(&color);
            }
        }
    }

    /// Draw `src` with its top left corner at `(x, y)`
    ///
    /// Pixels falling outside this bitmap are dropped.
    pub fn draw(&mut self, src: &Bitmap, x: usize, y: usize, blend: Blend) {
        let target = Rect::new(x, y, src.width, src.height).intersect(&self.bounds());

        if target.is_empty() {
            return;
        }
        let dst_stride = self.width * 4;
        let src_stride = src.width * 4;

        for row in 0..target.height {
            let dst_start = (target.y + row) * dst_stride + target.x * 4;
            let src_start = (target.y - y + row) * src_stride + (target.x - x) * 4;

            let dst_row = &mut self.data[dst_start..dst_start + target.width * 4];
            let src_row = &src.data[src_start..src_start + target.width * 4];

            match blend {
                Blend::Source => dst_row.copy_from_slice(src_row),
                Blend::SourceOver => {
                    for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                        composite_over(d, s);
                    }
                }
            }
        }
    }
}

/// Porter-Duff over for one non premultiplied RGBA pixel
#[inline]
fn composite_over(dst: &mut [u8], src: &[u8]) {
    let src_a = u32::from(src[3]);

    if src_a == 255 {
        dst.copy_from_slice(src);
        return;
    }
    if src_a == 0 {
        return;
    }
    // everything below is scaled by 255*255
    let dst_weight = u32::from(dst[3]) * (255 - src_a);
    let out_alpha = src_a * 255 + dst_weight;

    for (d, s) in dst[..3].iter_mut().zip(&src[..3]) {
        let value = u32::from(*s) * src_a * 255 + u32::from(*d) * dst_weight;
        *d = ((value + out_alpha / 2) / out_alpha) as u8;
    }
    dst[3] = ((out_alpha + 127) / 255) as u8;
}

impl Debug for Bitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("alpha", &self.alpha)
            .finish()
    }
}
