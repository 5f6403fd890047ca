/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Colour tables for indexed images
use alloc::format;
use alloc::vec::Vec;

use loupe_core::errors::DecodeErrors;

/// An indexed colour table with RGBA entries
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Palette {
    entries: Vec<[u8; 4]>
}

impl Palette {
    pub fn new() -> Palette {
        Palette::default()
    }

    /// Build from packed RGB triples, every entry is opaque
    pub fn from_rgb(bytes: &[u8]) -> Palette {
        let entries = bytes
            .chunks_exact(3)
            .map(|x| [x[0], x[1], x[2], 255])
            .collect();
        Palette { entries }
    }

    /// Build from blue, green, red entries of `stride` bytes each,
    /// the layout BMP colour tables use
    pub fn from_bgr(bytes: &[u8], stride: usize) -> Palette {
        if stride < 3 {
            return Palette::new();
        }
        let entries = bytes
            .chunks_exact(stride)
            .map(|x| [x[2], x[1], x[0], 255])
            .collect();
        Palette { entries }
    }

    /// Build from a 16 bit colour map stored as all reds,
    /// then all greens, then all blues
    pub fn from_planar_u16(map: &[u16]) -> Palette {
        let count = map.len() / 3;
        let (red, rest) = map.split_at(count);
        let (green, blue) = rest.split_at(count);

        let entries = red
            .iter()
            .zip(green)
            .zip(blue)
            .map(|((r, g), b)| [(r >> 8) as u8, (g >> 8) as u8, (b >> 8) as u8, 255])
            .collect();
        Palette { entries }
    }

    /// A palette of `count` opaque black entries
    pub fn black(count: usize) -> Palette {
        Palette {
            entries: alloc::vec![[0, 0, 0, 255]; count]
        }
    }

    pub fn push(&mut self, entry: [u8; 4]) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<[u8; 4]> {
        self.entries.get(index).copied()
    }

    pub fn entries(&self) -> &[[u8; 4]] {
        &self.entries
    }

    /// Assign alpha values to the first `alpha.len()` entries
    pub fn set_alpha(&mut self, alpha: &[u8]) {
        for (entry, a) in self.entries.iter_mut().zip(alpha) {
            entry[3] = *a;
        }
    }

    /// Make the entry at `index` fully transparent, if it exists
    pub fn set_transparent(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry[3] = 0;
        }
    }

    /// Grow the table to `count` entries with `fill`, never shrinks it
    pub fn pad_to(&mut self, count: usize, fill: [u8; 4]) {
        if self.entries.len() < count {
            self.entries.resize(count, fill);
        }
    }

    /// Drop entries past `count`
    pub fn truncate(&mut self, count: usize) {
        self.entries.truncate(count);
    }

    /// Look up every index and write the RGBA result to `out`
    ///
    /// # Errors
    /// [`DecodeErrors::Malformed`] for an index past the end of the table
    pub fn expand<T: Copy + Into<usize>>(
        &self, indices: &[T], out: &mut [u8]
    ) -> Result<(), DecodeErrors> {
        for (pix, index) in out.chunks_exact_mut(4).zip(indices) {
            let index: usize = (*index).into();
            let entry = self.entries.get(index).ok_or_else(|| {
                DecodeErrors::Malformed(format!(
                    "Palette index {index} out of range for {} entries",
                    self.entries.len()
                ))
            })?;
            pix.copy_from_slice(entry);
        }
        Ok(())
    }
}
