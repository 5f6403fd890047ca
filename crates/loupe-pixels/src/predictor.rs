/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Predictor undoing
//!
//! Encoders store the difference between a sample and its neighbours,
//! decoding sums the differences back up along each row.

/// Undo horizontal differencing on a row of 8 bit samples
///
/// Each sample is stored as the difference to the sample `components`
/// positions to its left, the first pixel is stored as is.
pub fn undo_horizontal_u8(row: &mut [u8], components: usize) {
    if components == 0 {
        return;
    }
    for i in components..row.len() {
        row[i] = row[i].wrapping_add(row[i - components]);
    }
}

/// Undo horizontal differencing on a row of 16 bit samples
pub fn undo_horizontal_u16(row: &mut [u16], components: usize) {
    if components == 0 {
        return;
    }
    for i in components..row.len() {
        row[i] = row[i].wrapping_add(row[i - components]);
    }
}

/// Per row filters used by PNG
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterMethod {
    None,
    Sub,
    Up,
    Average,
    Paeth
}

impl FilterMethod {
    pub fn from_int(int: u8) -> Option<FilterMethod> {
        match int {
            0 => Some(FilterMethod::None),
            1 => Some(FilterMethod::Sub),
            2 => Some(FilterMethod::Up),
            3 => Some(FilterMethod::Average),
            4 => Some(FilterMethod::Paeth),
            _ => None
        }
    }
}

/// Reverse a row filter
///
/// `prev_row` is the already unfiltered row above (all zeroes for the
/// first row), `raw` the filtered bytes and `current` receives the
/// unfiltered row. `components` is the number of bytes per complete
/// pixel, rounded up to one for sub byte depths.
pub fn unfilter_row(
    filter: FilterMethod, prev_row: &[u8], raw: &[u8], current: &mut [u8], components: usize
) {
    let end = current.len().min(raw.len());
    let components = components.max(1);

    match filter {
        FilterMethod::None => current[..end].copy_from_slice(&raw[..end]),
        FilterMethod::Sub => {
            for i in 0..end {
                let a = if i >= components { current[i - components] } else { 0 };
                current[i] = raw[i].wrapping_add(a);
            }
        }
        FilterMethod::Up => {
            for i in 0..end {
                let b = prev_row.get(i).copied().unwrap_or(0);
                current[i] = raw[i].wrapping_add(b);
            }
        }
        FilterMethod::Average => {
            for i in 0..end {
                let a = if i >= components { current[i - components] } else { 0 };
                let b = prev_row.get(i).copied().unwrap_or(0);
                // average without overflowing u8
                let c = (a & b) + ((a ^ b) >> 1);
                current[i] = raw[i].wrapping_add(c);
            }
        }
        FilterMethod::Paeth => {
            for i in 0..end {
                let (a, c) = if i >= components {
                    (
                        current[i - components],
                        prev_row.get(i - components).copied().unwrap_or(0)
                    )
                } else {
                    (0, 0)
                };
                let b = prev_row.get(i).copied().unwrap_or(0);
                current[i] = raw[i].wrapping_add(paeth(a, b, c));
            }
        }
    }
}

/// The Paeth predictor, whichever of left, above or upper left is
/// closest to `a + b - c`
#[inline(always)]
pub fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let a = i16::from(a);
    let b = i16::from(b);
    let c = i16::from(c);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}
