/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! ALPH chunks, the alpha plane that goes with lossy image data
use alloc::format;
use alloc::vec::Vec;

use loupe_bitstream::{BitOrder, BitReader};
use loupe_core::errors::DecodeErrors;
use loupe_core::log::trace;

use crate::lossless::decode_image_stream;

/// How alpha values were predicted before being stored
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AlphaFilter {
    None,
    Horizontal,
    Vertical,
    Gradient
}

impl AlphaFilter {
    const fn from_bits(bits: u8) -> AlphaFilter {
        match bits & 3 {
            0 => AlphaFilter::None,
            1 => AlphaFilter::Horizontal,
            2 => AlphaFilter::Vertical,
            _ => AlphaFilter::Gradient
        }
    }
}

/// Decode an ALPH chunk to one alpha byte per pixel
///
/// # Errors
/// - [`DecodeErrors::Malformed`] for an unknown compression method
/// - [`DecodeErrors::Truncated`] when the plane holds fewer than `width * height` values
pub(crate) fn decode_alpha(
    data: &[u8], width: usize, height: usize
) -> Result<Vec<u8>, DecodeErrors> {
    let (&header, payload) = data.split_first().ok_or(DecodeErrors::Truncated)?;

    let compression = header & 3;
    let filter = AlphaFilter::from_bits(header >> 2);

    trace!("ALPH compression {compression} filter {filter:?}");

    let mut alpha = match compression {
        0 => payload
            .get(..width * height)
            .ok_or(DecodeErrors::Truncated)?
            .to_vec(),
        1 => {
            // a headerless lossless stream, alpha lives in the green channel
            let mut reader = BitReader::new(payload, BitOrder::Lsb);
            decode_image_stream(&mut reader, width, height)?
                .iter()
                .map(|argb| (argb >> 8) as u8)
                .collect()
        }
        other => {
            return Err(DecodeErrors::Malformed(format!(
                "Unknown ALPH compression method {other}"
            )))
        }
    };
    unfilter(&mut alpha, width, filter);
    Ok(alpha)
}

/// Add each value's prediction back, in scan order
fn unfilter(alpha: &mut [u8], width: usize, filter: AlphaFilter) {
    if filter == AlphaFilter::None {
        return;
    }
    for pos in 1..alpha.len() {
        let (x, y) = (pos % width, pos / width);

        let prediction = if y == 0 {
            alpha[pos - 1]
        } else if x == 0 {
            alpha[pos - width]
        } else {
            let left = alpha[pos - 1];
            let top = alpha[pos - width];

            match filter {
                AlphaFilter::Horizontal => left,
                AlphaFilter::Vertical => top,
                _ => {
                    let top_left = alpha[pos - width - 1];
                    (i16::from(left) + i16::from(top) - i16::from(top_left)).clamp(0, 255) as u8
                }
            }
        };
        alpha[pos] = alpha[pos].wrapping_add(prediction);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::alpha::decode_alpha;

    // 3x2 plane of residuals
    const RESIDUALS: [u8; 6] = [10, 5, 250, 3, 4, 20];

    fn chunk(filter: u8) -> Vec<u8> {
        let mut data = vec![filter << 2];
        data.extend_from_slice(&RESIDUALS);
        data
    }

    #[test]
    fn raw_without_filter() {
        assert_eq!(decode_alpha(&chunk(0), 3, 2).unwrap(), RESIDUALS);
    }

    #[test]
    fn horizontal() {
        // row 0 from the left, (0, 1) from above, the rest from the left
        assert_eq!(decode_alpha(&chunk(1), 3, 2).unwrap(), [10, 15, 9, 13, 17, 37]);
    }

    #[test]
    fn vertical() {
        assert_eq!(decode_alpha(&chunk(2), 3, 2).unwrap(), [10, 15, 9, 13, 19, 29]);
    }

    #[test]
    fn gradient_clamps() {
        // (1, 1): 13 + 15 - 10 = 18, (2, 1): 22 + 9 - 15 = 16
        assert_eq!(decode_alpha(&chunk(3), 3, 2).unwrap(), [10, 15, 9, 13, 22, 36]);

        let data = [3 << 2, 200, 100, 56, 250];
        // (1, 1): 0 + 44 - 200 clamps to 0
        assert_eq!(decode_alpha(&data, 2, 2).unwrap(), [200, 44, 0, 250]);
    }

    #[test]
    fn short_plane_and_unknown_compression() {
        assert!(decode_alpha(&chunk(0), 4, 2).is_err());
        assert!(decode_alpha(&[2], 1, 1).is_err());
        assert!(decode_alpha(&[], 1, 1).is_err());
    }
}
