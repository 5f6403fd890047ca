/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Strip and tile decompression
use alloc::vec::Vec;

use loupe_bitstream::ccitt::{CcittDecoder, CcittMode, CcittOptions};
use loupe_bitstream::{BitOrder, LzwDecoder, LzwOptions};
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::log::{trace, warn};
use loupe_core::options::DecoderOptions;
use loupe_inflate::{DeflateDecoder, DeflateOptions};

use crate::decoder::TiffInfo;
use crate::enums::TiffCompression;

/// T4Options bit selecting two dimensional coding
const T4_TWO_DIMENSIONAL: u32 = 1;
/// T4Options bit allowing zero padding before EOL codes
const T4_FILL_BITS: u32 = 4;

/// Decompress one strip or tile of `width` x `rows` pixels
///
/// Exactly `expected` bytes are returned, data beyond is dropped.
///
/// # Errors
/// [`DecodeErrors::Truncated`] if the segment holds fewer bytes
/// than `expected`, otherwise whatever the decompressor reports
pub(crate) fn decompress(
    info: &TiffInfo, raw: &[u8], width: usize, rows: usize, expected: usize,
    options: &DecoderOptions
) -> Result<Vec<u8>, DecodeErrors> {
    let order = if info.reversed_fill_order {
        BitOrder::Lsb
    } else {
        BitOrder::Msb
    };
    let reversed: Vec<u8>;

    // fax decoders read in either bit order, everything else wants
    // the most significant bit first
    let data: &[u8] = if info.reversed_fill_order && !info.compression.is_ccitt() {
        reversed = raw.iter().map(|x| x.reverse_bits()).collect();
        &reversed
    } else {
        raw
    };
    let ccitt = |mode| {
        CcittDecoder::new(CcittOptions {
            mode,
            width,
            rows,
            order
        })?
        .decode(data)
    };

    let mut out = match info.compression {
        TiffCompression::None => data[..expected.min(data.len())].to_vec(),
        TiffCompression::CcittRle => ccitt(CcittMode::ModifiedHuffman)?,
        TiffCompression::CcittGroup3 => ccitt(CcittMode::Group3 {
            two_dimensional: info.t4_options & T4_TWO_DIMENSIONAL != 0,
            fill_bits:       info.t4_options & T4_FILL_BITS != 0
        })?,
        TiffCompression::CcittGroup4 => ccitt(CcittMode::Group4)?,
        TiffCompression::Lzw => {
            // pre 6.0 writers pack codes least significant bit first,
            // their streams start with a clear code that reads 0x00 0x01
            let lzw_options = if data.len() >= 2 && data[0] == 0 && data[1] & 1 == 1 {
                trace!("Old style LZW");
                LzwOptions::tiff_old_style()
            } else {
                LzwOptions::tiff()
            };
            let mut out = Vec::with_capacity(expected);
            LzwDecoder::new(lzw_options)?.decode_limited(data, &mut out, expected)?;
            out
        }
        TiffCompression::Deflate => {
            let deflate_options = DeflateOptions::default()
                .set_confirm_checksum(options.inflate_get_confirm_adler())
                .set_limit(options.inflate_get_limit())
                .set_size_hint(expected);

            DeflateDecoder::new_with_options(data, deflate_options).decode_zlib()?
        }
        TiffCompression::PackBits => unpack_bits(data, expected)?
    };

    if out.len() < expected {
        warn!(
            "Segment decompressed to {} bytes, expected {expected}",
            out.len()
        );
        return Err(DecodeErrors::Truncated);
    }
    out.truncate(expected);
    Ok(out)
}

/// Undo PackBits run-length encoding until `expected` bytes are produced
///
/// A header byte `n` below 128 copies the next `n + 1` bytes, one above
/// 128 repeats the next byte `257 - n` times, 128 is a no-op.
pub(crate) fn unpack_bits(data: &[u8], expected: usize) -> Result<Vec<u8>, DecodeErrors> {
    let mut stream = ByteReader::new(data);
    let mut out = Vec::with_capacity(expected);

    while out.len() < expected {
        let len = usize::from(stream.get_u8_err()?);

        match len.cmp(&128) {
            core::cmp::Ordering::Less => {
                out.extend_from_slice(stream.get_slice(len + 1)?);
            }
            core::cmp::Ordering::Equal => (),
            core::cmp::Ordering::Greater => {
                let value = stream.get_u8_err()?;
                out.resize(out.len() + 257 - len, value);
            }
        }
    }
    // runs may cross the end of a segment
    out.truncate(expected);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use loupe_core::errors::DecodeErrors;
    use nanorand::{Rng, WyRand};

    use crate::decompress::unpack_bits;

    #[test]
    fn packbits() {
        // the example from the TIFF 6.0 specification
        let packed = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA
        ];
        assert_eq!(unpack_bits(&packed, expected.len()).unwrap(), expected);
    }

    #[test]
    fn packbits_noop_and_overrun() {
        assert_eq!(unpack_bits(&[0x80, 0xFF, 7], 2).unwrap(), [7, 7]);
        assert_eq!(unpack_bits(&[0xFD, 1], 2).unwrap(), [1, 1]);
        assert_eq!(unpack_bits(&[0x03, 1, 2], 4), Err(DecodeErrors::Truncated));
        assert_eq!(unpack_bits(&[], 1), Err(DecodeErrors::Truncated));
    }

    #[test]
    fn packbits_never_panics() {
        let mut rng = WyRand::new_seed(0x7177);

        for _ in 0..500 {
            let len = rng.generate_range(0_usize..64);
            let data: Vec<u8> = (0..len).map(|_| rng.generate()).collect();
            let expected = rng.generate_range(0_usize..256);

            if let Ok(out) = unpack_bits(&data, expected) {
                assert_eq!(out.len(), expected);
            }
        }
    }
}
