/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::format;
use alloc::vec::Vec;

use loupe_bitstream::{BitOrder, BitReader, HuffmanTable};
use loupe_core::errors::DecodeErrors;
use loupe_core::log::trace;

use crate::constants::{
    DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN, DEFLATE_BLOCKTYPE_STATIC, DEFLATE_BLOCKTYPE_UNCOMPRESSED,
    DEFLATE_END_OF_BLOCK, DEFLATE_NUM_LITLEN_SYMS, DEFLATE_NUM_OFFSET_SYMS,
    DEFLATE_NUM_PRECODE_SYMS, DEFLATE_PRECODE_LENS_PERMUTATION, LENGTH_BASE, OFFSET_BASE
};

/// Options that influence decompression
#[derive(Debug, Copy, Clone)]
pub struct DeflateOptions {
    limit:            usize,
    confirm_checksum: bool,
    size_hint:        usize
}

impl Default for DeflateOptions {
    fn default() -> Self {
        DeflateOptions {
            limit:            1 << 30,
            confirm_checksum: true,
            size_hint:        37000
        }
    }
}

impl DeflateOptions {
    /// Get the maximum number of bytes the decoder will produce
    pub const fn get_limit(&self) -> usize {
        self.limit
    }

    /// Set the maximum number of bytes the decoder will produce,
    /// streams inflating past it are rejected
    #[must_use]
    pub fn set_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub const fn get_confirm_checksum(&self) -> bool {
        self.confirm_checksum
    }

    /// Whether a zlib adler32 mismatch is an error
    ///
    /// Only meaningful with the `zlib` feature
    #[must_use]
    pub fn set_confirm_checksum(mut self, yes: bool) -> Self {
        self.confirm_checksum = yes;
        self
    }

    pub const fn get_size_hint(&self) -> usize {
        self.size_hint
    }

    /// Initial capacity of the output buffer
    #[must_use]
    pub fn set_size_hint(mut self, hint: usize) -> Self {
        self.size_hint = hint;
        self
    }
}

/// A deflate decoder borrowing its compressed input
pub struct DeflateDecoder<'a> {
    data:         &'a [u8],
    options:      DeflateOptions,
    static_codes: Option<(HuffmanTable, HuffmanTable)>
}

impl<'a> DeflateDecoder<'a> {
    /// Create a decoder with default options
    pub fn new(data: &'a [u8]) -> DeflateDecoder<'a> {
        DeflateDecoder::new_with_options(data, DeflateOptions::default())
    }

    pub fn new_with_options(data: &'a [u8], options: DeflateOptions) -> DeflateDecoder<'a> {
        DeflateDecoder {
            data,
            options,
            static_codes: None
        }
    }

    /// Decode a zlib wrapped stream
    ///
    /// See <https://www.ietf.org/rfc/rfc1950.txt>
    ///
    /// # Errors
    /// - [`DecodeErrors::Truncated`] if the stream ends early
    /// - [`DecodeErrors::Malformed`] for a bad header, bad block or a checksum mismatch
    /// - [`DecodeErrors::InvalidCode`] for a code not in a block's tables
    pub fn decode_zlib(&mut self) -> Result<Vec<u8>, DecodeErrors> {
        if self.data.len() < 2 {
            return Err(DecodeErrors::Truncated);
        }
        let cmf = self.data[0];
        let flg = self.data[1];

        let cm = cmf & 0xF;
        let cinfo = cmf >> 4;

        if cm != 8 {
            return Err(DecodeErrors::Malformed(format!(
                "Unknown zlib compression method {cm}"
            )));
        }
        if cinfo > 7 {
            return Err(DecodeErrors::Malformed(format!(
                "Unknown cinfo `{cinfo}` greater than 7, not allowed"
            )));
        }
        if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
            return Err(DecodeErrors::Malformed("FCHECK integrity not preserved".into()));
        }
        if flg & 0x20 != 0 {
            return Err(DecodeErrors::unsupported("zlib streams with a preset dictionary"));
        }

        let (out, end) = self.decode_blocks(2)?;

        #[cfg(feature = "zlib")]
        {
            if self.options.confirm_checksum {
                let stored = self
                    .data
                    .get(end..end + 4)
                    .ok_or(DecodeErrors::Truncated)?;
                let expected = u32::from_be_bytes([stored[0], stored[1], stored[2], stored[3]]);
                let mut hasher = simd_adler32::Adler32::new();
                hasher.write(&out);
                let found = hasher.finish();

                if expected != found {
                    return Err(DecodeErrors::Malformed(format!(
                        "Adler32 mismatch, expected {expected:#010X} but found {found:#010X}"
                    )));
                }
            }
        }
        #[cfg(not(feature = "zlib"))]
        {
            let _ = end;
        }
        Ok(out)
    }

    /// Decode a raw deflate stream
    ///
    /// # Errors
    /// See [`decode_zlib`](Self::decode_zlib)
    pub fn decode_deflate(&mut self) -> Result<Vec<u8>, DecodeErrors> {
        self.decode_blocks(0).map(|(out, _)| out)
    }

    /// Decode every block starting at byte `start`, returning the output and
    /// the position of the first byte after the last block
    fn decode_blocks(&mut self, start: usize) -> Result<(Vec<u8>, usize), DecodeErrors> {
        let data: &'a [u8] = self.data;
        let data = data.get(start..).ok_or(DecodeErrors::Truncated)?;
        let limit = self.options.limit;
        let mut stream = BitReader::new(data, BitOrder::Lsb);

        let mut out = Vec::with_capacity(self.options.size_hint.min(limit));

        let mut litlen = HuffmanTable::default();
        let mut offset = HuffmanTable::default();

        loop {
            let is_last_block = stream.read_bit()?;
            let block_type = stream.read_bits(2)?;

            match block_type {
                DEFLATE_BLOCKTYPE_UNCOMPRESSED => {
                    trace!("Stored block");
                    self.copy_stored(&mut stream, &mut out)?;
                }
                DEFLATE_BLOCKTYPE_STATIC => {
                    trace!("Static huffman block");
                    let (lit, dist) = self.static_tables()?;
                    inflate_block(&mut stream, lit, dist, &mut out, limit)?;
                }
                DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN => {
                    trace!("Dynamic huffman block");
                    read_dynamic_tables(&mut stream, &mut litlen, &mut offset)?;
                    inflate_block(&mut stream, &litlen, &offset, &mut out, limit)?;
                }
                _ => {
                    return Err(DecodeErrors::Malformed(
                        "Reserved deflate block type 3".into()
                    ));
                }
            }

            if is_last_block {
                break;
            }
        }
        stream.align_to_byte();

        Ok((out, start + stream.position()))
    }

    fn copy_stored(
        &self, stream: &mut BitReader, out: &mut Vec<u8>
    ) -> Result<(), DecodeErrors> {
        let header = stream.read_aligned_bytes(4)?;
        let len = u16::from_le_bytes([header[0], header[1]]);
        let nlen = u16::from_le_bytes([header[2], header[3]]);

        if len != !nlen {
            return Err(DecodeErrors::Malformed(format!(
                "Stored block length {len} does not match its complement {nlen}"
            )));
        }
        let bytes = stream.read_aligned_bytes(usize::from(len))?;

        if out.len() + bytes.len() > self.options.limit {
            return Err(limit_error(self.options.limit));
        }
        out.extend_from_slice(bytes);
        Ok(())
    }

    fn static_tables(&mut self) -> Result<&(HuffmanTable, HuffmanTable), DecodeErrors> {
        if self.static_codes.is_none() {
            let mut lens = [0_u8; DEFLATE_NUM_LITLEN_SYMS];

            lens[..144].fill(8);
            lens[144..256].fill(9);
            lens[256..280].fill(7);
            lens[280..].fill(8);

            let litlen = HuffmanTable::from_lengths(&lens)?;
            let offset = HuffmanTable::from_lengths(&[5; DEFLATE_NUM_OFFSET_SYMS])?;

            self.static_codes = Some((litlen, offset));
        }
        self.static_codes
            .as_ref()
            .ok_or(DecodeErrors::InvalidCode("static huffman tables"))
    }
}

fn limit_error(limit: usize) -> DecodeErrors {
    DecodeErrors::Malformed(format!(
        "Output exceeds the configured limit of {limit} bytes"
    ))
}

/// Read the code lengths of a dynamic block and build its two tables
fn read_dynamic_tables(
    stream: &mut BitReader, litlen: &mut HuffmanTable, offset: &mut HuffmanTable
) -> Result<(), DecodeErrors> {
    let num_litlen_syms = 257 + stream.read_bits(5)? as usize;
    let num_offset_syms = 1 + stream.read_bits(5)? as usize;
    let num_explicit_precode_lens = 4 + stream.read_bits(4)? as usize;

    if num_litlen_syms > 286 {
        return Err(DecodeErrors::Malformed(format!(
            "Too many literal/length codes {num_litlen_syms}"
        )));
    }

    let mut precode_lens = [0_u8; DEFLATE_NUM_PRECODE_SYMS];

    for &pos in DEFLATE_PRECODE_LENS_PERMUTATION
        .iter()
        .take(num_explicit_precode_lens)
    {
        precode_lens[usize::from(pos)] = stream.read_bits(3)? as u8;
    }
    let precode = HuffmanTable::from_lengths(&precode_lens)?;

    let total = num_litlen_syms + num_offset_syms;
    let mut lens = [0_u8; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS];
    let mut i = 0;

    while i < total {
        let sym = precode.decode_one(stream)?;

        let (value, repeat) = match sym {
            0..=15 => (sym as u8, 1),
            16 => {
                if i == 0 {
                    return Err(DecodeErrors::Malformed(
                        "Code length repeat with no previous length".into()
                    ));
                }
                (lens[i - 1], 3 + stream.read_bits(2)? as usize)
            }
            17 => (0, 3 + stream.read_bits(3)? as usize),
            18 => (0, 11 + stream.read_bits(7)? as usize),
            _ => return Err(DecodeErrors::InvalidCode("deflate precode"))
        };
        if i + repeat > total {
            return Err(DecodeErrors::Malformed(
                "Code length repeat overruns the code length table".into()
            ));
        }
        lens[i..i + repeat].fill(value);
        i += repeat;
    }

    if lens[usize::from(DEFLATE_END_OF_BLOCK)] == 0 {
        return Err(DecodeErrors::Malformed(
            "Dynamic block has no end of block code".into()
        ));
    }
    litlen.rebuild(&lens[..num_litlen_syms])?;
    offset.rebuild(&lens[num_litlen_syms..total])?;

    Ok(())
}

/// Decode one huffman compressed block into `out`
fn inflate_block(
    stream: &mut BitReader, litlen: &HuffmanTable, offset: &HuffmanTable, out: &mut Vec<u8>,
    limit: usize
) -> Result<(), DecodeErrors> {
    loop {
        let sym = litlen.decode_one(stream)?;

        if sym < DEFLATE_END_OF_BLOCK {
            if out.len() >= limit {
                return Err(limit_error(limit));
            }
            out.push(sym as u8);
            continue;
        }
        if sym == DEFLATE_END_OF_BLOCK {
            return Ok(());
        }

        let (base, extra) = *LENGTH_BASE
            .get(usize::from(sym - 257))
            .ok_or(DecodeErrors::InvalidCode("deflate length symbol"))?;
        let length = usize::from(base) + stream.read_bits(extra)? as usize;

        let dist_sym = offset.decode_one(stream)?;
        let (base, extra) = *OFFSET_BASE
            .get(usize::from(dist_sym))
            .ok_or(DecodeErrors::InvalidCode("deflate offset symbol"))?;
        let distance = usize::from(base) + stream.read_bits(extra)? as usize;

        if distance > out.len() {
            return Err(DecodeErrors::Malformed(format!(
                "Match distance {distance} reaches before the start of the output ({} bytes)",
                out.len()
            )));
        }
        if out.len() + length > limit {
            return Err(limit_error(limit));
        }
        let start = out.len() - distance;

        if distance >= length {
            out.extend_from_within(start..start + length);
        } else {
            // overlapping copy, repeats the last `distance` bytes
            for i in 0..length {
                let byte = out[start + i];
                out.push(byte);
            }
        }
    }
}
