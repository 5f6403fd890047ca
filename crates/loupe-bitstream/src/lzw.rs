/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Variable width LZW decompression
//!
//! The string table starts with one entry per literal followed by the
//! clear and end codes. Every code after the first one of a run adds the
//! previous string extended by the first byte of the current one. The
//! code width grows by one bit each time the table size reaches the next
//! power of two, up to [`LzwOptions::max_width`]. A full table stops
//! growing until the stream sends a clear code.
//!
//! GIF reads codes least significant bit first and widens when the
//! table size reaches a power of two. TIFF reads codes most significant
//! bit first and widens one code early.
use alloc::format;
use alloc::vec::Vec;

use loupe_core::errors::DecodeErrors;
use loupe_core::log::trace;

use crate::bitreader::{BitOrder, BitReader};

const NO_PREFIX: u16 = u16::MAX;

/// Parameters of an LZW stream
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LzwOptions {
    /// Width in bits of the first code and of codes right after a clear
    pub initial_width:  u8,
    /// Width codes stop growing at
    pub max_width:      u8,
    /// Resets the table, codes below it are literals
    pub clear_code:     u16,
    /// Marks the end of the stream
    pub end_code:       u16,
    /// Whether a clear code empties the string table
    pub reset_on_clear: bool,
    /// Widen codes one entry before the table reaches a power of two
    pub early_change:   bool,
    pub order:          BitOrder
}

impl LzwOptions {
    /// Options for a GIF image data block with the given minimum code size
    pub fn gif(min_code_size: u8) -> Result<LzwOptions, DecodeErrors> {
        if !(1..=8).contains(&min_code_size) {
            return Err(DecodeErrors::Malformed(format!(
                "Invalid LZW minimum code size {min_code_size}"
            )));
        }
        let clear_code = 1 << min_code_size;

        Ok(LzwOptions {
            initial_width: min_code_size + 1,
            max_width: 12,
            clear_code,
            end_code: clear_code + 1,
            reset_on_clear: true,
            early_change: false,
            order: BitOrder::Lsb
        })
    }

    /// Options for TIFF LZW (compression 5) strips and tiles
    pub const fn tiff() -> LzwOptions {
        LzwOptions {
            initial_width:  9,
            max_width:      12,
            clear_code:     256,
            end_code:       257,
            reset_on_clear: true,
            early_change:   true,
            order:          BitOrder::Msb
        }
    }

    /// Options for pre 6.0 TIFF LZW, which packs codes like GIF
    pub const fn tiff_old_style() -> LzwOptions {
        LzwOptions {
            early_change: false,
            order: BitOrder::Lsb,
            ..LzwOptions::tiff()
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    prefix: u16,
    suffix: u8,
    first:  u8,
    /// zero for codes that hold no string
    len:    u16
}

/// An LZW decoder
pub struct LzwDecoder {
    options:    LzwOptions,
    table:      Vec<Entry>,
    first_free: u32,
    next_code:  u32,
    width:      u8,
    prev:       Option<u16>
}

impl LzwDecoder {
    /// Create a decoder
    ///
    /// # Errors
    /// [`DecodeErrors::Malformed`] if the clear and end codes do not fit the
    /// initial width or the widths are out of order
    pub fn new(options: LzwOptions) -> Result<LzwDecoder, DecodeErrors> {
        if options.max_width > 16
            || options.initial_width == 0
            || options.initial_width > options.max_width
        {
            return Err(DecodeErrors::Malformed(format!(
                "Invalid LZW code widths {} and {}",
                options.initial_width, options.max_width
            )));
        }
        let limit = 1_u32 << options.initial_width;
        let highest = options.clear_code.max(options.end_code);

        if u32::from(highest) >= limit || options.clear_code == options.end_code {
            return Err(DecodeErrors::Malformed(format!(
                "LZW clear code {} and end code {} do not fit {} bits",
                options.clear_code, options.end_code, options.initial_width
            )));
        }
        if options.clear_code > 256 {
            return Err(DecodeErrors::Malformed(format!(
                "LZW literal alphabet of {} symbols does not fit a byte",
                options.clear_code
            )));
        }
        let mut decoder = LzwDecoder {
            options,
            table: Vec::with_capacity(1 << options.max_width),
            first_free: u32::from(highest) + 1,
            next_code: u32::from(highest) + 1,
            width: options.initial_width,
            prev: None
        };
        decoder.reset();
        Ok(decoder)
    }

    /// Current code width in bits
    pub const fn code_width(&self) -> u8 {
        self.width
    }

    /// Code the next table entry will be assigned to
    pub const fn next_code(&self) -> u32 {
        self.next_code
    }

    fn max_entries(&self) -> usize {
        1 << self.options.max_width
    }

    /// Restore the table to the literal alphabet
    fn reset(&mut self) {
        let empty = Entry {
            prefix: NO_PREFIX,
            suffix: 0,
            first:  0,
            len:    0
        };
        self.table.clear();
        self.table.resize(self.max_entries(), empty);

        for (i, entry) in self
            .table
            .iter_mut()
            .take(usize::from(self.options.clear_code))
            .enumerate()
        {
            *entry = Entry {
                prefix: NO_PREFIX,
                suffix: i as u8,
                first:  i as u8,
                len:    1
            };
        }
        self.next_code = self.first_free;
        self.width = self.options.initial_width;
        self.prev = None;
    }

    /// Decode a whole stream, stopping at the end code
    ///
    /// # Errors
    /// - [`DecodeErrors::Truncated`] if the data ends before the end code
    /// - [`DecodeErrors::InvalidCode`] for a code not yet in the table
    pub fn decode(&mut self, data: &[u8], out: &mut Vec<u8>) -> Result<(), DecodeErrors> {
        self.decode_limited(data, out, usize::MAX)
    }

    /// Decode until the end code or until `limit` bytes were appended to `out`
    ///
    /// Streams whose expected size is known may omit the end code, reaching
    /// `limit` ends decoding successfully. The last string may push
    /// `out` past `limit`.
    pub fn decode_limited(
        &mut self, data: &[u8], out: &mut Vec<u8>, limit: usize
    ) -> Result<(), DecodeErrors> {
        self.reset();

        let mut reader = BitReader::new(data, self.options.order);
        let start = out.len();

        while out.len() - start < limit {
            let code = reader.read_bits(self.width)? as u16;

            if code == self.options.clear_code {
                if self.options.reset_on_clear {
                    self.reset();
                }
                self.prev = None;
                continue;
            }
            if code == self.options.end_code {
                trace!("LZW end code after {} bytes", out.len() - start);
                return Ok(());
            }
            self.decode_code(code, out)?;
        }
        Ok(())
    }

    fn decode_code(&mut self, code: u16, out: &mut Vec<u8>) -> Result<(), DecodeErrors> {
        let defined = self
            .table
            .get(usize::from(code))
            .map_or(false, |e| e.len != 0);

        if defined {
            let first = self.table[usize::from(code)].first;
            self.emit(code, out);

            if let Some(prev) = self.prev {
                self.add(prev, first);
            }
        } else if u32::from(code) == self.next_code {
            // the one code allowed before it is defined, the
            // previous string followed by its own first byte
            let prev = self
                .prev
                .ok_or(DecodeErrors::InvalidCode("lzw code before any string"))?;
            let first = self.table[usize::from(prev)].first;

            if !self.add(prev, first) {
                return Err(DecodeErrors::InvalidCode("lzw code past a full table"));
            }
            self.emit(code, out);
        } else {
            return Err(DecodeErrors::InvalidCode("lzw code not in table"));
        }
        self.prev = Some(code);
        Ok(())
    }

    /// Append `prefix + byte` to the table, returns false when the table is full
    fn add(&mut self, prefix: u16, byte: u8) -> bool {
        if self.next_code as usize >= self.max_entries() {
            return false;
        }
        let base = self.table[usize::from(prefix)];

        self.table[self.next_code as usize] = Entry {
            prefix,
            suffix: byte,
            first: base.first,
            len: base.len.saturating_add(1)
        };
        self.next_code += 1;

        let threshold = self.next_code + u32::from(self.options.early_change);

        if threshold >= (1 << self.width) && self.width < self.options.max_width {
            self.width += 1;
        }
        true
    }

    fn emit(&self, code: u16, out: &mut Vec<u8>) {
        let len = usize::from(self.table[usize::from(code)].len);
        let start = out.len();
        out.resize(start + len, 0);

        let mut current = code;
        for slot in out[start..].iter_mut().rev() {
            let entry = self.table[usize::from(current)];
            *slot = entry.suffix;
            current = entry.prefix;
        }
    }
}
