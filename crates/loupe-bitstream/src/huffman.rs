/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Prefix code tables
//!
//! A [`HuffmanTable`] maps `(length, code)` pairs to symbols. Tables are
//! either built the canonical way from code lengths alone (deflate), or
//! from a fixed list of explicit codes (CCITT fax run lengths and modes).
//!
//! Codes are read starting with the most significant bit of the code,
//! so the same table works regardless of the bit order of the
//! underlying [`BitReader`]. Codes up to [`LOOKUP_BITS`] long resolve
//! with a single index into a lookup table, longer ones continue one
//! bit at a time through the per-length code lists.
use alloc::format;
use alloc::vec::Vec;

use loupe_core::errors::DecodeErrors;

use crate::bitreader::{BitOrder, BitReader};

/// Longest code a table can hold
pub const MAX_CODE_LENGTH: usize = 24;

/// Bits resolved by the first level lookup
pub const LOOKUP_BITS: u8 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Entry {
    code:   u32,
    symbol: u16
}

/// A decode table for one prefix code
///
/// Building is cheap, a new table is built for every block/scan that
/// defines one and [`rebuild`](Self::rebuild) reuses the allocation.
#[derive(Clone, Debug)]
pub struct HuffmanTable {
    /// Entries sorted by length, then by code
    entries:     Vec<Entry>,
    /// Entries with length `l` are `entries[offsets[l]..offsets[l + 1]]`
    offsets:     [usize; MAX_CODE_LENGTH + 2],
    max_length:  u8,
    /// Indexed by the next `lookup_bits` bits in code order, holds
    /// `symbol << 8 | length` or zero when no code that short matches
    lookup:      Vec<u32>,
    lookup_bits: u8
}

impl Default for HuffmanTable {
    fn default() -> Self {
        HuffmanTable {
            entries:     Vec::new(),
            offsets:     [0; MAX_CODE_LENGTH + 2],
            max_length:  0,
            lookup:      Vec::new(),
            lookup_bits: 0
        }
    }
}

impl HuffmanTable {
    /// Build a canonical code table
    ///
    /// `lengths[symbol]` is the code length of `symbol`, `0` meaning unused.
    /// Codes are assigned in increasing length and, within a length,
    /// in increasing symbol order.
    ///
    /// # Errors
    /// [`DecodeErrors::Malformed`] if a length is too long or the
    /// lengths describe more codes than fit (over-subscribed).
    /// Incomplete codes are accepted, unassigned bit patterns
    /// decode to [`DecodeErrors::InvalidCode`]
    pub fn from_lengths(lengths: &[u8]) -> Result<HuffmanTable, DecodeErrors> {
        let mut table = HuffmanTable::default();
        table.rebuild(lengths)?;
        Ok(table)
    }

    /// Replace the table with a canonical code built from `lengths`
    ///
    /// See [`from_lengths`](Self::from_lengths)
    pub fn rebuild(&mut self, lengths: &[u8]) -> Result<(), DecodeErrors> {
        if lengths.len() > usize::from(u16::MAX) {
            return Err(DecodeErrors::Malformed(format!(
                "Too many symbols {} for a huffman table",
                lengths.len()
            )));
        }
        let mut counts = [0_usize; MAX_CODE_LENGTH + 1];

        for &length in lengths {
            if usize::from(length) > MAX_CODE_LENGTH {
                return Err(DecodeErrors::Malformed(format!(
                    "Huffman code length {length} exceeds {MAX_CODE_LENGTH}"
                )));
            }
            counts[usize::from(length)] += 1;
        }
        counts[0] = 0;

        // make sure the code is not over-subscribed
        let mut left: i64 = 1;
        for count in &counts[1..] {
            left <<= 1;
            left -= *count as i64;
            if left < 0 {
                return Err(DecodeErrors::Malformed(
                    "Over-subscribed huffman code lengths".into()
                ));
            }
        }

        self.offsets = [0; MAX_CODE_LENGTH + 2];
        for length in 1..=MAX_CODE_LENGTH {
            self.offsets[length + 1] = self.offsets[length] + counts[length];
        }
        self.max_length = (1..=MAX_CODE_LENGTH)
            .rev()
            .find(|l| counts[*l] != 0)
            .unwrap_or(0) as u8;

        // first code of each length
        let mut next_code = [0_u32; MAX_CODE_LENGTH + 1];
        let mut code = 0_u32;
        for length in 1..=MAX_CODE_LENGTH {
            code = (code + counts[length - 1] as u32) << 1;
            next_code[length] = code;
        }

        let total = self.offsets[MAX_CODE_LENGTH + 1];
        self.entries.clear();
        self.entries.resize(total, Entry { code: 0, symbol: 0 });

        let mut fill = self.offsets;

        for (symbol, &length) in lengths.iter().enumerate() {
            if length == 0 {
                continue;
            }
            let length = usize::from(length);
            self.entries[fill[length]] = Entry {
                code:   next_code[length],
                symbol: symbol as u16
            };
            fill[length] += 1;
            next_code[length] += 1;
        }
        self.build_lookup();
        Ok(())
    }

    /// Build a table from explicit `(code, length, symbol)` triples
    ///
    /// # Errors
    /// [`DecodeErrors::Malformed`] if a code is repeated, does not fit
    /// its length, or is a prefix of another code
    pub fn from_codes(codes: &[(u32, u8, u16)]) -> Result<HuffmanTable, DecodeErrors> {
        let mut table = HuffmanTable::default();
        let mut sorted: Vec<(u8, u32, u16)> = Vec::with_capacity(codes.len());

        for &(code, length, symbol) in codes {
            if length == 0 || usize::from(length) > MAX_CODE_LENGTH || code >> length != 0 {
                return Err(DecodeErrors::Malformed(format!(
                    "Code {code:#b} does not fit in {length} bits"
                )));
            }
            sorted.push((length, code, symbol));
        }
        sorted.sort_unstable();

        for (length, code, symbol) in &sorted {
            table.offsets[usize::from(*length) + 1] += 1;
            table.entries.push(Entry {
                code:   *code,
                symbol: *symbol
            });
            table.max_length = table.max_length.max(*length);
        }
        for length in 1..=MAX_CODE_LENGTH {
            table.offsets[length + 1] += table.offsets[length];
        }

        // no code may repeat or be the prefix of a longer code
        for (length, code, _) in &sorted {
            for shorter in 1..=*length {
                let prefix = code >> (length - shorter);
                let matches = table
                    .codes_of_length(shorter)
                    .iter()
                    .filter(|e| e.code == prefix)
                    .count();

                let allowed = usize::from(shorter == *length);
                if matches > allowed {
                    return Err(DecodeErrors::Malformed(format!(
                        "Code {code:#b} of length {length} is not prefix free"
                    )));
                }
            }
        }
        table.build_lookup();
        Ok(table)
    }

    fn build_lookup(&mut self) {
        let bits = self.max_length.min(LOOKUP_BITS);
        self.lookup_bits = bits;
        self.lookup.clear();
        self.lookup.resize(1 << bits, 0);

        for length in 1..=bits {
            let span = 1_usize << (bits - length);

            for i in self.offsets[usize::from(length)]..self.offsets[usize::from(length) + 1] {
                let entry = self.entries[i];
                let start = (entry.code as usize) << (bits - length);
                let value = (u32::from(entry.symbol) << 8) | u32::from(length);
                self.lookup[start..start + span].fill(value);
            }
        }
    }

    #[inline]
    fn codes_of_length(&self, length: u8) -> &[Entry] {
        let length = usize::from(length);
        &self.entries[self.offsets[length]..self.offsets[length + 1]]
    }

    /// Length of the longest code in the table
    pub const fn max_length(&self) -> u8 {
        self.max_length
    }

    /// True if the table has no codes
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All `(symbol, length, code)` triples, ordered by length then code
    pub fn codes(&self) -> impl Iterator<Item = (u16, u8, u32)> + '_ {
        (1..=self.max_length).flat_map(move |length| {
            self.codes_of_length(length)
                .iter()
                .map(move |e| (e.symbol, length, e.code))
        })
    }

    /// Decode one symbol, consuming exactly the bits of its code
    ///
    /// # Errors
    /// - [`DecodeErrors::Truncated`] if the input ends inside a code
    /// - [`DecodeErrors::InvalidCode`] if no code of any length up to the
    ///   longest matches
    #[inline]
    pub fn decode_one(&self, reader: &mut BitReader) -> Result<u16, DecodeErrors> {
        let mut code = 0_u32;
        let mut first_length = 1;

        // near the end of the input only the bits that are left take part
        let available = reader.bits_remaining().min(usize::from(self.lookup_bits)) as u8;

        if available > 0 {
            let peeked = reader.peek_bits(available)?;
            let in_code_order = match reader.order() {
                BitOrder::Msb => peeked,
                BitOrder::Lsb => peeked.reverse_bits() >> (32 - u32::from(available))
            };
            let index = (in_code_order as usize) << (self.lookup_bits - available);
            let value = self.lookup[index];
            let length = (value & 0xFF) as u8;

            if value != 0 && length <= available {
                reader.skip_bits(usize::from(length))?;
                return Ok((value >> 8) as u16);
            }
            if value == 0 && available == self.lookup_bits {
                // longer than the lookup, carry on from the bits already seen
                reader.skip_bits(usize::from(available))?;
                code = in_code_order;
                first_length = available + 1;
            }
        }

        for length in first_length..=self.max_length {
            code = (code << 1) | reader.read_bits(1)?;

            let candidates = self.codes_of_length(length);

            if let Ok(pos) = candidates.binary_search_by_key(&code, |e| e.code) {
                return Ok(candidates[pos].symbol);
            }
        }
        Err(DecodeErrors::InvalidCode("huffman table"))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use loupe_core::errors::DecodeErrors;
    use nanorand::{Rng, WyRand};

    use crate::bitreader::{BitOrder, BitReader};
    use crate::huffman::{HuffmanTable, LOOKUP_BITS};
    use crate::test_utils::BitWriter;

    #[test]
    fn rfc1951_example() {
        // A..H with lengths (3, 3, 3, 3, 3, 2, 4, 4)
        let table = HuffmanTable::from_lengths(&[3, 3, 3, 3, 3, 2, 4, 4]).unwrap();
        let codes: Vec<_> = table.codes().collect();

        assert_eq!(
            codes,
            [
                (5, 2, 0b00),
                (0, 3, 0b010),
                (1, 3, 0b011),
                (2, 3, 0b100),
                (3, 3, 0b101),
                (4, 3, 0b110),
                (6, 4, 0b1110),
                (7, 4, 0b1111)
            ]
        );
    }

    #[test]
    fn decodes_every_symbol_and_is_deterministic() {
        let mut rng = WyRand::new_seed(0x1234_5678);

        for _ in 0..50 {
            let symbols = rng.generate_range(2_usize..300);
            let mut lengths: Vec<u8> = (0..symbols)
                .map(|_| rng.generate_range(0_u8..=15))
                .collect();

            // keep the random lengths satisfying the kraft inequality
            // by bumping the longest codes until they fit
            while kraft_sum(&lengths) > 1 << 15 {
                for l in lengths.iter_mut().filter(|l| **l != 0 && **l < 15) {
                    *l += 1;
                }
                if kraft_sum(&lengths) > 1 << 15 {
                    let pos = rng.generate_range(0..lengths.len());
                    lengths[pos] = 0;
                }
            }

            let first = HuffmanTable::from_lengths(&lengths).unwrap();
            let second = HuffmanTable::from_lengths(&lengths).unwrap();
            let codes: Vec<_> = first.codes().collect();
            assert_eq!(codes, second.codes().collect::<Vec<_>>());

            let mut writer = BitWriter::new(BitOrder::Lsb);
            for (_, length, code) in &codes {
                writer.write_code_msb_first(*code, *length);
            }
            let data = writer.finish();
            let mut reader = BitReader::new(&data, BitOrder::Lsb);

            for (symbol, _, _) in &codes {
                assert_eq!(first.decode_one(&mut reader).unwrap(), *symbol);
            }
        }
    }

    fn kraft_sum(lengths: &[u8]) -> u32 {
        lengths
            .iter()
            .filter(|l| **l != 0)
            .map(|l| 1_u32 << (15 - l))
            .sum()
    }

    #[test]
    fn rebuild_replaces_codes() {
        let mut table = HuffmanTable::from_lengths(&[1, 1]).unwrap();
        table.rebuild(&[0, 0, 1, 2, 2]).unwrap();

        let data = [0b1100_0000];
        let mut reader = BitReader::new(&data, BitOrder::Msb);
        assert_eq!(table.decode_one(&mut reader).unwrap(), 4);
        assert_eq!(table.decode_one(&mut reader).unwrap(), 2);
    }

    #[test]
    fn over_subscribed_lengths() {
        let err = HuffmanTable::from_lengths(&[1, 1, 1]).unwrap_err();
        assert!(matches!(err, DecodeErrors::Malformed(_)));
    }

    #[test]
    fn incomplete_code_reports_invalid_code() {
        // only "0" is assigned, "1..." never matches
        let table = HuffmanTable::from_lengths(&[1]).unwrap();
        let data = [0xFF];
        let mut reader = BitReader::new(&data, BitOrder::Msb);
        assert_eq!(
            table.decode_one(&mut reader),
            Err(DecodeErrors::InvalidCode("huffman table"))
        );
    }

    #[test]
    fn truncated_inside_code() {
        let table = HuffmanTable::from_lengths(&[3, 3, 3, 3, 3, 2, 4, 4]).unwrap();
        // "111" followed by nothing, every code starting with 111 is 4 bits
        let data = [0b0000_0111];
        let mut reader = BitReader::new(&data, BitOrder::Msb);
        reader.skip_bits(5).unwrap();
        assert_eq!(table.decode_one(&mut reader), Err(DecodeErrors::Truncated));
    }

    #[test]
    fn codes_longer_than_the_lookup() {
        // 0, 10, 110, ... down to two codes of twelve bits
        let lengths = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 12];
        let table = HuffmanTable::from_lengths(&lengths).unwrap();
        assert_eq!(table.lookup.len(), 1 << LOOKUP_BITS);

        let message = [12_u16, 0, 11, 10, 1, 9, 12];
        for order in [BitOrder::Msb, BitOrder::Lsb] {
            let codes: Vec<_> = table.codes().collect();
            let mut writer = BitWriter::new(order);
            for symbol in message {
                let (_, length, code) = codes.iter().find(|c| c.0 == symbol).unwrap();
                writer.write_code_msb_first(*code, *length);
            }
            let data = writer.finish();
            let mut reader = BitReader::new(&data, order);

            for symbol in message {
                assert_eq!(table.decode_one(&mut reader).unwrap(), symbol);
            }
        }
    }

    #[test]
    fn short_code_in_the_last_bits() {
        let table = HuffmanTable::from_lengths(&[3, 3, 3, 3, 3, 2, 4, 4]).unwrap();
        let data = [0b0000_0000];
        let mut reader = BitReader::new(&data, BitOrder::Msb);
        reader.skip_bits(6).unwrap();

        assert_eq!(table.decode_one(&mut reader).unwrap(), 5);
        assert_eq!(reader.bits_remaining(), 0);
        assert_eq!(table.decode_one(&mut reader), Err(DecodeErrors::Truncated));
    }

    #[test]
    fn explicit_codes() {
        let table =
            HuffmanTable::from_codes(&[(0b1, 1, 10), (0b011, 3, 11), (0b0001, 4, 12)]).unwrap();
        let data = [0b1011_0001];
        let mut reader = BitReader::new(&data, BitOrder::Msb);
        assert_eq!(table.decode_one(&mut reader).unwrap(), 10);
        assert_eq!(table.decode_one(&mut reader).unwrap(), 11);
        assert_eq!(table.decode_one(&mut reader).unwrap(), 12);

        assert!(HuffmanTable::from_codes(&[(0b1, 1, 0), (0b10, 2, 1)]).is_err());
        assert!(HuffmanTable::from_codes(&[(0b10, 2, 0), (0b10, 2, 1)]).is_err());
    }
}
