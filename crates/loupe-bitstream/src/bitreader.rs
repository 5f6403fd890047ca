/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Bit level reader over a borrowed byte buffer
//!
//! Formats disagree on which end of a byte comes first, deflate and GIF
//! consume the least significant bit first while TIFF LZW and CCITT
//! fax streams start at the most significant bit. The order is fixed
//! when the reader is created.
use loupe_core::errors::DecodeErrors;

/// The order bits are taken out of each byte
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BitOrder {
    /// Most significant bit first, values are assembled big end first
    Msb,
    /// Least significant bit first, values are assembled little end first
    Lsb
}

/// A bit reader
///
/// The reader keeps a byte position and the number of bits already
/// taken from the byte at that position. It never reads outside the
/// buffer, asking for more bits than are left fails with
/// [`DecodeErrors::Truncated`] and leaves the reader untouched.
///
/// The reader is `Copy`, saving a copy and assigning it back is how
/// callers rewind after a speculative read.
#[derive(Copy, Clone, Debug)]
pub struct BitReader<'src> {
    data:     &'src [u8],
    position: usize,
    bit:      u8,
    order:    BitOrder
}

impl<'src> BitReader<'src> {
    pub const fn new(data: &'src [u8], order: BitOrder) -> BitReader<'src> {
        BitReader {
            data,
            position: 0,
            bit: 0,
            order
        }
    }

    pub const fn order(&self) -> BitOrder {
        self.order
    }

    /// Number of unread bits
    pub const fn bits_remaining(&self) -> usize {
        if self.position >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.position) * 8 - self.bit as usize
    }

    /// Number of whole bytes left after the current partially
    /// consumed one
    pub const fn bytes_remaining(&self) -> usize {
        let partial = (self.bit != 0) as usize;
        self.data
            .len()
            .saturating_sub(self.position)
            .saturating_sub(partial)
    }

    /// Byte offset of the next bit to be read
    pub const fn position(&self) -> usize {
        self.position
    }

    pub const fn is_byte_aligned(&self) -> bool {
        self.bit == 0
    }

    /// Read `num_bits` bits (at most 32) and advance past them
    ///
    /// # Errors
    /// [`DecodeErrors::Truncated`] if fewer bits are left, the reader is not advanced
    #[inline]
    pub fn read_bits(&mut self, num_bits: u8) -> Result<u32, DecodeErrors> {
        debug_assert!(num_bits <= 32);

        if usize::from(num_bits) > self.bits_remaining() {
            return Err(DecodeErrors::Truncated);
        }
        let mut value: u64 = 0;
        let mut got = 0;

        while got < num_bits {
            let byte = self.data[self.position];
            let available = 8 - self.bit;
            let take = available.min(num_bits - got);
            let mask = (1_u16 << take) - 1;

            match self.order {
                BitOrder::Lsb => {
                    let chunk = (u16::from(byte) >> self.bit) & mask;
                    value |= u64::from(chunk) << got;
                }
                BitOrder::Msb => {
                    let chunk = (u16::from(byte) >> (available - take)) & mask;
                    value = (value << take) | u64::from(chunk);
                }
            }
            got += take;
            self.bit += take;

            if self.bit == 8 {
                self.bit = 0;
                self.position += 1;
            }
        }
        Ok(value as u32)
    }

    /// Read a single bit
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool, DecodeErrors> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Return the next `num_bits` bits without consuming them
    #[inline]
    pub fn peek_bits(&self, num_bits: u8) -> Result<u32, DecodeErrors> {
        let mut copy = *self;
        copy.read_bits(num_bits)
    }

    /// Skip `num_bits` bits
    pub fn skip_bits(&mut self, num_bits: usize) -> Result<(), DecodeErrors> {
        if num_bits > self.bits_remaining() {
            return Err(DecodeErrors::Truncated);
        }
        let total = usize::from(self.bit) + num_bits;
        self.position += total / 8;
        self.bit = (total % 8) as u8;
        Ok(())
    }

    /// Discard the rest of a partially consumed byte
    pub fn align_to_byte(&mut self) {
        if self.bit != 0 {
            self.bit = 0;
            self.position += 1;
        }
    }

    /// Borrow `num` whole bytes, the reader must be byte aligned
    ///
    /// Used for stored blocks that sit between bit packed data.
    pub fn read_aligned_bytes(&mut self, num: usize) -> Result<&'src [u8], DecodeErrors> {
        self.align_to_byte();
        let end = self
            .position
            .checked_add(num)
            .ok_or(DecodeErrors::Truncated)?;
        let bytes = self
            .data
            .get(self.position..end)
            .ok_or(DecodeErrors::Truncated)?;
        self.position = end;
        Ok(bytes)
    }
}
