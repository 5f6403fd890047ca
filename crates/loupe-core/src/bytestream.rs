/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A simple implementation of a bytestream reader
//!
//! This module contains a reader over a borrowed slice, every read is
//! bounds checked and a read past the end reports
//! [`DecodeErrors::Truncated`] without moving the cursor.
//!
//! Format plugins use it to walk headers, chunks, tags and blocks.
use crate::bit_depth::ByteEndian;
use crate::errors::DecodeErrors;

macro_rules! get_single_type {
    ($name:tt,$name2:tt,$name3:tt,$int_type:tt) => {
        /// Read bytes as little endian, returning an error if not enough bytes are present
        #[inline]
        pub fn $name(&mut self) -> Result<$int_type, DecodeErrors> {
            const SIZE: usize = core::mem::size_of::<$int_type>();
            let bytes = self.peek_fixed::<SIZE>()?;
            self.position += SIZE;
            Ok($int_type::from_le_bytes(bytes))
        }
        /// Read bytes as big endian, returning an error if not enough bytes are present
        #[inline]
        pub fn $name2(&mut self) -> Result<$int_type, DecodeErrors> {
            const SIZE: usize = core::mem::size_of::<$int_type>();
            let bytes = self.peek_fixed::<SIZE>()?;
            self.position += SIZE;
            Ok($int_type::from_be_bytes(bytes))
        }
        /// Read bytes with the given endianness
        #[inline]
        pub fn $name3(&mut self, endian: ByteEndian) -> Result<$int_type, DecodeErrors> {
            match endian {
                ByteEndian::LE => self.$name(),
                ByteEndian::BE => self.$name2()
            }
        }
    };
}

/// An encapsulation of a byte stream reader
///
/// This provides an interface similar to [std::io::Cursor] but
/// it provides fine grained options for reading different integer data types from
/// the underlying buffer.
///
/// The buffer is borrowed for the reader's lifetime and never copied.
#[derive(Copy, Clone)]
pub struct ByteReader<'a> {
    stream:   &'a [u8],
    position: usize
}

impl<'a> ByteReader<'a> {
    /// Create a new instance of the byte stream
    pub const fn new(buf: &'a [u8]) -> ByteReader<'a> {
        ByteReader {
            stream:   buf,
            position: 0
        }
    }

    /// Current read position, in bytes from the start of the buffer
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Move the cursor to an absolute position
    ///
    /// A position past the end of the stream is an error
    pub fn set_position(&mut self, position: usize) -> Result<(), DecodeErrors> {
        if position > self.stream.len() {
            return Err(DecodeErrors::Truncated);
        }
        self.position = position;
        Ok(())
    }

    /// Skip `num` bytes ahead of the stream
    pub fn skip(&mut self, num: usize) -> Result<(), DecodeErrors> {
        if !self.has(num) {
            return Err(DecodeErrors::Truncated);
        }
        self.position += num;
        Ok(())
    }

    /// Return whether the stream has `num` bytes left to read
    pub const fn has(&self, num: usize) -> bool {
        self.remaining() >= num
    }

    /// Bytes left in the stream
    pub const fn remaining(&self) -> usize {
        self.stream.len().saturating_sub(self.position)
    }

    /// Return true if the cursor reached the end of the stream
    pub const fn eof(&self) -> bool {
        self.position >= self.stream.len()
    }

    /// Length of the whole underlying buffer
    pub const fn len(&self) -> usize {
        self.stream.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// The unread part of the stream
    pub fn remaining_bytes(&self) -> &'a [u8] {
        self.stream.get(self.position..).unwrap_or(&[])
    }

    /// Get a single byte from the stream, returning `0` if we are at the end
    #[inline(always)]
    pub fn get_u8(&mut self) -> u8 {
        let byte = *self.stream.get(self.position).unwrap_or(&0);
        self.position += usize::from(self.position < self.stream.len());
        byte
    }

    /// Get a single byte or error out if the stream is exhausted
    #[inline(always)]
    pub fn get_u8_err(&mut self) -> Result<u8, DecodeErrors> {
        match self.stream.get(self.position) {
            Some(byte) => {
                self.position += 1;
                Ok(*byte)
            }
            None => Err(DecodeErrors::Truncated)
        }
    }

    /// Look at the next `N` bytes without advancing
    #[inline]
    pub fn peek_fixed<const N: usize>(&self) -> Result<[u8; N], DecodeErrors> {
        let mut out = [0; N];
        match self
            .stream
            .get(self.position..)
            .and_then(|rest| rest.get(..N))
        {
            Some(bytes) => {
                out.copy_from_slice(bytes);
                Ok(out)
            }
            None => Err(DecodeErrors::Truncated)
        }
    }

    /// Read `N` bytes into a fixed size array
    pub fn get_fixed_bytes_or_err<const N: usize>(&mut self) -> Result<[u8; N], DecodeErrors> {
        let bytes = self.peek_fixed::<N>()?;
        self.position += N;
        Ok(bytes)
    }

    /// Borrow the next `num` bytes and advance past them
    pub fn get_slice(&mut self, num: usize) -> Result<&'a [u8], DecodeErrors> {
        let slice = self.peek_at(0, num)?;
        self.position += num;
        Ok(slice)
    }

    /// Borrow `num_bytes` starting `position` bytes from the cursor,
    /// without advancing
    pub fn peek_at(&self, position: usize, num_bytes: usize) -> Result<&'a [u8], DecodeErrors> {
        let start = self
            .position
            .checked_add(position)
            .ok_or(DecodeErrors::Truncated)?;
        let end = start.checked_add(num_bytes).ok_or(DecodeErrors::Truncated)?;

        self.stream.get(start..end).ok_or(DecodeErrors::Truncated)
    }

    get_single_type!(get_u16_le_err, get_u16_be_err, get_u16_err, u16);
    get_single_type!(get_u32_le_err, get_u32_be_err, get_u32_err, u32);
    get_single_type!(get_u64_le_err, get_u64_be_err, get_u64_err, u64);
}

#[cfg(test)]
mod tests {
    use crate::bit_depth::ByteEndian;
    use crate::bytestream::ByteReader;
    use crate::errors::DecodeErrors;

    #[test]
    fn endian_reads() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.get_u16_le_err().unwrap(), 0x0201);
        assert_eq!(reader.get_u16_err(ByteEndian::BE).unwrap(), 0x0304);
        assert!(reader.eof());
    }

    #[test]
    fn short_read_keeps_position() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut reader = ByteReader::new(&data);
        reader.skip(1).unwrap();

        assert_eq!(reader.get_u32_be_err(), Err(DecodeErrors::Truncated));
        assert_eq!(reader.position(), 1);
        assert_eq!(reader.get_u16_be_err().unwrap(), 0xBBCC);
        assert_eq!(reader.get_u8(), 0);
        assert_eq!(reader.get_u8_err(), Err(DecodeErrors::Truncated));
    }

    #[test]
    fn peek_does_not_advance() {
        let data = *b"GIF89a";
        let reader = ByteReader::new(&data);
        assert_eq!(reader.peek_at(3, 3).unwrap(), b"89a");
        assert!(reader.peek_at(4, 3).is_err());
        assert_eq!(reader.position(), 0);
    }
}
