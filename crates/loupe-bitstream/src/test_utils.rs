/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Bit packing helpers used to build test streams
use alloc::vec::Vec;

use crate::bitreader::BitOrder;

pub struct BitWriter {
    order: BitOrder,
    bytes: Vec<u8>,
    bit:   u8
}

impl BitWriter {
    pub fn new(order: BitOrder) -> BitWriter {
        BitWriter {
            order,
            bytes: Vec::new(),
            bit: 0
        }
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit == 0 {
            self.bytes.push(0);
        }
        let last = self.bytes.last_mut().unwrap();
        if bit {
            match self.order {
                BitOrder::Lsb => *last |= 1 << self.bit,
                BitOrder::Msb => *last |= 0x80 >> self.bit
            }
        }
        self.bit = (self.bit + 1) % 8;
    }

    /// Write a value the way a reader with the same order reads it back
    pub fn write_bits(&mut self, value: u32, num_bits: u8) {
        for i in 0..num_bits {
            let bit = match self.order {
                BitOrder::Lsb => (value >> i) & 1,
                BitOrder::Msb => (value >> (num_bits - 1 - i)) & 1
            };
            self.push_bit(bit == 1);
        }
    }

    /// Write a prefix code, most significant code bit first
    pub fn write_code_msb_first(&mut self, code: u32, length: u8) {
        for i in (0..length).rev() {
            self.push_bit((code >> i) & 1 == 1);
        }
    }

    /// Write a code given as a string of '0' and '1'
    pub fn write_str(&mut self, bits: &str) {
        for c in bits.chars() {
            self.push_bit(c == '1');
        }
    }

    pub fn align(&mut self) {
        self.bit = 0;
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
