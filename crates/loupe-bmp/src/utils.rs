/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

/// Bytes in one stored row, rows are padded to four bytes
pub(crate) fn row_stride(width: usize, depth: u16) -> Option<usize> {
    let bits = width.checked_mul(usize::from(depth))?.checked_add(31)?;
    Some((bits / 32) * 4)
}

/// One colour channel described by a bit mask
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct ChannelMask {
    mask:  u32,
    shift: i32,
    bits:  u32
}

impl ChannelMask {
    pub(crate) fn new(mask: u32) -> ChannelMask {
        // position the top bit of the mask at bit 7
        let shift = (32 - mask.leading_zeros() as i32) - 8;

        ChannelMask {
            mask,
            shift,
            bits: mask.count_ones()
        }
    }

    pub(crate) const fn is_present(&self) -> bool {
        self.mask != 0
    }

    /// Extract the channel from `value` and scale it to 8 bits
    #[inline]
    pub(crate) fn extract(&self, value: u32) -> u8 {
        shift_signed(value & self.mask, self.shift, self.bits) as u8
    }
}

/// Move a masked value into the low 8 bits and replicate its
/// high bits into the empty low ones
fn shift_signed(mut v: u32, shift: i32, bits: u32) -> u32 {
    const MUL_TABLE: [u32; 9] = [
        0,    /* empty mask */
        0xff, /*0b11111111*/
        0x55, /*0b01010101*/
        0x49, /*0b01001001*/
        0x11, /*0b00010001*/
        0x21, /*0b00100001*/
        0x41, /*0b01000001*/
        0x81, /*0b10000001*/
        0x01  /*0b00000001*/
    ];
    const SHIFT_TABLE: [i32; 9] = [0, 0, 0, 1, 0, 2, 4, 6, 0];

    if shift < 0 {
        v <<= -shift;
    } else {
        v >>= shift;
    }
    let bits = bits.min(8);
    if bits == 0 {
        return 0;
    }
    v &= 0xFF;
    v >>= 8 - bits;
    (v * MUL_TABLE[bits as usize]) >> SHIFT_TABLE[bits as usize]
}
