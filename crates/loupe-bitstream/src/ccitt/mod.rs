/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! CCITT fax run-length decoding
//!
//! Bi-level scanlines are coded as alternating white and black runs,
//! every row starting with a (possibly empty) white run.
//!
//! - One dimensional rows code each run with the T.4 white/black tables.
//! - Two dimensional rows code the positions where the color changes
//!   relative to the row above (the reference line) with pass,
//!   horizontal and vertical modes.
//!
//! Rows are tracked as lists of changing elements, the positions where a
//! pixel differs from the one on its left, and only turned into packed
//! bits once complete.
//!
//! Output rows are packed most significant bit first, padded to a byte,
//! with `1` for black.
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use loupe_core::errors::DecodeErrors;
use loupe_core::log::trace;

use crate::bitreader::{BitOrder, BitReader};
use crate::huffman::HuffmanTable;

mod tables;

const MODE_PASS: u16 = 0;
const MODE_HORIZONTAL: u16 = 1;
const MODE_V0: u16 = 2;
const MODE_VR1: u16 = 3;
const MODE_VR2: u16 = 4;
const MODE_VR3: u16 = 5;
const MODE_VL1: u16 = 6;
const MODE_VL2: u16 = 7;
const MODE_VL3: u16 = 8;
const MODE_EXTENSION: u16 = 9;

/// An end of line code is at least 11 zeros followed by a one
const EOL_ZEROS: usize = 11;

/// Two dimensional coding mode of a row
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Mode {
    Pass,
    Horizontal,
    Vertical(i8),
    Extension
}

impl Mode {
    fn from_symbol(symbol: u16) -> Mode {
        match symbol {
            MODE_PASS => Mode::Pass,
            MODE_HORIZONTAL => Mode::Horizontal,
            MODE_V0 => Mode::Vertical(0),
            MODE_VR1 => Mode::Vertical(1),
            MODE_VR2 => Mode::Vertical(2),
            MODE_VR3 => Mode::Vertical(3),
            MODE_VL1 => Mode::Vertical(-1),
            MODE_VL2 => Mode::Vertical(-2),
            MODE_VL3 => Mode::Vertical(-3),
            _ => Mode::Extension
        }
    }
}

/// Which fax coding scheme a stream uses
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CcittMode {
    /// One dimensional runs, each row starting on a byte boundary
    /// and no end of line codes (TIFF compression 2)
    ModifiedHuffman,
    /// T.4, rows may be introduced by end of line codes. With
    /// `two_dimensional` a tag bit after each EOL picks one or two
    /// dimensional coding for the row. `fill_bits` allows zero
    /// padding before an EOL
    Group3 {
        two_dimensional: bool,
        fill_bits:       bool
    },
    /// T.6, every row two dimensional, the first one relative to an
    /// all white line
    Group4
}

/// Geometry and coding of a fax stream
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CcittOptions {
    pub mode:  CcittMode,
    /// Pixels per row
    pub width: usize,
    /// Rows to decode
    pub rows:  usize,
    /// Bit order of the encoded bytes (TIFF FillOrder)
    pub order: BitOrder
}

/// Decoder for CCITT coded bi-level images
pub struct CcittDecoder {
    options: CcittOptions,
    white:   HuffmanTable,
    black:   HuffmanTable,
    modes:   HuffmanTable
}

impl CcittDecoder {
    pub fn new(options: CcittOptions) -> Result<CcittDecoder, DecodeErrors> {
        if options.width == 0 {
            return Err(DecodeErrors::Malformed("Zero width fax stream".into()));
        }
        Ok(CcittDecoder {
            options,
            white: HuffmanTable::from_codes(&tables::WHITE_CODES)?,
            black: HuffmanTable::from_codes(&tables::BLACK_CODES)?,
            modes: HuffmanTable::from_codes(&tables::MODE_CODES)?
        })
    }

    /// Bytes per packed output row
    pub const fn stride(&self) -> usize {
        self.options.width.div_ceil(8)
    }

    /// Decode every row of `data`
    ///
    /// # Errors
    /// - [`DecodeErrors::Truncated`] if the data ends before the last row
    /// - [`DecodeErrors::InvalidCode`] for bits matching no run or mode code
    /// - [`DecodeErrors::Malformed`] if runs overflow the row width
    /// - [`DecodeErrors::Unsupported`] for uncompressed mode extensions
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>, DecodeErrors> {
        let stride = self.stride();
        let mut out = vec![0_u8; stride * self.options.rows];
        let mut reader = BitReader::new(data, self.options.order);

        let mut reference: Vec<usize> = Vec::new();
        let mut current: Vec<usize> = Vec::new();

        trace!(
            "CCITT {:?} decoding {} rows of {} pixels",
            self.options.mode,
            self.options.rows,
            self.options.width
        );

        for row in out.chunks_exact_mut(stride) {
            match self.options.mode {
                CcittMode::ModifiedHuffman => {
                    self.decode_1d_row(&mut reader, &mut current)?;
                    reader.align_to_byte();
                }
                CcittMode::Group3 {
                    two_dimensional, ..
                } => {
                    self.skip_eol(&mut reader);

                    let one_dimensional = !two_dimensional || reader.read_bit()?;

                    if one_dimensional {
                        self.decode_1d_row(&mut reader, &mut current)?;
                    } else {
                        self.decode_2d_row(&mut reader, &reference, &mut current)?;
                    }
                }
                CcittMode::Group4 => {
                    self.decode_2d_row(&mut reader, &reference, &mut current)?;
                }
            }
            render_row(&current, self.options.width, row);
            core::mem::swap(&mut reference, &mut current);
        }
        Ok(out)
    }

    /// Consume an end of line code if one is next, fill bits included
    fn skip_eol(&self, reader: &mut BitReader) -> bool {
        let saved = *reader;
        let mut zeros = 0;

        while let Ok(false) = reader.read_bit() {
            zeros += 1;
        }
        let fill_bits = matches!(
            self.options.mode,
            CcittMode::Group3 {
                fill_bits: true,
                ..
            }
        );
        // a one after at least 11 zeros, exactly 11 without fill bits
        // though encoders that ignore the flag are common
        let found_one = saved.bits_remaining() > zeros;

        if found_one && zeros >= EOL_ZEROS && (fill_bits || zeros < EOL_ZEROS + 8) {
            return true;
        }
        *reader = saved;
        false
    }

    /// Read one run of `white` or black, make-up codes included
    fn read_run(&self, reader: &mut BitReader, white: bool) -> Result<usize, DecodeErrors> {
        let table = if white { &self.white } else { &self.black };
        let mut total = 0_usize;

        loop {
            let length = usize::from(table.decode_one(reader)?);
            total += length;

            if length < 64 {
                return Ok(total);
            }
        }
    }

    fn decode_1d_row(
        &self, reader: &mut BitReader, changes: &mut Vec<usize>
    ) -> Result<(), DecodeErrors> {
        let width = self.options.width;
        let mut a0 = 0;
        let mut white = true;

        changes.clear();

        while a0 < width {
            a0 += self.read_run(reader, white)?;

            if a0 > width {
                return Err(DecodeErrors::Malformed(format!(
                    "Run ends at {a0}, past the row width {width}"
                )));
            }
            changes.push(a0);
            white = !white;
        }
        Ok(())
    }

    fn decode_2d_row(
        &self, reader: &mut BitReader, reference: &[usize], changes: &mut Vec<usize>
    ) -> Result<(), DecodeErrors> {
        let width = self.options.width;
        // None is the imaginary white pixel left of the row
        let mut a0: Option<usize> = None;
        let mut white = true;

        changes.clear();

        while a0.map_or(true, |a| a < width) {
            let mode = Mode::from_symbol(self.modes.decode_one(reader)?);
            let (b1, b2) = find_b1_b2(reference, a0, white, width);

            match mode {
                Mode::Pass => {
                    a0 = Some(b2);
                }
                Mode::Horizontal => {
                    let start = a0.unwrap_or(0);
                    let a1 = start + self.read_run(reader, white)?;
                    let a2 = a1 + self.read_run(reader, !white)?;

                    if a2 > width {
                        return Err(DecodeErrors::Malformed(format!(
                            "Horizontal mode ends at {a2}, past the row width {width}"
                        )));
                    }
                    changes.push(a1);
                    changes.push(a2);
                    a0 = Some(a2);
                }
                Mode::Vertical(delta) => {
                    let a1 = b1 as isize + isize::from(delta);
                    let lowest = a0.map_or(0, |a| a as isize);

                    if a1 < lowest || a1 > width as isize {
                        return Err(DecodeErrors::Malformed(format!(
                            "Vertical mode places a change at {a1}, outside {lowest}..={width}"
                        )));
                    }
                    changes.push(a1 as usize);
                    a0 = Some(a1 as usize);
                    white = !white;
                }
                Mode::Extension => {
                    return Err(DecodeErrors::unsupported(
                        "CCITT uncompressed mode extension"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Find b1, the first change on the reference line right of `a0` whose
/// new color is opposite to the current one, and b2, the change after it
fn find_b1_b2(reference: &[usize], a0: Option<usize>, white: bool, width: usize) -> (usize, usize) {
    let start = a0.map_or(0, |a| a + 1);
    let mut i = reference.partition_point(|&pos| pos < start);

    // even entries switch to black, odd ones back to white
    if (i % 2 == 0) != white {
        i += 1;
    }
    let b1 = reference.get(i).copied().unwrap_or(width).min(width);
    let b2 = reference.get(i + 1).copied().unwrap_or(width).min(width);

    (b1, b2)
}

/// Turn changing elements into packed bits, `1` for black
fn render_row(changes: &[usize], width: usize, row: &mut [u8]) {
    row.fill(0);

    let mut position = 0;
    let mut white = true;

    for &change in changes {
        let change = change.min(width);
        if !white {
            set_bits(row, position, change);
        }
        position = change;
        white = !white;
    }
    if !white {
        set_bits(row, position, width);
    }
}

fn set_bits(row: &mut [u8], start: usize, end: usize) {
    for x in start..end {
        row[x / 8] |= 0x80 >> (x % 8);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use loupe_core::errors::DecodeErrors;

    use crate::bitreader::BitOrder;
    use crate::ccitt::tables::{BLACK_CODES, WHITE_CODES};
    use crate::ccitt::{CcittDecoder, CcittMode, CcittOptions};
    use crate::test_utils::BitWriter;

    fn write_run(writer: &mut BitWriter, mut run: u16, white: bool) {
        let table: &[(u32, u8, u16)] = if white { &WHITE_CODES } else { &BLACK_CODES };
        let code_for = |value: u16| table.iter().find(|(_, _, v)| *v == value).copied().unwrap();

        while run >= 64 {
            let makeup = (run / 64 * 64).min(2560);
            let (code, len, _) = code_for(makeup);
            writer.write_code_msb_first(code, len);
            run -= makeup;
        }
        let (code, len, _) = code_for(run);
        writer.write_code_msb_first(code, len);
    }

    fn write_1d_row(writer: &mut BitWriter, runs: &[u16]) {
        for (i, run) in runs.iter().enumerate() {
            write_run(writer, *run, i % 2 == 0);
        }
    }

    fn decoder(mode: CcittMode, width: usize, rows: usize) -> CcittDecoder {
        CcittDecoder::new(CcittOptions {
            mode,
            width,
            rows,
            order: BitOrder::Msb
        })
        .unwrap()
    }

    // white 3, black 10, white 3
    const STRIPE: [u8; 2] = [0x1F, 0xF8];

    #[test]
    fn modified_huffman_rows() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        write_1d_row(&mut writer, &[16]);
        writer.align();
        write_1d_row(&mut writer, &[3, 10, 3]);
        writer.align();
        write_1d_row(&mut writer, &[0, 16]);
        let data = writer.finish();

        let out = decoder(CcittMode::ModifiedHuffman, 16, 3)
            .decode(&data)
            .unwrap();
        assert_eq!(out, [0x00, 0x00, STRIPE[0], STRIPE[1], 0xFF, 0xFF]);
    }

    #[test]
    fn long_runs_use_makeup_codes() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        write_1d_row(&mut writer, &[70, 2700, 30]);
        let data = writer.finish();

        let out = decoder(CcittMode::ModifiedHuffman, 2800, 1)
            .decode(&data)
            .unwrap();
        let black = out
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum::<usize>();
        assert_eq!(black, 2700);
        assert_eq!(out[8], 0b0000_0011);
    }

    #[test]
    fn group3_with_eol_and_fill_bits() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        for _ in 0..2 {
            // pad so each EOL ends on a byte boundary
            writer.write_str("0000");
            writer.write_str("000000000001");
            write_1d_row(&mut writer, &[3, 10, 3]);
        }
        let data = writer.finish();
        let mode = CcittMode::Group3 {
            two_dimensional: false,
            fill_bits:       true
        };
        let out = decoder(mode, 16, 2).decode(&data).unwrap();
        assert_eq!(out, [STRIPE[0], STRIPE[1], STRIPE[0], STRIPE[1]]);
    }

    #[test]
    fn group3_two_dimensional() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        writer.write_str("000000000001");
        writer.write_str("1"); // one dimensional row
        write_1d_row(&mut writer, &[3, 10, 3]);
        writer.write_str("000000000001");
        writer.write_str("0"); // two dimensional row
        writer.write_str("111"); // V0 V0 V0, same changes as the row above
        let data = writer.finish();

        let mode = CcittMode::Group3 {
            two_dimensional: true,
            fill_bits:       false
        };
        let out = decoder(mode, 16, 2).decode(&data).unwrap();
        assert_eq!(out, [STRIPE[0], STRIPE[1], STRIPE[0], STRIPE[1]]);
    }

    #[test]
    fn group4_modes() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        // row 0: horizontal white 3 black 10, then V0 to the row end
        writer.write_str("001");
        write_run(&mut writer, 3, true);
        write_run(&mut writer, 10, false);
        writer.write_str("1");
        // row 1: identical
        writer.write_str("111");
        // row 2: pass over the black run, then V0 to the end
        writer.write_str("0001");
        writer.write_str("1");
        let data = writer.finish();

        let mut expected: Vec<u8> = Vec::new();
        expected.extend_from_slice(&STRIPE);
        expected.extend_from_slice(&STRIPE);
        expected.extend_from_slice(&[0, 0]);
        let out = decoder(CcittMode::Group4, 16, 3).decode(&data).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn vertical_right_shift() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        writer.write_str("001");
        write_run(&mut writer, 3, true);
        write_run(&mut writer, 10, false);
        writer.write_str("1");
        // VR1 VR1 V0: white 4, black 10, white 2
        writer.write_str("011");
        writer.write_str("011");
        writer.write_str("1");
        let data = writer.finish();

        let out = decoder(CcittMode::Group4, 16, 2).decode(&data).unwrap();
        assert_eq!(&out[2..], &[0x0F, 0xFC]);
    }

    #[test]
    fn run_past_row_width() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        write_1d_row(&mut writer, &[20]);
        let data = writer.finish();

        let err = decoder(CcittMode::ModifiedHuffman, 16, 1)
            .decode(&data)
            .unwrap_err();
        assert!(matches!(err, DecodeErrors::Malformed(_)));
    }

    #[test]
    fn truncated_rows() {
        let mut writer = BitWriter::new(BitOrder::Msb);
        write_1d_row(&mut writer, &[3, 10, 3]);
        let data = writer.finish();

        let err = decoder(CcittMode::ModifiedHuffman, 16, 2)
            .decode(&data)
            .unwrap_err();
        assert_eq!(err, DecodeErrors::Truncated);
    }
}
