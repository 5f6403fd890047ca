/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! VP8L lossless bitstream
//!
//! An image stream is a list of transforms, an optional colour cache, an
//! optional entropy image choosing a group of prefix codes per block, the
//! code groups and finally the LZ77 coded ARGB pixels. The transform data
//! and the entropy image are image streams of their own that carry
//! neither transforms nor an entropy image.
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use loupe_bitstream::{BitOrder, BitReader, HuffmanTable};
use loupe_core::bitmap::Bitmap;
use loupe_core::errors::DecodeErrors;
use loupe_core::log::trace;
use loupe_pixels::alpha::force_opaque;

use crate::transform::{add_pixels, subsample, Transform};

pub(crate) const VP8L_SIGNATURE: u8 = 0x2f;

const NUM_LITERAL_CODES: usize = 256;
const NUM_LENGTH_CODES: usize = 24;
const NUM_DISTANCE_CODES: usize = 40;
const MAX_CACHE_BITS: u32 = 11;
const MAX_CODE_LENGTH: u8 = 15;

/// Order the code length code lengths are stored in
const CODE_LENGTH_ORDER: [usize; 19] = [
    17, 18, 0, 1, 2, 3, 4, 5, 16, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15
];

/// `(dx, dy)` of the 120 short distance codes, nearest neighbours first
#[rustfmt::skip]
const DISTANCE_MAP: [(i8, i8); 120] = [
    (0, 1), (1, 0), (1, 1), (-1, 1), (0, 2), (2, 0), (1, 2), (-1, 2),
    (2, 1), (-2, 1), (2, 2), (-2, 2), (0, 3), (3, 0), (1, 3), (-1, 3),
    (3, 1), (-3, 1), (2, 3), (-2, 3), (3, 2), (-3, 2), (0, 4), (4, 0),
    (1, 4), (-1, 4), (4, 1), (-4, 1), (3, 3), (-3, 3), (2, 4), (-2, 4),
    (4, 2), (-4, 2), (0, 5), (3, 4), (-3, 4), (4, 3), (-4, 3), (5, 0),
    (1, 5), (-1, 5), (5, 1), (-5, 1), (2, 5), (-2, 5), (5, 2), (-5, 2),
    (4, 4), (-4, 4), (3, 5), (-3, 5), (5, 3), (-5, 3), (0, 6), (6, 0),
    (1, 6), (-1, 6), (6, 1), (-6, 1), (2, 6), (-2, 6), (6, 2), (-6, 2),
    (4, 5), (-4, 5), (5, 4), (-5, 4), (3, 6), (-3, 6), (6, 3), (-6, 3),
    (0, 7), (7, 0), (1, 7), (-1, 7), (5, 5), (-5, 5), (7, 1), (-7, 1),
    (4, 6), (-4, 6), (6, 4), (-6, 4), (2, 7), (-2, 7), (7, 2), (-7, 2),
    (3, 7), (-3, 7), (7, 3), (-7, 3), (5, 6), (-5, 6), (6, 5), (-6, 5),
    (8, 0), (4, 7), (-4, 7), (7, 4), (-7, 4), (8, 1), (8, 2), (6, 6),
    (-6, 6), (8, 3), (5, 7), (-5, 7), (7, 5), (-7, 5), (8, 4), (6, 7),
    (-6, 7), (7, 6), (-7, 6), (8, 5), (7, 7), (-7, 7), (8, 6), (8, 7)
];

/// The five byte header of a VP8L chunk
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Vp8lHeader {
    pub(crate) width:         usize,
    pub(crate) height:        usize,
    /// A hint, when unset every alpha value is 255
    pub(crate) alpha_is_used: bool
}

/// Parse the header of a VP8L chunk without decoding anything else
pub(crate) fn parse_header(data: &[u8]) -> Result<Vp8lHeader, DecodeErrors> {
    let mut reader = BitReader::new(data, BitOrder::Lsb);
    read_header(&mut reader)
}

fn read_header(reader: &mut BitReader) -> Result<Vp8lHeader, DecodeErrors> {
    let signature = reader.read_bits(8)?;

    if signature != u32::from(VP8L_SIGNATURE) {
        return Err(DecodeErrors::Malformed(format!(
            "VP8L signature {signature:#04X} instead of {VP8L_SIGNATURE:#04X}"
        )));
    }
    let width = reader.read_bits(14)? as usize + 1;
    let height = reader.read_bits(14)? as usize + 1;
    let alpha_is_used = reader.read_bit()?;
    let version = reader.read_bits(3)?;

    if version != 0 {
        return Err(DecodeErrors::Malformed(format!("Unknown VP8L version {version}")));
    }
    Ok(Vp8lHeader {
        width,
        height,
        alpha_is_used
    })
}

/// Decode a whole VP8L chunk to RGBA
pub(crate) fn decode_lossless(data: &[u8]) -> Result<Bitmap, DecodeErrors> {
    let mut reader = BitReader::new(data, BitOrder::Lsb);
    let header = read_header(&mut reader)?;

    trace!("VP8L image {}x{}", header.width, header.height);

    let argb = decode_image_stream(&mut reader, header.width, header.height)?;
    let mut pixels = argb_to_rgba(&argb);

    if !header.alpha_is_used {
        force_opaque(&mut pixels);
    }
    Bitmap::from_rgba(header.width, header.height, pixels)
}

fn argb_to_rgba(argb: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(argb.len() * 4);
    for pixel in argb {
        let [a, r, g, b] = pixel.to_be_bytes();
        out.extend_from_slice(&[r, g, b, a]);
    }
    out
}

/// Decode the main image stream of a `width` x `height` image, header excluded
///
/// Also the format of losslessly compressed ALPH chunks.
pub(crate) fn decode_image_stream(
    reader: &mut BitReader, width: usize, height: usize
) -> Result<Vec<u32>, DecodeErrors> {
    let mut transforms: Vec<Transform> = Vec::new();
    let mut coded_width = width;

    while reader.read_bit()? {
        let transform = read_transform(reader, coded_width, height)?;

        if transforms.iter().any(|t| t.kind() == transform.kind()) {
            return Err(DecodeErrors::Malformed(format!(
                "VP8L transform {} appears twice",
                transform.kind()
            )));
        }
        trace!("VP8L transform {}", transform.kind());
        coded_width = transform.coded_width(coded_width);
        transforms.push(transform);
    }

    let cache_bits = read_cache_bits(reader)?;

    let entropy = if reader.read_bit()? {
        let bits = reader.read_bits(3)? as u8 + 2;
        let blocks_wide = subsample(coded_width, bits);
        let blocks_high = subsample(height, bits);
        let image = decode_sub_image(reader, blocks_wide, blocks_high)?;

        Some(EntropyImage {
            bits,
            width: blocks_wide,
            groups: image.iter().map(|p| ((p >> 8) & 0xffff) as usize).collect()
        })
    } else {
        None
    };
    let num_groups = entropy
        .as_ref()
        .and_then(|e| e.groups.iter().max())
        .map_or(1, |max| max + 1);

    trace!("VP8L {num_groups} prefix code group(s), cache bits {cache_bits:?}");

    let groups = (0..num_groups)
        .map(|_| CodeGroup::read(reader, cache_bits))
        .collect::<Result<Vec<_>, _>>()?;

    let mut pixels = decode_pixels(
        reader,
        coded_width,
        height,
        &groups,
        entropy.as_ref(),
        cache_bits
    )?;

    for transform in transforms.iter().rev() {
        pixels = transform.inverse(pixels, height);
    }
    Ok(pixels)
}

/// A transform or entropy image, no transforms and a single code group
fn decode_sub_image(
    reader: &mut BitReader, width: usize, height: usize
) -> Result<Vec<u32>, DecodeErrors> {
    let cache_bits = read_cache_bits(reader)?;
    let group = CodeGroup::read(reader, cache_bits)?;

    decode_pixels(reader, width, height, &[group], None, cache_bits)
}

fn read_transform(
    reader: &mut BitReader, width: usize, height: usize
) -> Result<Transform, DecodeErrors> {
    let transform = match reader.read_bits(2)? {
        0 => {
            let bits = reader.read_bits(3)? as u8 + 2;
            let modes =
                decode_sub_image(reader, subsample(width, bits), subsample(height, bits))?;
            Transform::Predictor { bits, width, modes }
        }
        1 => {
            let bits = reader.read_bits(3)? as u8 + 2;
            let elements =
                decode_sub_image(reader, subsample(width, bits), subsample(height, bits))?;
            Transform::Color {
                bits,
                width,
                elements
            }
        }
        2 => Transform::SubtractGreen,
        _ => {
            let size = reader.read_bits(8)? as usize + 1;
            let mut palette = decode_sub_image(reader, size, 1)?;

            // entries are stored as differences to the previous one
            for i in 1..palette.len() {
                palette[i] = add_pixels(palette[i], palette[i - 1]);
            }
            let bits = match size {
                0..=2 => 3,
                3..=4 => 2,
                5..=16 => 1,
                _ => 0
            };
            Transform::ColorIndexing {
                bits,
                width,
                palette
            }
        }
    };
    Ok(transform)
}

fn read_cache_bits(reader: &mut BitReader) -> Result<Option<u32>, DecodeErrors> {
    if !reader.read_bit()? {
        return Ok(None);
    }
    let bits = reader.read_bits(4)?;

    if !(1..=MAX_CACHE_BITS).contains(&bits) {
        return Err(DecodeErrors::Malformed(format!(
            "VP8L colour cache of {bits} bits, must be 1 to {MAX_CACHE_BITS}"
        )));
    }
    Ok(Some(bits))
}

/// Block wise choice of code group
struct EntropyImage {
    bits:   u8,
    width:  usize,
    groups: Vec<usize>
}

impl EntropyImage {
    #[inline]
    fn group_at(&self, x: usize, y: usize) -> usize {
        self.groups[(y >> self.bits) * self.width + (x >> self.bits)]
    }
}

/// Recently used colours, addressed by a multiplicative hash
struct ColorCache {
    shift:  u32,
    colors: Vec<u32>
}

impl ColorCache {
    fn new(bits: u32) -> ColorCache {
        ColorCache {
            shift:  32 - bits,
            colors: vec![0; 1 << bits]
        }
    }

    #[inline]
    fn insert(&mut self, argb: u32) {
        let key = 0x1e35_a7bd_u32.wrapping_mul(argb) >> self.shift;
        self.colors[key as usize] = argb;
    }
}

/// A prefix code, a lone symbol takes no bits at all
#[derive(Debug)]
enum PrefixCode {
    Single(u16),
    Table(HuffmanTable)
}

impl PrefixCode {
    fn from_lengths(lengths: &[u8]) -> Result<PrefixCode, DecodeErrors> {
        let mut used = lengths.iter().enumerate().filter(|(_, l)| **l != 0);

        match (used.next(), used.next()) {
            (None, _) => Err(DecodeErrors::Malformed(
                "VP8L prefix code without any symbol".into()
            )),
            (Some((symbol, _)), None) => Ok(PrefixCode::Single(symbol as u16)),
            _ => {
                let kraft: u32 = lengths
                    .iter()
                    .filter(|l| **l != 0)
                    .map(|l| 1 << (MAX_CODE_LENGTH - l))
                    .sum();

                if kraft != 1 << MAX_CODE_LENGTH {
                    return Err(DecodeErrors::Malformed(
                        "VP8L prefix code is not complete".into()
                    ));
                }
                Ok(PrefixCode::Table(HuffmanTable::from_lengths(lengths)?))
            }
        }
    }

    #[inline]
    fn read_symbol(&self, reader: &mut BitReader) -> Result<u16, DecodeErrors> {
        match self {
            PrefixCode::Single(symbol) => Ok(*symbol),
            PrefixCode::Table(table) => table.decode_one(reader)
        }
    }
}

fn read_prefix_code(
    reader: &mut BitReader, alphabet_size: usize
) -> Result<PrefixCode, DecodeErrors> {
    let mut lengths = vec![0_u8; alphabet_size];

    if reader.read_bit()? {
        // one or two symbols, each with a one bit code
        let two_symbols = reader.read_bit()?;
        let first_bits = if reader.read_bit()? { 8 } else { 1 };
        let mut symbols = vec![reader.read_bits(first_bits)? as usize];

        if two_symbols {
            symbols.push(reader.read_bits(8)? as usize);
        }
        for symbol in symbols {
            let length = lengths.get_mut(symbol).ok_or_else(|| {
                DecodeErrors::Malformed(format!(
                    "VP8L symbol {symbol} outside an alphabet of {alphabet_size}"
                ))
            })?;
            *length = 1;
        }
        return PrefixCode::from_lengths(&lengths);
    }

    let num_code_lengths = reader.read_bits(4)? as usize + 4;
    let mut code_length_lengths = [0_u8; 19];

    for &symbol in &CODE_LENGTH_ORDER[..num_code_lengths] {
        code_length_lengths[symbol] = reader.read_bits(3)? as u8;
    }
    let code_length_code = PrefixCode::from_lengths(&code_length_lengths)?;

    let mut max_symbol = if reader.read_bit()? {
        let length_bits = 2 + 2 * reader.read_bits(3)? as u8;
        let max_symbol = 2 + reader.read_bits(length_bits)? as usize;

        if max_symbol > alphabet_size {
            return Err(DecodeErrors::Malformed(format!(
                "VP8L max symbol {max_symbol} above the alphabet size {alphabet_size}"
            )));
        }
        max_symbol
    } else {
        alphabet_size
    };

    let mut symbol = 0;
    let mut previous = 8;

    while symbol < alphabet_size && max_symbol > 0 {
        max_symbol -= 1;

        let code = code_length_code.read_symbol(reader)?;

        if code < 16 {
            lengths[symbol] = code as u8;
            symbol += 1;
            if code != 0 {
                previous = code as u8;
            }
            continue;
        }
        let (extra_bits, offset, value) = match code {
            16 => (2, 3, previous),
            17 => (3, 3, 0),
            _ => (7, 11, 0)
        };
        let repeat = reader.read_bits(extra_bits)? as usize + offset;

        if symbol + repeat > alphabet_size {
            return Err(DecodeErrors::Malformed(format!(
                "VP8L code lengths repeat past the alphabet size {alphabet_size}"
            )));
        }
        lengths[symbol..symbol + repeat].fill(value);
        symbol += repeat;
    }
    PrefixCode::from_lengths(&lengths)
}

/// The five prefix codes used together for a block of pixels
struct CodeGroup {
    /// Green literals, then length prefixes, then colour cache indices
    green:    PrefixCode,
    red:      PrefixCode,
    blue:     PrefixCode,
    alpha:    PrefixCode,
    distance: PrefixCode
}

impl CodeGroup {
    fn read(reader: &mut BitReader, cache_bits: Option<u32>) -> Result<CodeGroup, DecodeErrors> {
        let cache_size = cache_bits.map_or(0, |bits| 1 << bits);

        Ok(CodeGroup {
            green:    read_prefix_code(reader, NUM_LITERAL_CODES + NUM_LENGTH_CODES + cache_size)?,
            red:      read_prefix_code(reader, NUM_LITERAL_CODES)?,
            blue:     read_prefix_code(reader, NUM_LITERAL_CODES)?,
            alpha:    read_prefix_code(reader, NUM_LITERAL_CODES)?,
            distance: read_prefix_code(reader, NUM_DISTANCE_CODES)?
        })
    }
}

/// Length or distance from its prefix symbol and extra bits
fn prefix_value(reader: &mut BitReader, symbol: u16) -> Result<usize, DecodeErrors> {
    let symbol = usize::from(symbol);

    if symbol < 4 {
        return Ok(symbol + 1);
    }
    let extra_bits = (symbol - 2) >> 1;
    let offset = (2 + (symbol & 1)) << extra_bits;

    Ok(offset + reader.read_bits(extra_bits as u8)? as usize + 1)
}

/// Turn a distance code into a distance in pixels
fn plane_distance(width: usize, code: usize) -> usize {
    if code > DISTANCE_MAP.len() {
        return code - DISTANCE_MAP.len();
    }
    let (dx, dy) = DISTANCE_MAP[code - 1];
    let distance = isize::from(dx) + isize::from(dy) * width as isize;

    distance.max(1) as usize
}

fn decode_pixels(
    reader: &mut BitReader, width: usize, height: usize, groups: &[CodeGroup],
    entropy: Option<&EntropyImage>, cache_bits: Option<u32>
) -> Result<Vec<u32>, DecodeErrors> {
    let total = width * height;
    let mut pixels = Vec::with_capacity(total);
    let mut cache = cache_bits.map(ColorCache::new);
    let mut cached = 0;

    while pixels.len() < total {
        let pos = pixels.len();
        let group = match entropy {
            Some(entropy) => &groups[entropy.group_at(pos % width, pos / width)],
            None => &groups[0]
        };
        let green = usize::from(group.green.read_symbol(reader)?);

        if green < NUM_LITERAL_CODES {
            let red = u32::from(group.red.read_symbol(reader)?);
            let blue = u32::from(group.blue.read_symbol(reader)?);
            let alpha = u32::from(group.alpha.read_symbol(reader)?);

            pixels.push((alpha << 24) | (red << 16) | ((green as u32) << 8) | blue);
        } else if green < NUM_LITERAL_CODES + NUM_LENGTH_CODES {
            let length = prefix_value(reader, (green - NUM_LITERAL_CODES) as u16)?;
            let distance_symbol = group.distance.read_symbol(reader)?;
            let distance = plane_distance(width, prefix_value(reader, distance_symbol)?);

            if distance > pos || length > total - pos {
                return Err(DecodeErrors::Malformed(format!(
                    "VP8L copy of {length} pixels from {distance} back at pixel {pos} of {total}"
                )));
            }
            for i in 0..length {
                pixels.push(pixels[pos - distance + i]);
            }
        } else {
            let index = green - NUM_LITERAL_CODES - NUM_LENGTH_CODES;
            let color = cache
                .as_ref()
                .and_then(|cache| cache.colors.get(index))
                .copied()
                .ok_or(DecodeErrors::InvalidCode("vp8l colour cache index"))?;
            pixels.push(color);
        }

        if let Some(cache) = &mut cache {
            for pixel in &pixels[cached..] {
                cache.insert(*pixel);
            }
            cached = pixels.len();
        }
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use loupe_bitstream::{BitOrder, BitReader};

    use crate::lossless::{parse_header, plane_distance, prefix_value, PrefixCode};

    #[test]
    fn header_fields() {
        // 0x2f, width - 1 = 10, height - 1 = 4, alpha used, version 0
        let packed: u32 = 10 | (4 << 14) | (1 << 28);
        let mut data = vec![0x2f];
        data.extend_from_slice(&packed.to_le_bytes());

        let header = parse_header(&data).unwrap();
        assert_eq!((header.width, header.height), (11, 5));
        assert!(header.alpha_is_used);

        let packed = packed | (1 << 29);
        data[1..].copy_from_slice(&packed.to_le_bytes());
        assert!(parse_header(&data).is_err());
    }

    #[test]
    fn short_distances_follow_the_neighbourhood() {
        assert_eq!(plane_distance(10, 1), 10);
        assert_eq!(plane_distance(10, 2), 1);
        assert_eq!(plane_distance(10, 3), 11);
        assert_eq!(plane_distance(10, 4), 9);
        // (-1, 1) on a one pixel wide image would point at the pixel itself
        assert_eq!(plane_distance(1, 4), 1);
        assert_eq!(plane_distance(10, 121), 1);
        assert_eq!(plane_distance(10, 500), 380);
    }

    #[test]
    fn prefix_values() {
        let data = [0b0000_0110];
        let mut reader = BitReader::new(&data, BitOrder::Lsb);
        assert_eq!(prefix_value(&mut reader, 3).unwrap(), 4);
        // symbol 4 covers 5 and 6, symbol 7 covers 13 to 16
        assert_eq!(prefix_value(&mut reader, 4).unwrap(), 5);
        assert_eq!(prefix_value(&mut reader, 7).unwrap(), 16);
    }

    #[test]
    fn lone_and_incomplete_codes() {
        let mut lengths = [0_u8; 40];
        lengths[7] = 3;
        assert!(matches!(
            PrefixCode::from_lengths(&lengths),
            Ok(PrefixCode::Single(7))
        ));

        lengths[9] = 3;
        assert!(PrefixCode::from_lengths(&lengths).is_err());
        assert!(PrefixCode::from_lengths(&[0; 4]).is_err());

        lengths[7] = 1;
        lengths[9] = 1;
        assert!(matches!(
            PrefixCode::from_lengths(&lengths),
            Ok(PrefixCode::Table(_))
        ));
    }
}
