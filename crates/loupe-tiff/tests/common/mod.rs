/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! TIFF files built in memory
#![allow(dead_code)]

pub const BYTE: u16 = 1;
pub const ASCII: u16 = 2;
pub const SHORT: u16 = 3;
pub const LONG: u16 = 4;
pub const UNDEFINED: u16 = 7;

enum Value {
    Ints(Vec<u32>),
    Bytes(Vec<u8>),
    /// Written as is into the value field
    Raw(u32, [u8; 4])
}

struct Field {
    tag:   u16,
    kind:  u16,
    value: Value
}

/// Builds a single directory TIFF
///
/// Segment data follows the header, then the directory, then the
/// values too large to fit in an entry.
pub struct TiffBuilder {
    big_endian:  bool,
    fields:      Vec<Field>,
    segments:    Vec<Vec<u8>>,
    tiled:       bool,
    byte_counts: bool
}

impl TiffBuilder {
    pub fn new(width: u32, height: u32) -> TiffBuilder {
        TiffBuilder {
            big_endian:  false,
            fields:      Vec::new(),
            segments:    Vec::new(),
            tiled:       false,
            byte_counts: true
        }
        .long(256, &[width])
        .long(257, &[height])
    }

    pub fn big_endian(mut self) -> TiffBuilder {
        self.big_endian = true;
        self
    }

    pub fn short(self, tag: u16, values: &[u16]) -> TiffBuilder {
        self.field(tag, SHORT, Value::Ints(values.iter().map(|x| u32::from(*x)).collect()))
    }

    pub fn long(self, tag: u16, values: &[u32]) -> TiffBuilder {
        self.field(tag, LONG, Value::Ints(values.to_vec()))
    }

    pub fn ascii(self, tag: u16, text: &str) -> TiffBuilder {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        self.field(tag, ASCII, Value::Bytes(bytes))
    }

    pub fn undefined(self, tag: u16, bytes: &[u8]) -> TiffBuilder {
        self.field(tag, UNDEFINED, Value::Bytes(bytes.to_vec()))
    }

    /// An entry with exactly the given type, count and value field
    pub fn raw(self, tag: u16, kind: u16, count: u32, value: [u8; 4]) -> TiffBuilder {
        self.field(tag, kind, Value::Raw(count, value))
    }

    /// Shorthand for the common colour fields
    pub fn color(self, photometric: u16, bits: &[u16]) -> TiffBuilder {
        let samples = bits.len() as u16;
        self.short(262, &[photometric])
            .short(258, bits)
            .short(277, &[samples])
    }

    pub fn compression(self, compression: u16) -> TiffBuilder {
        self.short(259, &[compression])
    }

    pub fn strips(mut self, rows_per_strip: u32, strips: Vec<Vec<u8>>) -> TiffBuilder {
        self.segments = strips;
        self.tiled = false;
        self.long(278, &[rows_per_strip])
    }

    pub fn tiles(mut self, width: u32, height: u32, tiles: Vec<Vec<u8>>) -> TiffBuilder {
        self.segments = tiles;
        self.tiled = true;
        self.long(322, &[width]).long(323, &[height])
    }

    pub fn without_byte_counts(mut self) -> TiffBuilder {
        self.byte_counts = false;
        self
    }

    fn field(mut self, tag: u16, kind: u16, value: Value) -> TiffBuilder {
        self.fields.retain(|x| x.tag != tag);
        self.fields.push(Field { tag, kind, value });
        self
    }

    fn u16_bytes(&self, value: u16) -> [u8; 2] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn u32_bytes(&self, value: u32) -> [u8; 4] {
        if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    fn encode(&self, kind: u16, value: &Value) -> (u32, Vec<u8>) {
        match value {
            Value::Bytes(bytes) => (bytes.len() as u32, bytes.clone()),
            Value::Ints(ints) => {
                let mut out = Vec::new();
                for int in ints {
                    match kind {
                        BYTE | UNDEFINED => out.push(*int as u8),
                        SHORT => out.extend_from_slice(&self.u16_bytes(*int as u16)),
                        _ => out.extend_from_slice(&self.u32_bytes(*int))
                    }
                }
                (ints.len() as u32, out)
            }
            Value::Raw(count, bytes) => (*count, bytes.to_vec())
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        let mut out = if self.big_endian {
            b"MM\0*".to_vec()
        } else {
            b"II*\0".to_vec()
        };
        out.extend_from_slice(&[0; 4]);

        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for segment in &self.segments {
            offsets.push(out.len() as u32);
            counts.push(segment.len() as u32);
            out.extend_from_slice(segment);
        }
        let (offset_tag, count_tag) = if self.tiled { (324, 325) } else { (273, 279) };
        self = self.long(offset_tag, &offsets);
        if self.byte_counts {
            self = self.long(count_tag, &counts);
        }
        self.fields.sort_by_key(|x| x.tag);

        if out.len() % 2 == 1 {
            out.push(0);
        }
        let ifd_offset = out.len() as u32;
        let ifd_bytes = self.u32_bytes(ifd_offset);
        out[4..8].copy_from_slice(&ifd_bytes);

        let mut extra_offset = out.len() + 2 + self.fields.len() * 12 + 4;
        let mut extra = Vec::new();

        out.extend_from_slice(&self.u16_bytes(self.fields.len() as u16));
        for field in &self.fields {
            let (count, bytes) = self.encode(field.kind, &field.value);

            out.extend_from_slice(&self.u16_bytes(field.tag));
            out.extend_from_slice(&self.u16_bytes(field.kind));
            out.extend_from_slice(&self.u32_bytes(count));

            if bytes.len() <= 4 {
                let mut value = [0; 4];
                value[..bytes.len()].copy_from_slice(&bytes);
                out.extend_from_slice(&value);
            } else {
                out.extend_from_slice(&self.u32_bytes(extra_offset as u32));
                extra_offset += bytes.len();
                extra.extend_from_slice(&bytes);
            }
        }
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&extra);
        out
    }
}

fn adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1_u32, 0_u32);
    for byte in data {
        a = (a + u32::from(*byte)) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}

/// A zlib stream of one stored deflate block
pub fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01, 1];
    let len = data.len() as u16;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&(!len).to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&adler32(data).to_be_bytes());
    out
}

/// Pack 9 bit LZW codes, most significant bit first unless `lsb`
pub fn pack_codes(codes: &[u16], lsb: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc = 0_u32;
    let mut bits = 0;

    for code in codes {
        if lsb {
            acc |= u32::from(*code) << bits;
            bits += 9;
            while bits >= 8 {
                out.push(acc as u8);
                acc >>= 8;
                bits -= 8;
            }
        } else {
            acc = (acc << 9) | u32::from(*code);
            bits += 9;
            while bits >= 8 {
                out.push((acc >> (bits - 8)) as u8);
                bits -= 8;
                acc &= (1 << bits) - 1;
            }
        }
    }
    if bits > 0 {
        if lsb {
            out.push(acc as u8);
        } else {
            out.push((acc << (8 - bits)) as u8);
        }
    }
    out
}
