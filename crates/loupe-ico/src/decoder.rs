/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::format;
use alloc::vec::Vec;

use loupe_bmp::BmpDecoder;
use loupe_core::bitmap::Bitmap;
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::FrameDescriptor;
use loupe_core::log::{debug, trace};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::{check_frame_index, DecoderPlugin};
use loupe_png::{probe_png, PngDecoder};

/// Size of the ICONDIR header
const HEADER_SIZE: usize = 6;
/// Size of one ICONDIRENTRY
const ENTRY_SIZE: usize = 16;

/// Whether a file holds icons or cursors
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IconKind {
    Icon,
    Cursor
}

impl IconKind {
    fn from_int(int: u16) -> Option<IconKind> {
        match int {
            1 => Some(IconKind::Icon),
            2 => Some(IconKind::Cursor),
            _ => None
        }
    }
}

/// One image listed in the directory
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IconEntry {
    pub width:     usize,
    pub height:    usize,
    /// Bits per pixel as listed, zero when the writer left it out
    pub bit_count: u16,
    /// Hot spot of a cursor, measured from the top left corner
    pub hotspot:   Option<(u16, u16)>,
    pub offset:    usize,
    pub size:      usize
}

/// Probe some bytes to see if they start an ICO or CUR file
pub fn probe_ico(bytes: &[u8]) -> bool {
    if let Some(header) = bytes.get(..HEADER_SIZE) {
        let kind = u16::from_le_bytes([header[2], header[3]]);
        let count = u16::from_le_bytes([header[4], header[5]]);

        return header[..2] == [0, 0] && IconKind::from_int(kind).is_some() && count != 0;
    }
    false
}

/// An ICO and CUR decoder
///
/// Files may hold the same picture at several sizes, only the
/// largest one is decoded. Entries are either PNG files or headerless
/// bitmaps, the latter are handed to [`BmpDecoder::create_icon`].
pub struct IcoDecoder<'a> {
    data:     &'a [u8],
    options:  DecoderOptions,
    kind:     IconKind,
    entries:  Vec<IconEntry>,
    selected: usize
}

impl<'a> IcoDecoder<'a> {
    pub const fn kind(&self) -> IconKind {
        self.kind
    }

    /// Every image in the directory, in file order
    pub fn entries(&self) -> &[IconEntry] {
        &self.entries
    }

    /// The entry `frame(0)` decodes
    pub fn selected(&self) -> &IconEntry {
        &self.entries[self.selected]
    }

    fn decode_headers(bytes: &'a [u8], options: DecoderOptions) -> Result<IcoDecoder<'a>, DecodeErrors> {
        let mut stream = ByteReader::new(bytes);

        let reserved = stream.get_u16_le_err()?;
        let kind = stream.get_u16_le_err()?;
        let count = usize::from(stream.get_u16_le_err()?);

        if reserved != 0 {
            return Err(DecodeErrors::Malformed(format!(
                "Reserved field is {reserved}, not an ICO file"
            )));
        }
        let kind = IconKind::from_int(kind).ok_or_else(|| {
            DecodeErrors::Malformed(format!("Unknown resource type {kind}, expected 1 or 2"))
        })?;
        if count == 0 {
            return Err(DecodeErrors::Malformed("Directory lists no images".into()));
        }
        if !stream.has(count * ENTRY_SIZE) {
            return Err(DecodeErrors::Malformed(format!(
                "Directory of {count} entries is cut short"
            )));
        }
        let mut entries = Vec::with_capacity(count);

        for _ in 0..count {
            // zero stands for 256
            let width = match stream.get_u8_err()? {
                0 => 256,
                x => usize::from(x)
            };
            let height = match stream.get_u8_err()? {
                0 => 256,
                x => usize::from(x)
            };
            // colour count and reserved
            stream.skip(2)?;
            let planes_or_x = stream.get_u16_le_err()?;
            let bits_or_y = stream.get_u16_le_err()?;
            let size = stream.get_u32_le_err()? as usize;
            let offset = stream.get_u32_le_err()? as usize;

            let (bit_count, hotspot) = match kind {
                IconKind::Icon => (bits_or_y, None),
                IconKind::Cursor => (0, Some((planes_or_x, bits_or_y)))
            };
            trace!("{kind:?} entry {width}x{height}, {size} bytes at {offset}");

            entries.push(IconEntry {
                width,
                height,
                bit_count,
                hotspot,
                offset,
                size
            });
        }

        // largest area wins, then the deeper image, then the first one
        let selected = entries
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, x)| (x.width * x.height, x.bit_count))
            .map_or(0, |(i, _)| i);

        let entry = &entries[selected];
        debug!("Using entry {selected} of {count}, {}x{}", entry.width, entry.height);
        options.check_dimensions(entry.width, entry.height)?;

        Ok(IcoDecoder {
            data: bytes,
            options,
            kind,
            entries,
            selected
        })
    }

    fn decode_entry(&self) -> Result<Bitmap, DecodeErrors> {
        let entry = self.selected();
        let payload = entry
            .offset
            .checked_add(entry.size)
            .and_then(|end| self.data.get(entry.offset..end))
            .ok_or_else(|| {
                DecodeErrors::Malformed(format!(
                    "Image of {} bytes at {} lies outside the file",
                    entry.size, entry.offset
                ))
            })?;

        let bitmap = if probe_png(payload) {
            trace!("Entry holds a PNG");
            let mut decoder = PngDecoder::create_with_options(payload, self.options)?;
            check_size(entry, decoder.size())?;
            decoder.frame(0)?.bitmap
        } else {
            trace!("Entry holds a bitmap");
            let mut decoder = BmpDecoder::create_icon(payload, self.options)?;
            check_size(entry, decoder.size())?;
            decoder.frame(0)?.bitmap
        };
        Ok(bitmap)
    }
}

/// The embedded image must match its directory entry
fn check_size(entry: &IconEntry, size: (usize, usize)) -> Result<(), DecodeErrors> {
    if size != (entry.width, entry.height) {
        return Err(DecodeErrors::Malformed(format!(
            "Directory lists {}x{} but the image is {}x{}",
            entry.width, entry.height, size.0, size.1
        )));
    }
    Ok(())
}

impl<'a> DecoderPlugin<'a> for IcoDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        probe_ico(bytes)
    }

    fn create_with_options(bytes: &'a [u8], options: DecoderOptions) -> Result<Self, DecodeErrors> {
        IcoDecoder::decode_headers(bytes, options).map_err(DecodeErrors::in_header)
    }

    fn size(&self) -> (usize, usize) {
        let entry = self.selected();
        (entry.width, entry.height)
    }

    fn frame_count(&self) -> usize {
        1
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        check_frame_index(index, 1)?;
        self.decode_entry().map(FrameDescriptor::still)
    }
}
