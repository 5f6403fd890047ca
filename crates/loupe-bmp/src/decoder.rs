/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

use loupe_core::bit_depth::{BitDepth, ByteEndian};
use loupe_core::bitmap::Bitmap;
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::FrameDescriptor;
use loupe_core::log::{debug, trace, warn};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::{check_frame_index, DecoderPlugin};
use loupe_pixels::alpha::{alpha_is_all_zero, force_opaque};
use loupe_pixels::sample::unpack_row;
use loupe_pixels::Palette;

use crate::common::{BmpCompression, KNOWN_HEADER_SIZES, PROFILE_EMBEDDED};
use crate::utils::{row_stride, ChannelMask};

const FILE_HEADER_SIZE: usize = 14;

/// Probe some bytes to see
/// if they consist of a BMP image
pub fn probe_bmp(bytes: &[u8]) -> bool {
    if let Some(magic_bytes) = bytes.get(0..2) {
        if magic_bytes == b"BM" {
            // skip file_size   -> 4
            // skip reserved    -> 4
            // skip data offset -> 4
            // read sz
            if let Some(sz) = bytes.get(FILE_HEADER_SIZE..FILE_HEADER_SIZE + 4) {
                let sz = u32::from_le_bytes([sz[0], sz[1], sz[2], sz[3]]);
                return KNOWN_HEADER_SIZES.contains(&sz);
            }
        }
    }
    false
}

/// A BMP decoder
///
/// Handles both complete `.bmp` files and the headerless bitmaps
/// ICO and CUR files embed, see [`BmpDecoder::create_icon`].
pub struct BmpDecoder<'a> {
    data:            &'a [u8],
    width:           usize,
    height:          usize,
    // rows are stored bottom-up
    flip_vertically: bool,
    depth:           u16,
    compression:     BmpCompression,
    masks:           [u32; 4],
    palette:         Palette,
    pixel_offset:    usize,
    icon_mask:       bool,
    icc_profile:     Option<(usize, usize)>
}

impl<'a> BmpDecoder<'a> {
    /// Create a decoder for a bitmap stored inside an ICO or CUR file
    ///
    /// The bitmap has no file header, its declared height covers both
    /// the colour rows and the one bit AND mask following them.
    ///
    /// # Errors
    /// Same as [`create`](DecoderPlugin::create)
    pub fn create_icon(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<BmpDecoder<'a>, DecodeErrors> {
        BmpDecoder::decode_headers(bytes, options, true).map_err(DecodeErrors::in_header)
    }

    /// Bits used to store one pixel
    pub const fn bits_per_pixel(&self) -> u16 {
        self.depth
    }

    pub const fn compression(&self) -> BmpCompression {
        self.compression
    }

    /// The colour table, empty for images deeper than 8 bits
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    fn decode_headers(
        bytes: &'a [u8], options: DecoderOptions, icon: bool
    ) -> Result<BmpDecoder<'a>, DecodeErrors> {
        let mut stream = ByteReader::new(bytes);
        let mut declared_offset = None;

        if !icon {
            let magic = stream.get_fixed_bytes_or_err::<2>()?;
            if &magic != b"BM" {
                return Err(DecodeErrors::Malformed(format!(
                    "Wrong magic bytes, expected `BM` but found {magic:?}"
                )));
            }
            // file size and two reserved fields
            stream.skip(8)?;
            declared_offset = Some(stream.get_u32_le_err()? as usize);
        }
        let dib_start = stream.position();
        let header_size = stream.get_u32_le_err()?;

        if !KNOWN_HEADER_SIZES.contains(&header_size) {
            return Err(DecodeErrors::Malformed(format!(
                "Unknown BMP info header size {header_size}"
            )));
        }
        let os2 = header_size == 16 || header_size == 64;

        let (width, height) = if header_size == 12 {
            let width = i64::from(stream.get_u16_le_err()?);
            let height = i64::from(stream.get_u16_le_err()?);
            (width, height)
        } else {
            let width = i64::from(stream.get_u32_le_err()? as i32);
            let height = i64::from(stream.get_u32_le_err()? as i32);
            (width, height)
        };
        if width <= 0 || height == 0 {
            return Err(DecodeErrors::Malformed(format!(
                "Invalid BMP dimensions, width {width} height {height}"
            )));
        }
        // negative heights store rows top-down
        let flip_vertically = height > 0;
        let width = width as usize;
        let mut height = height.unsigned_abs() as usize;

        if icon {
            // colour rows plus AND mask rows
            height /= 2;
        }
        options.check_dimensions(width, height)?;

        let planes = stream.get_u16_le_err()?;
        if planes != 1 {
            warn!("BMP declares {planes} planes, expected 1");
        }
        let depth = stream.get_u16_le_err()?;

        let compression = if header_size >= 20 {
            BmpCompression::from_u32(stream.get_u32_le_err()?, os2)?
        } else {
            BmpCompression::RGB
        };
        let colors_used = if header_size >= 36 {
            stream.set_position(dib_start + 32)?;
            stream.get_u32_le_err()? as usize
        } else {
            0
        };

        match depth {
            1 | 2 | 4 | 8 | 16 | 24 | 32 => (),
            0 => return Err(DecodeErrors::unsupported("BMP without a bit depth")),
            _ => {
                return Err(DecodeErrors::Malformed(format!(
                    "Invalid BMP bit depth {depth}"
                )))
            }
        }
        match compression {
            BmpCompression::RLE8 if depth != 8 => {
                return Err(DecodeErrors::Malformed(format!(
                    "RLE8 compression with bit depth {depth}"
                )))
            }
            BmpCompression::RLE4 if depth != 4 => {
                return Err(DecodeErrors::Malformed(format!(
                    "RLE4 compression with bit depth {depth}"
                )))
            }
            BmpCompression::BITFIELDS | BmpCompression::ALPHABITFIELDS
                if depth != 16 && depth != 32 =>
            {
                return Err(DecodeErrors::Malformed(format!(
                    "Bit field compression with bit depth {depth}"
                )))
            }
            _ => ()
        }
        if compression.is_rle() && !flip_vertically {
            return Err(DecodeErrors::Malformed(
                "RLE compressed BMP stored top-down".into()
            ));
        }
        trace!("Image width: {width}");
        trace!("Image height: {height}");
        trace!("Bits per pixel: {depth}");
        debug!("Compression: {compression:?}");

        let mut masks = match depth {
            16 => [0x7C00, 0x03E0, 0x001F, 0],
            32 => [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000],
            _ => [0; 4]
        };
        // end of the header and any masks following it
        let mut header_end = dib_start + header_size as usize;

        if compression.has_masks() {
            stream.set_position(dib_start + 40)?;
            masks[0] = stream.get_u32_le_err()?;
            masks[1] = stream.get_u32_le_err()?;
            masks[2] = stream.get_u32_le_err()?;

            let has_alpha =
                compression == BmpCompression::ALPHABITFIELDS || header_size >= 56;
            masks[3] = if has_alpha {
                stream.get_u32_le_err()?
            } else {
                0
            };
            if header_size == 40 {
                header_end = stream.position();
            }
            trace!("Bit masks: {masks:08X?}");
        }

        let mut icc_profile = None;

        if header_size == 124 {
            stream.set_position(dib_start + 56)?;
            let cs_type = stream.get_u32_be_err()?;

            if cs_type == PROFILE_EMBEDDED {
                stream.set_position(dib_start + 112)?;
                let offset = stream.get_u32_le_err()? as usize;
                let length = stream.get_u32_le_err()? as usize;
                // profile offsets are relative to the info header
                icc_profile = Some((dib_start + offset, length));
                trace!("Embedded ICC profile of {length} bytes");
            }
        }

        let palette = if depth <= 8 {
            read_palette(
                bytes,
                header_end,
                declared_offset,
                header_size == 12,
                depth,
                colors_used,
                options
            )?
        } else {
            Palette::new()
        };

        let pixel_offset = match declared_offset {
            Some(offset) => offset,
            None => header_end + palette.len() * if header_size == 12 { 3 } else { 4 }
        };
        if pixel_offset > bytes.len() {
            return Err(DecodeErrors::Malformed(format!(
                "Pixel data offset {pixel_offset} past the end of {} bytes",
                bytes.len()
            )));
        }

        let mut palette = palette;
        // pixel indices may address past the declared table
        palette.pad_to(256, [0, 0, 0, 255]);

        Ok(BmpDecoder {
            data: bytes,
            width,
            height,
            flip_vertically,
            depth,
            compression,
            masks,
            palette,
            pixel_offset,
            icon_mask: icon,
            icc_profile
        })
    }

    /// Decode the image into RGBA pixels, top row first
    ///
    /// # Errors
    /// - [`DecodeErrors::Truncated`] if the pixel data is shorter than the image
    /// - [`DecodeErrors::Malformed`] for RLE runs outside the image
    pub fn decode_rgba(&self) -> Result<Vec<u8>, DecodeErrors> {
        let mut pixels = vec![0; self.width * self.height * 4];

        if self.compression.is_rle() {
            self.decode_rle(&mut pixels)?;
        } else {
            self.decode_rows(&mut pixels)?;
        }

        let mut alpha_used = self.depth > 8 && self.masks[3] != 0;

        if alpha_used && alpha_is_all_zero(&pixels) {
            // a fourth channel that was never filled in
            debug!("Alpha channel is all zero, treating image as opaque");
            force_opaque(&mut pixels);
            alpha_used = false;
        }
        if self.icon_mask && !alpha_used {
            self.apply_and_mask(&mut pixels)?;
        }
        trace!("Finished decoding image");

        Ok(pixels)
    }

    fn output_row(&self, stored_row: usize) -> usize {
        if self.flip_vertically {
            self.height - 1 - stored_row
        } else {
            stored_row
        }
    }

    fn decode_rows(&self, pixels: &mut [u8]) -> Result<(), DecodeErrors> {
        let stride = row_stride(self.width, self.depth).ok_or(DecodeErrors::Truncated)?;
        // the last row may omit its padding
        let row_bytes = (self.width * usize::from(self.depth)).div_ceil(8);
        let data = self.data.get(self.pixel_offset..).ok_or(DecodeErrors::Truncated)?;

        let masks = self.masks.map(ChannelMask::new);
        let mut indices = vec![0_u16; self.width];
        let out_stride = self.width * 4;

        for stored_row in 0..self.height {
            let start = stored_row * stride;
            let src = data
                .get(start..start + row_bytes)
                .ok_or(DecodeErrors::Truncated)?;

            let y = self.output_row(stored_row);
            let out = &mut pixels[y * out_stride..(y + 1) * out_stride];

            match self.depth {
                1 | 2 | 4 | 8 => {
                    let depth = BitDepth::from_bits(self.depth).ok_or_else(|| {
                        DecodeErrors::Malformed(format!("Invalid BMP bit depth {}", self.depth))
                    })?;
                    unpack_row(src, depth, ByteEndian::LE, &mut indices)?;
                    self.palette.expand(&indices, out)?;
                }
                16 => {
                    for (px, bytes) in out.chunks_exact_mut(4).zip(src.chunks_exact(2)) {
                        let value = u32::from(u16::from_le_bytes([bytes[0], bytes[1]]));
                        write_masked(px, value, &masks);
                    }
                }
                24 => {
                    for (px, bgr) in out.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
                        px.copy_from_slice(&[bgr[2], bgr[1], bgr[0], 255]);
                    }
                }
                _ => {
                    for (px, bytes) in out.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                        let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                        write_masked(px, value, &masks);
                    }
                }
            }
        }
        Ok(())
    }

    /// Decode RLE4 and RLE8 pixel data
    ///
    /// Pixels skipped by end of line, delta or an early end of bitmap
    /// stay transparent.
    fn decode_rle(&self, pixels: &mut [u8]) -> Result<(), DecodeErrors> {
        let mut stream = ByteReader::new(self.data);
        stream.set_position(self.pixel_offset)?;

        let rle4 = self.compression == BmpCompression::RLE4;
        let (mut x, mut y) = (0_usize, 0_usize);

        while y < self.height {
            let count = stream.get_u8_err()?;
            let value = stream.get_u8_err()?;

            if count > 0 {
                for i in 0..usize::from(count) {
                    let index = if rle4 {
                        nibble(value, i)
                    } else {
                        value
                    };
                    self.put_rle_pixel(pixels, x, y, index)?;
                    x += 1;
                }
                continue;
            }
            match value {
                // end of line
                0 => {
                    x = 0;
                    y += 1;
                }
                // end of bitmap
                1 => break,
                // delta
                2 => {
                    x += usize::from(stream.get_u8_err()?);
                    y += usize::from(stream.get_u8_err()?);
                }
                // absolute mode
                _ => {
                    let count = usize::from(value);
                    let num_bytes = if rle4 { count.div_ceil(2) } else { count };
                    let run = stream.get_slice(num_bytes)?;

                    for i in 0..count {
                        let index = if rle4 { nibble(run[i / 2], i) } else { run[i] };
                        self.put_rle_pixel(pixels, x, y, index)?;
                        x += 1;
                    }
                    // runs are padded to a 16 bit boundary
                    if num_bytes % 2 == 1 {
                        stream.skip(1)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn put_rle_pixel(
        &self, pixels: &mut [u8], x: usize, y: usize, index: u8
    ) -> Result<(), DecodeErrors> {
        if x >= self.width || y >= self.height {
            return Err(DecodeErrors::Malformed(format!(
                "RLE pixel ({x},{y}) outside of the {}x{} image",
                self.width, self.height
            )));
        }
        let colour = self
            .palette
            .get(usize::from(index))
            .ok_or_else(|| DecodeErrors::Malformed(format!("Palette index {index} out of range")))?;

        let pos = (self.output_row(y) * self.width + x) * 4;
        pixels[pos..pos + 4].copy_from_slice(&colour);
        Ok(())
    }

    /// Clear pixels whose AND mask bit is set
    ///
    /// The mask follows the colour rows, a mask that is absent or cut
    /// short leaves the pixels as decoded.
    fn apply_and_mask(&self, pixels: &mut [u8]) -> Result<(), DecodeErrors> {
        if self.compression.is_rle() {
            // the compressed size is unknown, so is the mask's position
            return Ok(());
        }
        let stride = row_stride(self.width, self.depth).ok_or(DecodeErrors::Truncated)?;
        let mask_stride = row_stride(self.width, 1).ok_or(DecodeErrors::Truncated)?;
        let mask_start = self.pixel_offset + stride * self.height;

        let Some(mask) = self.data.get(mask_start..mask_start + mask_stride * self.height) else {
            debug!("Icon has no AND mask");
            return Ok(());
        };

        for (stored_row, bits) in mask.chunks_exact(mask_stride).enumerate() {
            let y = self.output_row(stored_row);
            let row = &mut pixels[y * self.width * 4..(y + 1) * self.width * 4];

            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                if (bits[x / 8] >> (7 - (x % 8))) & 1 == 1 {
                    px.copy_from_slice(&[0, 0, 0, 0]);
                }
            }
        }
        Ok(())
    }
}

fn read_palette(
    bytes: &[u8], start: usize, pixel_offset: Option<usize>, core_header: bool, depth: u16,
    colors_used: usize, options: DecoderOptions
) -> Result<Palette, DecodeErrors> {
    let entry_size = if core_header { 3 } else { 4 };
    let max_colors = 1_usize << depth;

    let mut colors = if colors_used == 0 {
        max_colors
    } else {
        colors_used
    };
    if colors > max_colors {
        if options.get_strict_mode() {
            return Err(DecodeErrors::Malformed(format!(
                "Palette of {colors} colours for a {depth} bit image"
            )));
        }
        warn!("Palette of {colors} colours for a {depth} bit image, ignoring extra entries");
        colors = max_colors;
    }

    let table = match pixel_offset {
        Some(offset) => {
            // the colour table sits between the headers and the pixels
            let available = offset.saturating_sub(start) / entry_size;
            if available < colors {
                warn!("Colour table holds {available} of {colors} declared entries");
                colors = available;
            }
            bytes
                .get(start..start + colors * entry_size)
                .ok_or(DecodeErrors::Truncated)?
        }
        None => bytes
            .get(start..start + colors * entry_size)
            .ok_or(DecodeErrors::Truncated)?
    };
    trace!("Palette entries: {colors}");

    Ok(Palette::from_bgr(table, entry_size))
}

/// Index `i` of a run of packed 4 bit values, high nibble first
#[inline]
fn nibble(byte: u8, i: usize) -> u8 {
    if i % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

#[inline]
fn write_masked(px: &mut [u8], value: u32, masks: &[ChannelMask; 4]) {
    px[0] = masks[0].extract(value);
    px[1] = masks[1].extract(value);
    px[2] = masks[2].extract(value);
    px[3] = if masks[3].is_present() {
        masks[3].extract(value)
    } else {
        255
    };
}

impl<'a> DecoderPlugin<'a> for BmpDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        probe_bmp(bytes)
    }

    fn create_with_options(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<BmpDecoder<'a>, DecodeErrors> {
        BmpDecoder::decode_headers(bytes, options, false).map_err(DecodeErrors::in_header)
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame_count(&self) -> usize {
        1
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        check_frame_index(index, 1)?;

        let pixels = self.decode_rgba()?;
        let bitmap = Bitmap::from_rgba(self.width, self.height, pixels)?;

        Ok(FrameDescriptor::still(bitmap))
    }

    fn icc_data(&self) -> Result<Option<Vec<u8>>, DecodeErrors> {
        let Some((offset, length)) = self.icc_profile else {
            return Ok(None);
        };
        let profile = offset
            .checked_add(length)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                DecodeErrors::Malformed(format!(
                    "ICC profile at {offset} of {length} bytes is outside the file"
                ))
            })?;
        Ok(Some(profile.to_vec()))
    }
}
