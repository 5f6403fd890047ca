/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Chunk parsers
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use loupe_core::animation::AnimationState;
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::log::{debug, info, trace, warn};
use loupe_core::options::DecoderOptions;
use loupe_inflate::{DeflateDecoder, DeflateOptions};
use loupe_pixels::Palette;

use crate::decoder::{AnimationControl, PngDecoder};
use crate::enums::{blend_from_int, dispose_from_int, InterlaceMethod, PngColor};
use crate::frames::{ApngFrame, FrameControl};

impl<'a> PngDecoder<'a> {
    /// Reject in strict mode, warn otherwise
    pub(crate) fn tolerate(&self, msg: String) -> Result<(), DecodeErrors> {
        if self.options.get_strict_mode() {
            return Err(DecodeErrors::Malformed(msg));
        }
        warn!("{}", msg);
        Ok(())
    }

    pub(crate) fn parse_ihdr(&mut self, data: &[u8]) -> Result<(), DecodeErrors> {
        if self.seen_hdr {
            return Err(DecodeErrors::Malformed("Multiple IHDR, corrupt PNG".into()));
        }
        if data.len() != 13 {
            return Err(DecodeErrors::Malformed(format!(
                "Bad IHDR length {}",
                data.len()
            )));
        }
        let mut stream = ByteReader::new(data);

        let width = stream.get_u32_be_err()? as usize;
        let height = stream.get_u32_be_err()? as usize;

        self.options.check_dimensions(width, height)?;

        let depth = stream.get_u8_err()?;
        let color = stream.get_u8_err()?;

        let color = PngColor::from_int(color)
            .ok_or_else(|| DecodeErrors::Malformed(format!("Unknown color value {color}")))?;

        // verify colors plus bit depths
        match depth {
            1 | 2 | 4 => {
                if !matches!(color, PngColor::Luma | PngColor::Palette) {
                    return Err(DecodeErrors::Malformed(format!(
                        "Bit depth of {depth} only allows Greyscale or Indexed color types, but found {color:?}"
                    )));
                }
            }
            8 => (),
            16 => {
                if color == PngColor::Palette {
                    return Err(DecodeErrors::Malformed(
                        "Indexed colour cannot have 16 bit depth".into()
                    ));
                }
            }
            _ => return Err(DecodeErrors::Malformed(format!("Unknown bit depth {depth}")))
        }

        if stream.get_u8_err()? != 0 {
            return Err(DecodeErrors::Malformed("Unknown compression method".into()));
        }
        let filter_method = stream.get_u8_err()?;

        if filter_method != 0 {
            return Err(DecodeErrors::Malformed(format!(
                "Unknown filter method {filter_method}"
            )));
        }
        let interlace = stream.get_u8_err()?;
        let interlace = InterlaceMethod::from_int(interlace).ok_or_else(|| {
            DecodeErrors::Malformed(format!("Unknown interlace method {interlace}"))
        })?;

        info!("Width: {}", width);
        info!("Height: {}", height);
        info!("Color type: {:?}", color);
        info!("Depth: {:?}", depth);
        info!("Interlace :{:?}", interlace);

        self.format.info.width = width;
        self.format.info.height = height;
        self.format.info.depth = depth;
        self.format.info.color = color;
        self.format.info.interlace = interlace;

        self.animation = AnimationState::new(width, height);
        self.seen_hdr = true;

        Ok(())
    }

    pub(crate) fn parse_plte(&mut self, data: &[u8]) -> Result<(), DecodeErrors> {
        if data.is_empty() || data.len() % 3 != 0 || data.len() > 256 * 3 {
            return Err(DecodeErrors::Malformed(format!(
                "Invalid PLTE length {}, corrupt PNG",
                data.len()
            )));
        }
        if self.format.palette.is_some() {
            return self.tolerate("Multiple PLTE chunks, keeping the first".into());
        }
        if !self.idat.is_empty() {
            return self.tolerate("PLTE after image data, ignoring it".into());
        }
        match self.format.info.color {
            PngColor::Palette => {
                debug!("Palette with {} entries", data.len() / 3);
                let mut palette = Palette::from_rgb(data);
                // indices past the table show as opaque black
                palette.pad_to(256, [0, 0, 0, 255]);
                self.format.palette = Some(palette);
                self.palette_len = data.len() / 3;
            }
            PngColor::Luma | PngColor::LumaA => {
                self.tolerate("PLTE chunk in a greyscale image".into())?;
            }
            // a suggested palette for display on limited hardware
            _ => trace!("Ignoring suggested palette")
        }
        Ok(())
    }

    pub(crate) fn parse_trns(&mut self, data: &[u8]) -> Result<(), DecodeErrors> {
        let mut stream = ByteReader::new(data);

        match self.format.info.color {
            PngColor::Luma => {
                let grey = stream.get_u16_be_err()?;
                self.format.trns_key = Some([grey, 0, 0]);
            }
            PngColor::RGB => {
                let red = stream.get_u16_be_err()?;
                let green = stream.get_u16_be_err()?;
                let blue = stream.get_u16_be_err()?;
                self.format.trns_key = Some([red, green, blue]);
            }
            PngColor::Palette => {
                if self.format.palette.is_none() {
                    return Err(DecodeErrors::Malformed("tRNS chunk before PLTE".into()));
                }
                let palette_len = self.palette_len;

                let alpha = if data.len() > palette_len {
                    self.tolerate(format!(
                        "tRNS has {} entries for a palette of {palette_len}",
                        data.len()
                    ))?;
                    &data[..palette_len]
                } else {
                    data
                };
                if let Some(palette) = self.format.palette.as_mut() {
                    palette.set_alpha(alpha);
                }
            }
            color => {
                return self.tolerate(format!(
                    "A tRNS chunk shall not appear for colour type {color:?} as it is already transparent"
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn parse_actl(&mut self, data: &[u8]) -> Result<(), DecodeErrors> {
        if !self.idat.is_empty() {
            return self.tolerate("acTL after image data, not animating".into());
        }
        if self.actl.is_some() {
            return self.tolerate("Multiple acTL chunks, keeping the first".into());
        }
        let mut stream = ByteReader::new(data);

        let num_frames = stream.get_u32_be_err()? as usize;
        let num_plays = stream.get_u32_be_err()?;

        if num_frames == 0 {
            return self.tolerate("acTL declares zero frames, not animating".into());
        }
        if num_frames > self.options.get_max_frames() {
            return Err(DecodeErrors::Malformed(format!(
                "Image declares {num_frames} frames, more than the configured limit of {}",
                self.options.get_max_frames()
            )));
        }
        debug!("APNG with {num_frames} frames, {num_plays} plays");

        self.actl = Some(AnimationControl {
            num_frames,
            num_plays
        });
        Ok(())
    }

    /// Check that sequence numbers of fcTL and fdAT chunks count up
    fn check_sequence(&mut self, sequence: u32) -> Result<(), DecodeErrors> {
        let expected = self.sequence.map_or(0, |s| s.wrapping_add(1));
        self.sequence = Some(sequence);

        if sequence != expected {
            self.tolerate(format!(
                "APNG sequence number {sequence}, expected {expected}"
            ))?;
        }
        Ok(())
    }

    pub(crate) fn parse_fctl(&mut self, data: &[u8]) -> Result<(), DecodeErrors> {
        if self.actl.is_none() {
            return self.tolerate("fcTL without acTL, ignoring it".into());
        }
        let mut stream = ByteReader::new(data);

        let sequence = stream.get_u32_be_err()?;
        let width = stream.get_u32_be_err()? as usize;
        let height = stream.get_u32_be_err()? as usize;
        let x_offset = stream.get_u32_be_err()? as usize;
        let y_offset = stream.get_u32_be_err()? as usize;
        let delay_num = stream.get_u16_be_err()?;
        let delay_den = stream.get_u16_be_err()?;
        let dispose = stream.get_u8_err()?;
        let blend = stream.get_u8_err()?;

        self.check_sequence(sequence)?;

        let dispose = dispose_from_int(dispose)
            .ok_or_else(|| DecodeErrors::Malformed(format!("Unknown dispose op {dispose}")))?;
        let blend = blend_from_int(blend)
            .ok_or_else(|| DecodeErrors::Malformed(format!("Unknown blend op {blend}")))?;

        self.options.check_dimensions(width, height)?;

        let info = &self.format.info;

        if x_offset.saturating_add(width) > info.width || y_offset.saturating_add(height) > info.height
        {
            self.tolerate(format!(
                "Frame {} at ({x_offset},{y_offset}) size {width}x{height} leaves the canvas",
                self.frames.len()
            ))?;
        }
        let control = FrameControl {
            sequence,
            width,
            height,
            x_offset,
            y_offset,
            delay_num,
            delay_den,
            dispose,
            blend
        };
        trace!("fcTL {:?}", control);

        if self.frames.is_empty() && self.idat.is_empty() {
            // the default image is the first frame
            if (width, height, x_offset, y_offset) != (info.width, info.height, 0, 0) {
                return Err(DecodeErrors::Malformed(
                    "First frame control does not cover the default image".into()
                ));
            }
            self.idat_is_frame = true;
        }
        if self.frames.len() == self.options.get_max_frames() {
            return Err(DecodeErrors::Malformed(format!(
                "More than {} frames",
                self.options.get_max_frames()
            )));
        }
        self.frames.push(ApngFrame {
            control,
            data: Vec::new()
        });
        Ok(())
    }

    pub(crate) fn parse_fdat(&mut self, data: &'a [u8]) -> Result<(), DecodeErrors> {
        if data.len() < 4 {
            return Err(DecodeErrors::Malformed("fdAT chunk without a sequence number".into()));
        }
        let sequence = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        self.check_sequence(sequence)?;

        if self.frames.is_empty() || (self.idat_is_frame && self.frames.len() == 1) {
            return self.tolerate("fdAT chunk without a frame control, ignoring it".into());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.data.push(&data[4..]);
        }
        Ok(())
    }

    /// tEXt, zTXt and iTXt chunks
    pub(crate) fn parse_text(&mut self, data: &[u8], kind: TextKind) -> Result<(), DecodeErrors> {
        match read_text(data, kind, &self.options) {
            Ok((keyword, text)) => {
                trace!("Text chunk {keyword}");
                self.text.push((keyword, text));
                Ok(())
            }
            Err(err) => self.tolerate(format!("Invalid text chunk: {err}"))
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum TextKind {
    Latin1,
    Compressed,
    International
}

/// Split a null terminated keyword of 1 to 79 bytes off `data`
pub(crate) fn split_keyword(data: &[u8]) -> Result<(&[u8], &[u8]), DecodeErrors> {
    let end = data
        .iter()
        .position(|b| *b == 0)
        .ok_or(DecodeErrors::Malformed("Keyword is not null terminated".into()))?;

    if end == 0 || end > 79 {
        return Err(DecodeErrors::Malformed(format!("Keyword of {end} bytes")));
    }
    Ok((&data[..end], &data[end + 1..]))
}

/// Inflate a zlib stream found inside a chunk
pub(crate) fn inflate_chunk(
    data: &[u8], options: &DecoderOptions
) -> Result<Vec<u8>, DecodeErrors> {
    let deflate_options = DeflateOptions::default()
        .set_confirm_checksum(options.inflate_get_confirm_adler())
        .set_limit(options.inflate_get_limit());

    DeflateDecoder::new_with_options(data, deflate_options).decode_zlib()
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

fn read_text(
    data: &[u8], kind: TextKind, options: &DecoderOptions
) -> Result<(String, String), DecodeErrors> {
    let (keyword, rest) = split_keyword(data)?;
    let keyword = latin1(keyword);

    match kind {
        TextKind::Latin1 => Ok((keyword, latin1(rest))),
        TextKind::Compressed => {
            let (&method, compressed) = rest.split_first().ok_or(DecodeErrors::Truncated)?;
            if method != 0 {
                return Err(DecodeErrors::Malformed(format!(
                    "Unknown compression method {method}"
                )));
            }
            Ok((keyword, latin1(&inflate_chunk(compressed, options)?)))
        }
        TextKind::International => {
            let mut stream = ByteReader::new(rest);
            let compressed = stream.get_u8_err()? != 0;
            let method = stream.get_u8_err()?;
            let rest = stream.remaining_bytes();

            // language tag and translated keyword
            let mut fields = rest.splitn(3, |b| *b == 0);
            let _language = fields.next();
            let _translated = fields.next();
            let text = fields.next().ok_or(DecodeErrors::Truncated)?;

            let text = if compressed {
                if method != 0 {
                    return Err(DecodeErrors::Malformed(format!(
                        "Unknown compression method {method}"
                    )));
                }
                inflate_chunk(text, options)?
            } else {
                text.to_vec()
            };
            Ok((keyword, String::from_utf8_lossy(&text).into_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use loupe_core::errors::DecodeErrors;

    use crate::headers::split_keyword;

    #[test]
    fn keywords() {
        assert_eq!(split_keyword(b"Title\0a").unwrap(), (&b"Title"[..], &b"a"[..]));
        assert!(matches!(split_keyword(b"\0a"), Err(DecodeErrors::Malformed(_))));
        assert!(matches!(split_keyword(b"Title"), Err(DecodeErrors::Malformed(_))));

        let long = [b'k'; 80];
        let mut data = long.to_vec();
        data.push(0);
        assert!(split_keyword(&data).is_err());
    }
}
