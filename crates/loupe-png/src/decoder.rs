/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use loupe_core::animation::{AnimationState, DecodeState, FrameSource};
use loupe_core::bitmap::Rect;
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::{FrameDescriptor, FrameInfo};
use loupe_core::log::{debug, trace};
use loupe_core::metadata::{Metadata, MetadataFormat};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::{check_frame_index, DecoderPlugin};
use loupe_pixels::Palette;

use crate::constants::PNG_SIGNATURE;
use crate::enums::{is_critical, InterlaceMethod, PngChunkType, PngColor};
use crate::frames::{ApngFrame, ApngFrames};
use crate::headers::{inflate_chunk, split_keyword, TextKind};
use crate::scanlines::decode_image;

/// Probe some bytes to see if they start a PNG image
pub fn probe_png(bytes: &[u8]) -> bool {
    // signature, then the IHDR chunk header
    bytes.len() >= 16 && bytes[..8] == PNG_SIGNATURE && &bytes[12..16] == b"IHDR"
}

#[derive(Copy, Clone)]
pub(crate) struct PngChunk {
    pub length:     usize,
    pub chunk:      [u8; 4],
    pub chunk_type: PngChunkType
}

#[derive(Default, Debug, Copy, Clone)]
pub(crate) struct PngInfo {
    pub width:     usize,
    pub height:    usize,
    pub depth:     u8,
    pub color:     PngColor,
    pub interlace: InterlaceMethod
}

/// How stored samples map to pixels, shared by every frame
#[derive(Default, Debug, Clone)]
pub(crate) struct PixelFormat {
    pub(crate) info:     PngInfo,
    /// PLTE entries with tRNS alpha applied, padded to 256
    pub(crate) palette:  Option<Palette>,
    /// Sample values of a tRNS chunk in greyscale (first entry) or RGB images
    pub(crate) trns_key: Option<[u16; 3]>
}

/// Contents of an acTL chunk
#[derive(Copy, Clone, Debug)]
pub(crate) struct AnimationControl {
    pub(crate) num_frames: usize,
    pub(crate) num_plays:  u32
}

fn chunk_name(chunk: [u8; 4]) -> String {
    chunk.iter().map(|b| char::from(*b)).collect()
}

/// A PNG and APNG decoder
///
/// [`create`](DecoderPlugin::create) walks every chunk, keeping
/// references to the compressed image data. Pixels are only inflated
/// when a frame is requested.
pub struct PngDecoder<'a> {
    pub(crate) options:       DecoderOptions,
    pub(crate) seen_hdr:      bool,
    pub(crate) format:        PixelFormat,
    /// Entries in the PLTE chunk before padding
    pub(crate) palette_len:   usize,
    pub(crate) idat:          Vec<&'a [u8]>,
    pub(crate) actl:          Option<AnimationControl>,
    pub(crate) frames:        Vec<ApngFrame<'a>>,
    /// An fcTL came before IDAT, the default image is frame 0
    pub(crate) idat_is_frame: bool,
    pub(crate) sequence:      Option<u32>,
    pub(crate) iccp:          Option<&'a [u8]>,
    pub(crate) exif:          Option<&'a [u8]>,
    pub(crate) text:          Vec<(String, String)>,
    pub(crate) metadata:      Option<Metadata>,
    pub(crate) animation:     AnimationState
}

impl<'a> PngDecoder<'a> {
    fn new(options: DecoderOptions) -> PngDecoder<'a> {
        PngDecoder {
            options,
            seen_hdr: false,
            format: PixelFormat::default(),
            palette_len: 0,
            idat: Vec::new(),
            actl: None,
            frames: Vec::new(),
            idat_is_frame: false,
            sequence: None,
            iccp: None,
            exif: None,
            text: Vec::new(),
            metadata: None,
            animation: AnimationState::new(0, 0)
        }
    }

    /// Bit depth of the stored samples, 1 to 16
    pub const fn bit_depth(&self) -> u8 {
        self.format.info.depth
    }

    /// Colour type from the IHDR chunk
    pub const fn color_type(&self) -> PngColor {
        self.format.info.color
    }

    pub const fn interlace_method(&self) -> InterlaceMethod {
        self.format.info.interlace
    }

    /// Where the compositor is, only moves for animated images
    pub const fn decode_state(&self) -> DecodeState {
        self.animation.state()
    }

    fn read_chunk_header(&self, stream: &mut ByteReader) -> Result<PngChunk, DecodeErrors> {
        // Format is length - chunk type - [data] -  crc chunk
        let length = stream.get_u32_be_err()? as usize;
        let chunk = stream.get_fixed_bytes_or_err::<4>()?;
        let chunk_type = PngChunkType::from_bytes(chunk);

        if !stream.has(length.saturating_add(4)) {
            debug!(
                "Not enough bytes for chunk {}, bytes requested are {}, but bytes present are {}",
                chunk_name(chunk),
                length.saturating_add(4),
                stream.remaining()
            );
            return Err(DecodeErrors::Truncated);
        }
        // Confirm the CRC here.
        #[cfg(feature = "crc")]
        {
            if self.options.png_get_confirm_crc() {
                use crate::crc::crc32_slice8;

                let data = stream.peek_at(0, length)?;
                let stored = stream.peek_at(length, 4)?;
                let stored = u32::from_be_bytes([stored[0], stored[1], stored[2], stored[3]]);

                // crc covers chunk type + chunk data
                let calc_crc = !crc32_slice8(data, crc32_slice8(&chunk, u32::MAX));

                if stored != calc_crc {
                    return Err(DecodeErrors::Malformed(format!(
                        "CRC mismatch for chunk {}, expected {stored:#010X} but found {calc_crc:#010X}",
                        chunk_name(chunk)
                    )));
                }
            }
        }
        Ok(PngChunk {
            length,
            chunk,
            chunk_type
        })
    }

    fn decode_headers(bytes: &'a [u8], options: DecoderOptions) -> Result<PngDecoder<'a>, DecodeErrors> {
        let mut stream = ByteReader::new(bytes);
        let mut decoder = PngDecoder::new(options);

        if stream.get_fixed_bytes_or_err::<8>()? != PNG_SIGNATURE {
            return Err(DecodeErrors::Malformed("Not a PNG, bad signature".into()));
        }
        // check if first chunk is ihdr here
        if stream.peek_at(4, 4)? != b"IHDR" {
            return Err(DecodeErrors::Malformed("First chunk not IHDR, corrupt PNG".into()));
        }

        loop {
            if stream.eof() {
                decoder.tolerate("No IEND chunk, image data ends early".into())?;
                break;
            }
            let chunk = match decoder.read_chunk_header(&mut stream) {
                Ok(chunk) => chunk,
                // keep what was found so far
                Err(DecodeErrors::Truncated) if !decoder.idat.is_empty() => {
                    decoder.tolerate("Chunk cut short by end of data".into())?;
                    break;
                }
                Err(err) => return Err(err)
            };
            let data = stream.get_slice(chunk.length)?;
            // crc
            stream.skip(4)?;

            trace!("Chunk {} of {} bytes", chunk_name(chunk.chunk), chunk.length);

            match chunk.chunk_type {
                PngChunkType::IHDR => decoder.parse_ihdr(data)?,
                PngChunkType::PLTE => decoder.parse_plte(data)?,
                PngChunkType::tRNS => decoder.parse_trns(data)?,
                PngChunkType::IDAT => decoder.idat.push(data),
                PngChunkType::IEND => break,
                PngChunkType::iCCP => {
                    if decoder.iccp.is_some() {
                        decoder.tolerate("Multiple iCCP chunks, keeping the first".into())?;
                    } else {
                        decoder.iccp = Some(data);
                    }
                }
                PngChunkType::eXIf => decoder.exif = Some(data),
                PngChunkType::tEXt => decoder.parse_text(data, TextKind::Latin1)?,
                PngChunkType::zTXt => decoder.parse_text(data, TextKind::Compressed)?,
                PngChunkType::iTXt => decoder.parse_text(data, TextKind::International)?,
                PngChunkType::acTL => decoder.parse_actl(data)?,
                PngChunkType::fcTL => decoder.parse_fctl(data)?,
                PngChunkType::fdAT => decoder.parse_fdat(data)?,
                PngChunkType::unkn => {
                    if is_critical(chunk.chunk) {
                        decoder.tolerate(format!(
                            "Unknown critical chunk {}, ignoring it",
                            chunk_name(chunk.chunk)
                        ))?;
                    }
                }
            }
        }

        if decoder.format.info.color == PngColor::Palette && decoder.format.palette.is_none() {
            return Err(DecodeErrors::Malformed("Palette image without a PLTE chunk".into()));
        }
        if decoder.idat.is_empty() {
            return Err(DecodeErrors::Malformed("No IDAT chunks, image has no data".into()));
        }
        decoder.finish_animation()?;
        decoder.collect_metadata();

        Ok(decoder)
    }

    /// Settle which frames make up the animation
    fn finish_animation(&mut self) -> Result<(), DecodeErrors> {
        let Some(actl) = self.actl else {
            return Ok(());
        };
        if self.idat_is_frame {
            if let Some(first) = self.frames.first_mut() {
                first.data.clone_from(&self.idat);
            }
        }
        let before = self.frames.len();
        self.frames.retain(|frame| !frame.data.is_empty());

        if self.frames.len() != before {
            self.tolerate(format!(
                "{} frame(s) without image data",
                before - self.frames.len()
            ))?;
        }
        if self.frames.is_empty() {
            self.tolerate("Animated image without frames, showing the default image".into())?;
            self.actl = None;
            return Ok(());
        }
        if self.frames.len() != actl.num_frames {
            self.tolerate(format!(
                "acTL declares {} frames but {} were found",
                actl.num_frames,
                self.frames.len()
            ))?;
        }
        debug!(
            "{} animation frames, default image {} part of the animation",
            self.frames.len(),
            if self.idat_is_frame { "is" } else { "is not" }
        );
        Ok(())
    }

    fn collect_metadata(&mut self) {
        if self.exif.is_none() && self.text.is_empty() {
            return;
        }
        let format = if self.exif.is_some() {
            MetadataFormat::Exif
        } else {
            MetadataFormat::Png
        };
        let mut metadata = Metadata::new(format);

        if let Some(exif) = self.exif {
            metadata.set_exif(exif);
        }
        for (key, value) in core::mem::take(&mut self.text) {
            metadata.add_entry(key, value);
        }
        self.metadata = Some(metadata);
    }
}

impl<'a> DecoderPlugin<'a> for PngDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        probe_png(bytes)
    }

    fn create_with_options(bytes: &'a [u8], options: DecoderOptions) -> Result<Self, DecodeErrors> {
        PngDecoder::decode_headers(bytes, options).map_err(DecodeErrors::in_header)
    }

    fn size(&self) -> (usize, usize) {
        (self.format.info.width, self.format.info.height)
    }

    /// Frames of the animation, the default image alone for still PNGs
    fn frame_count(&self) -> usize {
        if self.actl.is_some() {
            self.frames.len()
        } else {
            1
        }
    }

    fn is_animated(&self) -> bool {
        self.actl.is_some()
    }

    fn loop_count(&self) -> Option<u32> {
        self.actl.map(|actl| actl.num_plays)
    }

    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        if self.actl.is_none() {
            check_frame_index(index, 1)?;
            let (width, height) = self.size();

            return Ok(FrameInfo {
                region: Rect::new(0, 0, width, height),
                ..FrameInfo::default()
            });
        }
        let source = ApngFrames {
            frames:  &self.frames,
            format:  &self.format,
            options: self.options
        };
        source.frame_info(index)
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        if self.actl.is_none() {
            check_frame_index(index, 1)?;

            let zlib = self.idat.concat();
            let (width, height) = self.size();
            let bitmap = decode_image(&self.format, width, height, &zlib, &self.options)?;

            return Ok(FrameDescriptor::still(bitmap));
        }
        let mut source = ApngFrames {
            frames:  &self.frames,
            format:  &self.format,
            options: self.options
        };
        self.animation.composite(&mut source, index)
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Inflate the iCCP profile
    fn icc_data(&self) -> Result<Option<Vec<u8>>, DecodeErrors> {
        let Some(iccp) = self.iccp else {
            return Ok(None);
        };
        let (_name, rest) = split_keyword(iccp)?;
        let (&method, compressed) = rest.split_first().ok_or(DecodeErrors::Truncated)?;

        if method != 0 {
            return Err(DecodeErrors::Malformed(format!(
                "Unknown iCCP compression method {method}"
            )));
        }
        inflate_chunk(compressed, &self.options).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use loupe_core::animation::DecodeState;
    use loupe_core::plugin::DecoderPlugin;

    use crate::decoder::{probe_png, PngDecoder};
    use crate::enums::is_critical;

    /// A PNG with unchecked CRCs holding one RGBA pixel per row
    fn still_png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let mut data = vec![137, 80, 78, 71, 13, 10, 26, 10];
        let mut chunk = |name: &[u8; 4], body: &[u8]| {
            data.extend_from_slice(&(body.len() as u32).to_be_bytes());
            data.extend_from_slice(name);
            data.extend_from_slice(body);
            data.extend_from_slice(&[0; 4]);
        };
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
        chunk(b"IHDR", &ihdr);

        // one stored deflate block, filter byte then the pixel
        let mut idat = vec![0x78, 0x01, 0x01, 5, 0, 0xFA, 0xFF, 0];
        idat.extend_from_slice(&pixel);
        idat.extend_from_slice(&[0; 4]);
        chunk(b"IDAT", &idat);
        chunk(b"IEND", &[]);
        data
    }

    #[test]
    fn still_image_never_allocates_a_canvas() {
        let data = still_png(1, 1, [1, 2, 3, 4]);
        let mut decoder = PngDecoder::create(&data).unwrap();
        assert!(!decoder.animation.has_canvas());

        let frame = decoder.frame(0).unwrap();
        assert_eq!(frame.bitmap.pixel(0, 0), Some([1, 2, 3, 4]));
        assert!(!decoder.animation.has_canvas());
        assert_eq!(decoder.decode_state(), DecodeState::HeaderParsed);

        // the header of a huge image costs nothing until pixels are asked for
        let data = still_png(1 << 14, 1 << 14, [0; 4]);
        let decoder = PngDecoder::create(&data).unwrap();
        assert_eq!(decoder.size(), (1 << 14, 1 << 14));
        assert!(!decoder.animation.has_canvas());
    }

    #[test]
    fn probe() {
        let mut data = [0_u8; 16];
        data[..8].copy_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);
        data[12..].copy_from_slice(b"IHDR");
        assert!(probe_png(&data));
        assert!(!probe_png(&data[..15]));

        data[12..].copy_from_slice(b"IDAT");
        assert!(!probe_png(&data));
    }

    #[test]
    fn critical_bit() {
        assert!(is_critical(*b"IHDR"));
        assert!(is_critical(*b"ABCD"));
        assert!(!is_critical(*b"tEXt"));
    }
}
