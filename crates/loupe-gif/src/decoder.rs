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
use loupe_core::log::{debug, trace, warn};
use loupe_core::metadata::{Metadata, MetadataFormat};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::DecoderPlugin;
use loupe_pixels::Palette;

use crate::enums::{
    DisposalMethod, APPLICATION_LABEL, COMMENT_LABEL, EXTENSION_INTRODUCER,
    GRAPHIC_CONTROL_LABEL, IMAGE_SEPARATOR, TRAILER
};
use crate::frames::{GifFrame, GifFrames};

/// Header and logical screen descriptor
const HEADER_SIZE: usize = 13;

/// Probe some bytes to see if they start a GIF image
pub fn probe_gif(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_SIZE && (bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"))
}

/// Fields of a graphic control extension, they apply to the next image
#[derive(Copy, Clone, Debug)]
struct GraphicControl {
    disposal:    DisposalMethod,
    /// Hundredths of a second
    delay:       u16,
    transparent: Option<u8>
}

/// A GIF decoder
///
/// [`create`](DecoderPlugin::create) walks the block structure to find
/// every frame without decompressing any of them, frames are decoded and
/// composited on request.
pub struct GifDecoder<'a> {
    data:           &'a [u8],
    options:        DecoderOptions,
    width:          usize,
    height:         usize,
    bgindex:        u8,
    ratio:          u8,
    global_palette: Option<Palette>,
    frames:         Vec<GifFrame>,
    loops:          Option<u16>,
    metadata:       Option<Metadata>,
    animation:      AnimationState
}

impl<'a> GifDecoder<'a> {
    fn decode_headers(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<GifDecoder<'a>, DecodeErrors> {
        let mut stream = ByteReader::new(bytes);

        if !test_gif(&mut stream)? {
            return Err(DecodeErrors::Malformed("Not a GIF, wrong magic bytes".into()));
        }
        let width = usize::from(stream.get_u16_le_err()?);
        let height = usize::from(stream.get_u16_le_err()?);

        let flags = stream.get_u8_err()?;
        let bgindex = stream.get_u8_err()?;
        let ratio = stream.get_u8_err()?;

        options.check_dimensions(width, height)?;

        // check if we have a global palette
        let global_palette = if (flags & 0x80) > 0 {
            Some(parse_colortable(&mut stream, 2 << (flags & 7))?)
        } else {
            None
        };
        trace!("Image width  :{}", width);
        trace!("Image height :{}", height);
        trace!("Ratio: {}", ratio);

        let mut decoder = GifDecoder {
            data: bytes,
            options,
            width,
            height,
            bgindex,
            ratio,
            global_palette,
            frames: Vec::new(),
            loops: None,
            metadata: None,
            animation: AnimationState::new(width, height)
        };
        decoder.scan_blocks(&mut stream)?;

        if decoder.frames.is_empty() {
            return Err(DecodeErrors::Malformed("GIF does not contain any image".into()));
        }
        debug!("GIF has {} frame(s)", decoder.frames.len());

        Ok(decoder)
    }

    /// Walk every block up to the trailer, recording frames
    ///
    /// Once at least one frame is known, damage further on ends the walk
    /// instead of failing, the frames before it stay decodable.
    fn scan_blocks(&mut self, stream: &mut ByteReader<'a>) -> Result<(), DecodeErrors> {
        let mut control = None;

        loop {
            let Ok(introducer) = stream.get_u8_err() else {
                warn!("GIF ends without a trailer");
                return Ok(());
            };
            let result = match introducer {
                EXTENSION_INTRODUCER => self.parse_extension(stream, &mut control).map(|()| true),
                IMAGE_SEPARATOR => self.parse_image(stream, control.take()),
                TRAILER => return Ok(()),
                other => Err(DecodeErrors::Malformed(format!(
                    "Unknown GIF block introducer {other:#04X}"
                )))
            };
            match result {
                Ok(true) => (),
                Ok(false) => return Ok(()),
                Err(err) if self.frames.is_empty() || self.options.get_strict_mode() => {
                    return Err(err)
                }
                Err(err) => {
                    warn!(
                        "Ignoring the rest of the GIF after frame {}: {err:?}",
                        self.frames.len() - 1
                    );
                    return Ok(());
                }
            }
            if self.frames.len() > self.options.get_max_frames() {
                return Err(DecodeErrors::Malformed(format!(
                    "GIF has more than the configured limit of {} frames",
                    self.options.get_max_frames()
                )));
            }
        }
    }

    fn parse_extension(
        &mut self, stream: &mut ByteReader<'a>, control: &mut Option<GraphicControl>
    ) -> Result<(), DecodeErrors> {
        let label = stream.get_u8_err()?;

        match label {
            GRAPHIC_CONTROL_LABEL => {
                let size = usize::from(stream.get_u8_err()?);
                let block = stream.get_slice(size)?;

                if let [packed, delay_lo, delay_hi, transparent, ..] = *block {
                    let gce = GraphicControl {
                        disposal:    DisposalMethod::from_flags(packed),
                        delay:       u16::from_le_bytes([delay_lo, delay_hi]),
                        transparent: (packed & 1 == 1).then_some(transparent)
                    };
                    trace!("Graphic control: {gce:?}");
                    *control = Some(gce);
                } else {
                    warn!("Graphic control extension of {size} bytes, ignoring it");
                }
                skip_sub_blocks(stream)?;
            }
            APPLICATION_LABEL => {
                let size = usize::from(stream.get_u8_err()?);
                let identifier = stream.get_slice(size)?;

                if identifier == b"NETSCAPE2.0" || identifier == b"ANIMEXTS1.0" {
                    loop {
                        let size = usize::from(stream.get_u8_err()?);
                        if size == 0 {
                            break;
                        }
                        let block = stream.get_slice(size)?;
                        if let [1, lo, hi, ..] = *block {
                            let loops = u16::from_le_bytes([lo, hi]);
                            trace!("Loop count: {loops}");
                            self.loops = Some(loops);
                        }
                    }
                } else {
                    skip_sub_blocks(stream)?;
                }
            }
            COMMENT_LABEL => {
                let text = read_sub_blocks(stream)?;
                let comment = String::from_utf8_lossy(&text).into_owned();

                self.metadata
                    .get_or_insert_with(|| Metadata::new(MetadataFormat::Gif))
                    .add_entry("Comment".into(), comment);
            }
            _ => {
                trace!("Skipping extension {label:#04X}");
                skip_sub_blocks(stream)?;
            }
        }
        Ok(())
    }

    /// Record an image descriptor and skip its data
    ///
    /// Returns false when the image data runs into the end of the file,
    /// the frame is kept since what arrived may cover every pixel.
    fn parse_image(
        &mut self, stream: &mut ByteReader<'a>, control: Option<GraphicControl>
    ) -> Result<bool, DecodeErrors> {
        let left = usize::from(stream.get_u16_le_err()?);
        let top = usize::from(stream.get_u16_le_err()?);
        let width = usize::from(stream.get_u16_le_err()?);
        let height = usize::from(stream.get_u16_le_err()?);
        let packed = stream.get_u8_err()?;

        let palette = if (packed & 0x80) > 0 {
            Some(parse_colortable(stream, 2 << (packed & 7))?)
        } else {
            None
        };
        let region = Rect::new(left, top, width, height);

        if !region.fits_in(&Rect::from_size(self.width, self.height)) {
            debug!("Frame region {region:?} extends past the canvas, it will be clipped");
        }
        let data_offset = stream.position();
        // LZW minimum code size
        stream.get_u8_err()?;

        let complete = skip_sub_blocks(stream).is_ok();
        if !complete {
            warn!("Image data of frame {} is cut short", self.frames.len());
        }

        let control = control.unwrap_or(GraphicControl {
            disposal:    DisposalMethod::None,
            delay:       0,
            transparent: None
        });
        let mut duration = u32::from(control.delay) * 10;
        if duration <= 10 {
            // too fast to be meant, browsers slow these down as well
            duration = 100;
        }

        self.frames.push(GifFrame {
            region,
            duration,
            disposal: control.disposal.to_disposal(),
            transparent: control.transparent,
            interlaced: (packed & 0x40) > 0,
            palette,
            data_offset
        });
        Ok(complete)
    }

    pub const fn background_index(&self) -> u8 {
        self.bgindex
    }

    /// Pixel aspect ratio byte of the logical screen descriptor
    pub const fn aspect_ratio(&self) -> u8 {
        self.ratio
    }

    /// Where compositing currently stands
    pub const fn decode_state(&self) -> DecodeState {
        self.animation.state()
    }

    fn source(&self) -> GifFrames<'_> {
        GifFrames {
            data:           self.data,
            frames:         &self.frames,
            global_palette: self.global_palette.as_ref()
        }
    }
}

fn parse_colortable(stream: &mut ByteReader, num_entries: usize) -> Result<Palette, DecodeErrors> {
    let bytes = stream.get_slice(num_entries * 3)?;
    trace!("Colour table with {num_entries} entries");
    Ok(Palette::from_rgb(bytes))
}

fn test_gif(stream: &mut ByteReader) -> Result<bool, DecodeErrors> {
    let magic = stream.get_fixed_bytes_or_err::<6>()?;
    Ok(&magic == b"GIF87a" || &magic == b"GIF89a")
}

fn skip_sub_blocks(stream: &mut ByteReader) -> Result<(), DecodeErrors> {
    loop {
        let size = stream.get_u8_err()?;
        if size == 0 {
            return Ok(());
        }
        stream.skip(usize::from(size))?;
    }
}

fn read_sub_blocks(stream: &mut ByteReader) -> Result<Vec<u8>, DecodeErrors> {
    let mut out = Vec::new();
    loop {
        let size = stream.get_u8_err()?;
        if size == 0 {
            return Ok(out);
        }
        out.extend_from_slice(stream.get_slice(usize::from(size))?);
    }
}

impl<'a> DecoderPlugin<'a> for GifDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        probe_gif(bytes)
    }

    fn create_with_options(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<GifDecoder<'a>, DecodeErrors> {
        GifDecoder::decode_headers(bytes, options).map_err(DecodeErrors::in_header)
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// `Some(n)` from a NETSCAPE2.0 extension, `0` loops forever,
    /// otherwise the animation plays once
    fn loop_count(&self) -> Option<u32> {
        Some(self.loops.map_or(1, u32::from))
    }

    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        self.source().frame_info(index)
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        let mut source = GifFrames {
            data:           self.data,
            frames:         &self.frames,
            global_palette: self.global_palette.as_ref()
        };
        self.animation.composite(&mut source, index)
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}
