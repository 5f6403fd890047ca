/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use core::ops::Range;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use loupe_core::animation::{AnimationState, DecodeState, FrameSource};
use loupe_core::bitmap::Rect;
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::{Blend, Disposal, FrameDescriptor, FrameInfo};
use loupe_core::log::{debug, trace, warn};
use loupe_core::metadata::{Metadata, MetadataFormat};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::{check_frame_index, DecoderPlugin};

use crate::frames::{FrameImage, WebpFrame, WebpFrames};
use crate::lossless::parse_header;

/// `RIFF`, file size and `WEBP`
const RIFF_HEADER_SIZE: usize = 12;

/// VP8X flag for animated files
const ANIMATION_FLAG: u8 = 0x02;

/// Offset, size, duration and flags
const ANMF_HEADER_SIZE: usize = 16;

/// Probe some bytes to see if they start a WebP image
pub fn probe_webp(bytes: &[u8]) -> bool {
    bytes.len() >= RIFF_HEADER_SIZE && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP"
}

struct Chunk {
    fourcc: [u8; 4],
    range:  Range<usize>
}

/// A WebP decoder
///
/// Both the simple (`VP8 `/`VP8L`) and extended (`VP8X`) layouts are
/// understood. Creating the decoder walks the chunks, pixels are only
/// decoded when a frame is requested.
///
/// Only lossless image data can be decoded. Lossy files still report
/// their size, frames and metadata, but [`frame`](DecoderPlugin::frame)
/// returns [`DecodeErrors::Unsupported`] for them.
pub struct WebpDecoder<'a> {
    data:       &'a [u8],
    options:    DecoderOptions,
    width:      usize,
    height:     usize,
    frames:     Vec<WebpFrame>,
    animated:   bool,
    loops:      u16,
    background: [u8; 4],
    icc:        Option<Range<usize>>,
    metadata:   Option<Metadata>,
    animation:  AnimationState
}

impl<'a> WebpDecoder<'a> {
    fn decode_headers(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<WebpDecoder<'a>, DecodeErrors> {
        if !probe_webp(bytes) {
            return Err(DecodeErrors::Malformed(
                "Not a WebP, missing RIFF/WEBP header".into()
            ));
        }
        let mut stream = ByteReader::new(bytes);
        stream.skip(4)?;
        let riff_size = stream.get_u32_le_err()? as usize;
        let end = riff_size.saturating_add(8);

        // trailing bytes after the RIFF payload are not part of the image
        let data = if end <= bytes.len() {
            &bytes[..end]
        } else if options.get_strict_mode() {
            return Err(DecodeErrors::Truncated);
        } else {
            warn!("RIFF size {riff_size} runs past the {} byte file", bytes.len());
            bytes
        };
        let mut stream = ByteReader::new(data);
        stream.set_position(RIFF_HEADER_SIZE)?;

        let mut decoder = WebpDecoder {
            data,
            options,
            width: 0,
            height: 0,
            frames: Vec::new(),
            animated: false,
            loops: 0,
            background: [0; 4],
            icc: None,
            metadata: None,
            animation: AnimationState::new(0, 0)
        };
        let first = read_chunk(&mut stream)?;

        match &first.fourcc {
            b"VP8 " => {
                let (width, height) = parse_vp8_size(&data[first.range.clone()])?;
                decoder.set_size(width, height)?;
                decoder.push_still(FrameImage::Lossy {
                    data:  first.range,
                    alpha: None
                });
            }
            b"VP8L" => {
                let header = parse_header(&data[first.range.clone()])?;
                decoder.set_size(header.width, header.height)?;
                decoder.push_still(FrameImage::Lossless(first.range));
            }
            b"VP8X" => decoder.parse_extended(&data[first.range], &mut stream)?,
            other => {
                return Err(DecodeErrors::Malformed(format!(
                    "Unknown first WebP chunk {:?}",
                    fourcc_name(other)
                )))
            }
        }
        trace!("Image width  :{}", decoder.width);
        trace!("Image height :{}", decoder.height);

        if decoder.frames.is_empty() {
            return Err(DecodeErrors::Malformed("WebP does not contain any image".into()));
        }
        debug!("WebP has {} frame(s)", decoder.frames.len());

        decoder.animation = AnimationState::new(decoder.width, decoder.height);
        Ok(decoder)
    }

    fn set_size(&mut self, width: usize, height: usize) -> Result<(), DecodeErrors> {
        self.options.check_dimensions(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Record the single image of a still file, it covers the canvas
    fn push_still(&mut self, image: FrameImage) {
        self.frames.push(WebpFrame {
            region: Rect::from_size(self.width, self.height),
            duration: 0,
            disposal: Disposal::None,
            blend: Blend::Source,
            image
        });
    }

    /// Walk the chunks following a VP8X header
    ///
    /// As with the other animated formats, damage after the first frame
    /// ends the walk in non strict mode and the frames before it stay
    /// decodable.
    fn parse_extended(
        &mut self, header: &[u8], stream: &mut ByteReader<'a>
    ) -> Result<(), DecodeErrors> {
        if header.len() < 10 {
            return Err(DecodeErrors::Malformed(format!(
                "VP8X chunk of {} bytes, expected 10",
                header.len()
            )));
        }
        let flags = header[0];
        self.animated = flags & ANIMATION_FLAG != 0;
        self.set_size(read_u24(&header[4..7]) + 1, read_u24(&header[7..10]) + 1)?;

        trace!("VP8X flags: {flags:#04X}");

        let data = self.data;
        let mut anim_seen = false;
        let mut alpha = None;
        let mut exif = None;
        let mut xmp = None;

        while !stream.eof() {
            let chunk = match read_chunk(stream) {
                Ok(chunk) => chunk,
                Err(err) if self.frames.is_empty() || self.options.get_strict_mode() => {
                    return Err(err)
                }
                Err(err) => {
                    warn!(
                        "Ignoring the rest of the WebP after frame {}: {err:?}",
                        self.frames.len() - 1
                    );
                    break;
                }
            };
            let bytes = &data[chunk.range.clone()];

            match &chunk.fourcc {
                b"ICCP" => self.icc = Some(chunk.range),
                b"ANIM" => {
                    if let [b, g, r, a, lo, hi, ..] = *bytes {
                        self.background = [r, g, b, a];
                        self.loops = u16::from_le_bytes([lo, hi]);
                        trace!("Loop count: {}", self.loops);
                        anim_seen = true;
                    } else {
                        return Err(DecodeErrors::Malformed(format!(
                            "ANIM chunk of {} bytes, expected 6",
                            bytes.len()
                        )));
                    }
                }
                b"ANMF" if self.animated => match self.parse_frame(chunk.range) {
                    Ok(frame) => self.frames.push(frame),
                    Err(err) if self.frames.is_empty() || self.options.get_strict_mode() => {
                        return Err(err)
                    }
                    Err(err) => {
                        warn!(
                            "Ignoring the rest of the WebP after frame {}: {err:?}",
                            self.frames.len() - 1
                        );
                        break;
                    }
                },
                b"ALPH" if !self.animated => alpha = Some(chunk.range),
                b"VP8 " if !self.animated && self.frames.is_empty() => {
                    let size = parse_vp8_size(bytes)?;
                    self.check_canvas(size)?;
                    self.push_still(FrameImage::Lossy {
                        data:  chunk.range,
                        alpha: alpha.take()
                    });
                }
                b"VP8L" if !self.animated && self.frames.is_empty() => {
                    let header = parse_header(bytes)?;
                    self.check_canvas((header.width, header.height))?;
                    self.push_still(FrameImage::Lossless(chunk.range));
                }
                b"EXIF" => exif = Some(chunk.range),
                b"XMP " => xmp = Some(chunk.range),
                other => trace!("Skipping chunk {:?}", fourcc_name(other))
            }
            if self.frames.len() > self.options.get_max_frames() {
                return Err(DecodeErrors::Malformed(format!(
                    "WebP has more than the configured limit of {} frames",
                    self.options.get_max_frames()
                )));
            }
        }
        if self.animated && !anim_seen {
            return Err(DecodeErrors::Malformed(
                "Animated WebP without an ANIM chunk".into()
            ));
        }
        self.collect_metadata(exif, xmp);
        Ok(())
    }

    /// Parse an ANMF chunk and the image chunks nested in it
    fn parse_frame(&self, range: Range<usize>) -> Result<WebpFrame, DecodeErrors> {
        let header = self
            .data
            .get(range.start..range.start + ANMF_HEADER_SIZE)
            .filter(|_| range.len() >= ANMF_HEADER_SIZE)
            .ok_or(DecodeErrors::Truncated)?;

        let region = Rect::new(
            read_u24(&header[0..3]) * 2,
            read_u24(&header[3..6]) * 2,
            read_u24(&header[6..9]) + 1,
            read_u24(&header[9..12]) + 1
        );
        let duration = read_u24(&header[12..15]) as u32;
        let flags = header[15];

        if !region.fits_in(&Rect::from_size(self.width, self.height)) {
            return Err(DecodeErrors::Malformed(format!(
                "Frame {region:?} does not fit the {}x{} canvas",
                self.width, self.height
            )));
        }
        let blend = if flags & 0x02 != 0 {
            Blend::Source
        } else {
            Blend::SourceOver
        };
        let disposal = if flags & 0x01 != 0 {
            Disposal::RestoreBackground
        } else {
            Disposal::None
        };

        let mut stream = ByteReader::new(&self.data[..range.end]);
        stream.set_position(range.start + ANMF_HEADER_SIZE)?;

        let mut alpha = None;
        let mut image = None;

        while image.is_none() && !stream.eof() {
            let chunk = read_chunk(&mut stream)?;

            match &chunk.fourcc {
                b"ALPH" => alpha = Some(chunk.range),
                b"VP8 " => {
                    image = Some(FrameImage::Lossy {
                        data:  chunk.range,
                        alpha: alpha.take()
                    });
                }
                b"VP8L" => image = Some(FrameImage::Lossless(chunk.range)),
                other => trace!("Skipping frame chunk {:?}", fourcc_name(other))
            }
        }
        let image = image.ok_or_else(|| {
            DecodeErrors::Malformed(format!("Frame {} has no image data", self.frames.len()))
        })?;
        trace!("Frame {region:?} {duration}ms {blend:?} {disposal:?}");

        Ok(WebpFrame {
            region,
            duration,
            disposal,
            blend,
            image
        })
    }

    fn check_canvas(&self, size: (usize, usize)) -> Result<(), DecodeErrors> {
        if size != (self.width, self.height) {
            return Err(DecodeErrors::Malformed(format!(
                "Image is {}x{} but the canvas is {}x{}",
                size.0, size.1, self.width, self.height
            )));
        }
        Ok(())
    }

    fn collect_metadata(&mut self, exif: Option<Range<usize>>, xmp: Option<Range<usize>>) {
        if exif.is_none() && xmp.is_none() {
            return;
        }
        let mut metadata = Metadata::new(MetadataFormat::Webp);

        if let Some(range) = exif {
            metadata.set_exif(&self.data[range]);
        }
        if let Some(range) = xmp {
            let text = String::from_utf8_lossy(&self.data[range]).into_owned();
            metadata.add_entry("XMP".into(), text);
        }
        self.metadata = Some(metadata);
    }

    /// Background colour from the ANIM chunk as RGBA
    ///
    /// Disposed frames are cleared to transparent, this colour is only a
    /// hint for viewers.
    pub const fn background_color(&self) -> [u8; 4] {
        self.background
    }

    /// The decoded ALPH plane of frame `index`
    ///
    /// Returns `None` for lossless frames, their alpha is part of the
    /// image data, and for lossy frames stored without one.
    pub fn alpha_plane(&self, index: usize) -> Result<Option<Vec<u8>>, DecodeErrors> {
        let source = self.source();
        source.alpha_plane(source.get(index)?)
    }

    /// Where compositing currently stands
    pub const fn decode_state(&self) -> DecodeState {
        self.animation.state()
    }

    fn source(&self) -> WebpFrames<'_> {
        WebpFrames {
            data:   self.data,
            frames: &self.frames
        }
    }
}

/// Read a chunk header and skip over its payload
fn read_chunk(stream: &mut ByteReader) -> Result<Chunk, DecodeErrors> {
    let fourcc = stream.get_fixed_bytes_or_err::<4>()?;
    let size = stream.get_u32_le_err()? as usize;
    let start = stream.position();

    stream.skip(size)?;
    // payloads are padded to an even size
    if size % 2 == 1 && !stream.eof() {
        stream.skip(1)?;
    }
    Ok(Chunk {
        fourcc,
        range: start..start + size
    })
}

/// Dimensions from the frame header of a VP8 key frame
fn parse_vp8_size(data: &[u8]) -> Result<(usize, usize), DecodeErrors> {
    let [tag, _, _, s0, s1, s2, w0, w1, h0, h1, ..] = *data else {
        return Err(DecodeErrors::Truncated);
    };
    if tag & 1 != 0 {
        return Err(DecodeErrors::Malformed(
            "VP8 data does not start with a key frame".into()
        ));
    }
    if [s0, s1, s2] != [0x9d, 0x01, 0x2a] {
        return Err(DecodeErrors::Malformed("Missing VP8 start code".into()));
    }
    let width = usize::from(u16::from_le_bytes([w0, w1]) & 0x3fff);
    let height = usize::from(u16::from_le_bytes([h0, h1]) & 0x3fff);

    Ok((width, height))
}

fn read_u24(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take(3)
        .rev()
        .fold(0, |acc, &byte| (acc << 8) | usize::from(byte))
}

fn fourcc_name(fourcc: &[u8; 4]) -> String {
    String::from_utf8_lossy(fourcc).into_owned()
}

impl<'a> DecoderPlugin<'a> for WebpDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        probe_webp(bytes)
    }

    fn create_with_options(
        bytes: &'a [u8], options: DecoderOptions
    ) -> Result<WebpDecoder<'a>, DecodeErrors> {
        WebpDecoder::decode_headers(bytes, options).map_err(DecodeErrors::in_header)
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// True for files with the VP8X animation flag, even with one frame
    fn is_animated(&self) -> bool {
        self.animated
    }

    /// The ANIM loop count for animations, `0` loops forever
    fn loop_count(&self) -> Option<u32> {
        self.animated.then_some(u32::from(self.loops))
    }

    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        self.source().frame_info(index)
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        if !self.animated {
            check_frame_index(index, self.frames.len())?;
            let source = self.source();
            return source.decode(&self.frames[index]).map(FrameDescriptor::still);
        }
        let mut source = WebpFrames {
            data:   self.data,
            frames: &self.frames
        };
        self.animation.composite(&mut source, index)
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn icc_data(&self) -> Result<Option<Vec<u8>>, DecodeErrors> {
        Ok(self.icc.clone().map(|range| self.data[range].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use loupe_core::errors::DecodeErrors;
    use loupe_core::plugin::DecoderPlugin;

    use crate::decoder::{parse_vp8_size, read_u24};
    use crate::{probe_webp, WebpDecoder};

    #[rustfmt::skip]
    const LOSSY_HEADER: [u8; 30] = [
        b'R', b'I', b'F', b'F', 22, 0, 0, 0, b'W', b'E', b'B', b'P',
        b'V', b'P', b'8', b' ', 10, 0, 0, 0,
        // key frame tag, start code, 300x200 with scale bits set
        0x00, 0x00, 0x00, 0x9d, 0x01, 0x2a, 0x2c, 0x41, 0xc8, 0x80
    ];

    #[test]
    fn sniffing() {
        assert!(probe_webp(&LOSSY_HEADER));
        assert!(!probe_webp(b"RIFF\0\0\0\0WAVE"));
        assert!(!probe_webp(b"RIFF"));
    }

    #[test]
    fn lossy_reports_size_but_not_pixels() {
        let mut decoder = WebpDecoder::create(&LOSSY_HEADER).unwrap();
        assert_eq!(decoder.size(), (300, 200));
        assert_eq!(decoder.frame_count(), 1);
        assert!(!decoder.is_animated());
        assert_eq!(decoder.loop_count(), None);
        assert!(matches!(decoder.frame(0), Err(DecodeErrors::Unsupported(_))));
        assert!(matches!(decoder.frame(1), Err(DecodeErrors::OutOfRange { .. })));
    }

    #[test]
    fn vp8_frame_header() {
        assert_eq!(parse_vp8_size(&LOSSY_HEADER[20..]).unwrap(), (300, 200));

        let mut inter = LOSSY_HEADER[20..].to_vec();
        inter[0] = 1;
        assert!(parse_vp8_size(&inter).is_err());
        assert!(matches!(
            parse_vp8_size(&LOSSY_HEADER[20..28]),
            Err(DecodeErrors::Truncated)
        ));
    }

    #[test]
    fn little_endian_u24() {
        assert_eq!(read_u24(&[0x01, 0x02, 0x03]), 0x030201);
        assert_eq!(read_u24(&[0xff, 0xff, 0xff, 0x7f]), 0xff_ffff);
    }

    #[test]
    fn strict_mode_rejects_a_short_riff() {
        use loupe_core::options::DecoderOptions;

        let mut data = LOSSY_HEADER;
        data[4] = 100;

        assert!(WebpDecoder::create(&data).is_ok());
        let options = DecoderOptions::default().set_strict_mode(true);
        assert!(WebpDecoder::create_with_options(&data, options).is_err());
    }
}
