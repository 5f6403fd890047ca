/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use loupe_core::bit_depth::{BitDepth, ByteEndian};
use loupe_core::bitmap::{Bitmap, Rect};
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::FrameDescriptor;
use loupe_core::log::{debug, trace, warn};
use loupe_core::metadata::{Metadata, MetadataFormat};
use loupe_core::options::DecoderOptions;
use loupe_core::plugin::{check_frame_index, DecoderPlugin};
use loupe_pixels::alpha::unpremultiply_rgba;
use loupe_pixels::sample::packed_row_bytes;
use loupe_pixels::Palette;

use crate::convert::RowConverter;
use crate::decompress::decompress;
use crate::enums::{ExtraSample, Photometric, TiffCompression};
use crate::ifd::{read_directory, Directory};
use crate::tags::*;
use crate::tolerate;

/// Probe some bytes to see if they start a TIFF image
pub fn probe_tiff(bytes: &[u8]) -> bool {
    bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*")
}

/// How pixel data is split up
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Layout {
    /// Full width bands of rows
    Strips { rows_per_strip: usize },
    /// A grid of equally sized tiles, edge tiles are padded
    Tiles { width: usize, height: usize }
}

/// Everything needed to turn segments into pixels
#[derive(Clone, Debug)]
pub(crate) struct TiffInfo {
    pub(crate) width:                usize,
    pub(crate) height:               usize,
    pub(crate) samples_per_pixel:    usize,
    pub(crate) depth:                BitDepth,
    pub(crate) compression:          TiffCompression,
    pub(crate) photometric:          Photometric,
    pub(crate) horizontal_predictor: bool,
    /// FillOrder 2, bits are stored least significant first
    pub(crate) reversed_fill_order:  bool,
    pub(crate) t4_options:           u32,
    /// Kind of alpha held by the first extra sample
    pub(crate) alpha:                Option<ExtraSample>,
    pub(crate) palette:              Option<Palette>,
    pub(crate) layout:               Layout
}

impl TiffInfo {
    /// Position of segment `index` and the size it decodes to
    ///
    /// Tiles always decode to the full tile size, strips to
    /// the rows left in the image.
    fn segment_rect(&self, index: usize) -> Rect {
        match self.layout {
            Layout::Strips { rows_per_strip } => {
                let y = index * rows_per_strip;
                let rows = rows_per_strip.min(self.height.saturating_sub(y));
                Rect::new(0, y, self.width, rows)
            }
            Layout::Tiles { width, height } => {
                let across = self.width.div_ceil(width);
                Rect::new((index % across) * width, (index / across) * height, width, height)
            }
        }
    }

    /// Number of segments the image is split into
    fn segment_count(&self) -> usize {
        match self.layout {
            Layout::Strips { rows_per_strip } => self.height.div_ceil(rows_per_strip),
            Layout::Tiles { width, height } => {
                self.width.div_ceil(width) * self.height.div_ceil(height)
            }
        }
    }

    fn row_bytes(&self, width: usize) -> Result<usize, DecodeErrors> {
        width
            .checked_mul(self.samples_per_pixel)
            .and_then(|x| packed_row_bytes(x, self.depth))
            .ok_or_else(|| DecodeErrors::Malformed("Row size overflows".into()))
    }
}

/// A TIFF decoder
///
/// Only the first image file directory is decoded, further pages
/// are ignored.
pub struct TiffDecoder<'a> {
    data:        &'a [u8],
    options:     DecoderOptions,
    endian:      ByteEndian,
    info:        TiffInfo,
    /// Offset and length of every strip or tile
    segments:    Vec<(usize, usize)>,
    icc_profile: Option<&'a [u8]>,
    metadata:    Option<Metadata>,
    /// A recognized feature the decoder does not implement
    unsupported: Option<String>
}

/// Keeps the first reason an image cannot be decoded
fn note_unsupported(unsupported: &mut Option<String>, reason: String) {
    debug!("Unsupported: {reason}");
    unsupported.get_or_insert(reason);
}

impl<'a> TiffDecoder<'a> {
    pub const fn compression(&self) -> TiffCompression {
        self.info.compression
    }

    pub const fn photometric(&self) -> Photometric {
        self.info.photometric
    }

    /// Byte order of the file, `II` files are little endian
    pub const fn byte_order(&self) -> ByteEndian {
        self.endian
    }

    /// Whether pixel data is stored in tiles rather than strips
    pub const fn is_tiled(&self) -> bool {
        matches!(self.info.layout, Layout::Tiles { .. })
    }

    fn decode_headers(bytes: &'a [u8], options: DecoderOptions) -> Result<TiffDecoder<'a>, DecodeErrors> {
        let mut stream = ByteReader::new(bytes);

        let endian = match &stream.get_fixed_bytes_or_err::<2>()? {
            b"II" => ByteEndian::LE,
            b"MM" => ByteEndian::BE,
            order => {
                return Err(DecodeErrors::Malformed(format!(
                    "Unknown byte order {order:?}, not a TIFF"
                )))
            }
        };
        let magic = stream.get_u16_err(endian)?;
        if magic != 42 {
            return Err(DecodeErrors::Malformed(format!(
                "Wrong magic number {magic}, expected 42"
            )));
        }
        let ifd_offset = stream.get_u32_err(endian)? as usize;
        if ifd_offset < 8 {
            return Err(DecodeErrors::Malformed(format!(
                "First IFD at offset {ifd_offset}, inside the header"
            )));
        }
        let dir = read_directory(bytes, ifd_offset, endian, &options)?;
        let mut unsupported = None;

        let width = dir.required(IMAGE_WIDTH, "ImageWidth")? as usize;
        let height = dir.required(IMAGE_LENGTH, "ImageLength")? as usize;
        options.check_dimensions(width, height)?;

        let samples_per_pixel = dir.value_or(SAMPLES_PER_PIXEL, 1)? as usize;
        if samples_per_pixel == 0 {
            return Err(DecodeErrors::Malformed("Zero samples per pixel".into()));
        }

        let bits = dir.values(BITS_PER_SAMPLE)?.unwrap_or_else(|| vec![1]);
        if bits.iter().any(|x| *x != bits[0]) {
            note_unsupported(&mut unsupported, format!("Differing bits per sample {bits:?}"));
        }
        let depth = u16::try_from(bits[0])
            .ok()
            .and_then(BitDepth::from_bits)
            .unwrap_or_else(|| {
                note_unsupported(&mut unsupported, format!("{} bits per sample", bits[0]));
                BitDepth::Eight
            });

        let compression = dir.value_or(COMPRESSION, 1)?;
        let compression = TiffCompression::from_int(compression).unwrap_or_else(|| {
            note_unsupported(&mut unsupported, format!("Compression {compression}"));
            TiffCompression::None
        });

        let photometric = match dir.value(PHOTOMETRIC)? {
            Some(value) => Photometric::from_int(value).unwrap_or_else(|| {
                note_unsupported(&mut unsupported, format!("Photometric interpretation {value}"));
                Photometric::BlackIsZero
            }),
            None => {
                let guess = if compression.is_ccitt() {
                    Photometric::WhiteIsZero
                } else if samples_per_pixel >= 3 {
                    Photometric::RGB
                } else {
                    Photometric::BlackIsZero
                };
                tolerate(
                    &options,
                    format!("No photometric interpretation, assuming {guess:?}")
                )?;
                guess
            }
        };
        debug!(
            "{width}x{height} {photometric:?}, {samples_per_pixel} x {} bits, {compression:?}",
            depth.bits()
        );

        let channels = photometric.color_channels();
        if samples_per_pixel < channels {
            return Err(DecodeErrors::Malformed(format!(
                "{photometric:?} needs {channels} samples per pixel, image has {samples_per_pixel}"
            )));
        }
        let alpha = if samples_per_pixel > channels {
            let extra = dir.values(EXTRA_SAMPLES)?.unwrap_or_default();
            match extra.first().map(|x| ExtraSample::from_int(*x)) {
                Some(ExtraSample::Unspecified) | None => None,
                kind => kind
            }
        } else {
            None
        };

        if compression.is_ccitt() && (samples_per_pixel != 1 || depth != BitDepth::One) {
            return Err(DecodeErrors::Malformed(format!(
                "Fax compression on {samples_per_pixel} samples of {} bits, expected one bit",
                depth.bits()
            )));
        }

        let planar = dir.value_or(PLANAR_CONFIGURATION, 1)?;
        if planar != 1 && samples_per_pixel > 1 {
            note_unsupported(&mut unsupported, format!("Planar configuration {planar}"));
        }

        let horizontal_predictor = match dir.value_or(PREDICTOR, 1)? {
            1 => false,
            2 => {
                if !matches!(depth, BitDepth::Eight | BitDepth::Sixteen) {
                    note_unsupported(
                        &mut unsupported,
                        format!("Horizontal predictor at {} bits", depth.bits())
                    );
                }
                true
            }
            predictor => {
                note_unsupported(&mut unsupported, format!("Predictor {predictor}"));
                false
            }
        };

        let reversed_fill_order = match dir.value_or(FILL_ORDER, 1)? {
            1 => false,
            2 => true,
            order => {
                tolerate(&options, format!("Unknown fill order {order}"))?;
                false
            }
        };

        let t4_options = dir.value_or(T4_OPTIONS, 0)?;
        // bit 1 of both option tags selects uncompressed mode
        if compression == TiffCompression::CcittGroup3 && t4_options & 2 != 0
            || compression == TiffCompression::CcittGroup4 && dir.value_or(T6_OPTIONS, 0)? & 2 != 0
        {
            note_unsupported(&mut unsupported, "Uncompressed fax mode".to_string());
        }

        let palette = match photometric {
            Photometric::Palette => Some(read_color_map(&dir, depth, &options)?),
            Photometric::CMYK => {
                let ink_set = dir.value_or(INK_SET, 1)?;
                if ink_set != 1 {
                    note_unsupported(&mut unsupported, format!("Ink set {ink_set}"));
                }
                None
            }
            Photometric::YCbCr => {
                let subsampling = dir.values(YCBCR_SUBSAMPLING)?.unwrap_or_else(|| vec![2, 2]);
                if subsampling.get(..2) != Some(&[1, 1]) {
                    note_unsupported(
                        &mut unsupported,
                        format!("YCbCr subsampling {subsampling:?}")
                    );
                }
                if depth != BitDepth::Eight {
                    note_unsupported(&mut unsupported, format!("YCbCr at {} bits", depth.bits()));
                }
                None
            }
            _ => None
        };

        let (layout, offset_tag, count_tag) = match dir.value(TILE_WIDTH)? {
            Some(tile_width) => {
                let tile_height = dir.required(TILE_LENGTH, "TileLength")?;
                if tile_width == 0
                    || tile_height == 0
                    || tile_width as usize > options.get_max_width()
                    || tile_height as usize > options.get_max_height()
                {
                    return Err(DecodeErrors::Malformed(format!(
                        "Invalid tile size {tile_width}x{tile_height}"
                    )));
                }
                let layout = Layout::Tiles {
                    width:  tile_width as usize,
                    height: tile_height as usize
                };
                (layout, TILE_OFFSETS, TILE_BYTE_COUNTS)
            }
            None => {
                let rows_per_strip = dir.value_or(ROWS_PER_STRIP, u32::MAX)?;
                if rows_per_strip == 0 {
                    return Err(DecodeErrors::Malformed("Zero rows per strip".into()));
                }
                let layout = Layout::Strips {
                    rows_per_strip: (rows_per_strip as usize).min(height)
                };
                (layout, STRIP_OFFSETS, STRIP_BYTE_COUNTS)
            }
        };

        let info = TiffInfo {
            width,
            height,
            samples_per_pixel,
            depth,
            compression,
            photometric,
            horizontal_predictor,
            reversed_fill_order,
            t4_options,
            alpha,
            palette,
            layout
        };
        let segments = read_segments(&dir, &info, offset_tag, count_tag, &options)?;

        let icc_profile = dir.get(ICC_PROFILE).map(|x| x.data);
        let metadata = read_metadata(&dir, &options)?;

        Ok(TiffDecoder {
            data: bytes,
            options,
            endian,
            info,
            segments,
            icc_profile,
            metadata,
            unsupported
        })
    }

    fn decode_image(&self) -> Result<Bitmap, DecodeErrors> {
        if let Some(reason) = &self.unsupported {
            return Err(DecodeErrors::Unsupported(reason.clone()));
        }
        let info = &self.info;
        let mut bitmap = Bitmap::new(info.width, info.height);
        let mut converter = RowConverter::new(info, self.endian);
        let mut line = Vec::new();

        for (index, &(offset, length)) in self.segments.iter().enumerate() {
            let rect = info.segment_rect(index);
            let stride = info.row_bytes(rect.width)?;
            let expected = stride
                .checked_mul(rect.height)
                .ok_or_else(|| DecodeErrors::Malformed("Segment size overflows".into()))?;

            let raw = self.data.get(offset..).ok_or(DecodeErrors::Truncated)?;
            let raw = &raw[..length.min(raw.len())];

            trace!("Segment {index} at {offset}, {} bytes for {rect:?}", raw.len());

            let mut pixels = decompress(info, raw, rect.width, rect.height, expected, &self.options)?;

            // parts of edge tiles outside the image are dropped
            let visible_width = rect.width.min(info.width - rect.x);
            let visible_rows = rect.height.min(info.height - rect.y);

            line.resize(rect.width * 4, 0);

            for (y, row) in pixels.chunks_exact_mut(stride).take(visible_rows).enumerate() {
                converter.convert(row, rect.width, &mut line)?;

                let start = ((rect.y + y) * info.width + rect.x) * 4;
                bitmap.pixels_mut()[start..start + visible_width * 4]
                    .copy_from_slice(&line[..visible_width * 4]);
            }
        }
        if info.alpha == Some(ExtraSample::AssociatedAlpha) {
            unpremultiply_rgba(bitmap.pixels_mut());
        }
        Ok(bitmap)
    }
}

/// Read ColorMap, 16 bit red, green and blue tables one after the other
fn read_color_map(
    dir: &Directory, depth: BitDepth, options: &DecoderOptions
) -> Result<Palette, DecodeErrors> {
    let map = dir
        .values(COLOR_MAP)?
        .ok_or_else(|| DecodeErrors::Malformed("Palette image without a ColorMap".into()))?;

    if map.len() % 3 != 0 {
        return Err(DecodeErrors::Malformed(format!(
            "ColorMap of {} values is not three tables",
            map.len()
        )));
    }
    let entries = 1_usize << depth.bits();
    let map: Vec<u16> = map.iter().map(|x| *x as u16).collect();
    let mut palette = Palette::from_planar_u16(&map);

    if palette.len() < entries {
        tolerate(
            options,
            format!("ColorMap has {} entries, expected {entries}", palette.len())
        )?;
        palette.pad_to(entries, [0, 0, 0, 255]);
    }
    Ok(palette)
}

/// Offsets and lengths of every strip or tile
fn read_segments(
    dir: &Directory, info: &TiffInfo, offset_tag: u16, count_tag: u16, options: &DecoderOptions
) -> Result<Vec<(usize, usize)>, DecodeErrors> {
    let needed = info.segment_count();

    let offsets = dir.values(offset_tag)?.ok_or_else(|| {
        DecodeErrors::Malformed(format!("Missing tag {offset_tag}, image has no data"))
    })?;
    if offsets.len() < needed {
        return Err(DecodeErrors::Malformed(format!(
            "Image needs {needed} segments but {} offsets are present",
            offsets.len()
        )));
    }
    let counts = match dir.values(count_tag)? {
        Some(counts) if counts.len() >= needed => counts,
        Some(counts) => {
            return Err(DecodeErrors::Malformed(format!(
                "Image needs {needed} segments but {} byte counts are present",
                counts.len()
            )));
        }
        None => {
            // everything up to the end of the file
            tolerate(options, format!("Missing tag {count_tag}, guessing segment sizes"))?;
            vec![u32::MAX; needed]
        }
    };
    if offsets.len() > needed {
        warn!("{} segments present, using the first {needed}", offsets.len());
    }
    Ok(offsets
        .iter()
        .zip(&counts)
        .take(needed)
        .map(|(offset, count)| (*offset as usize, *count as usize))
        .collect())
}

fn read_metadata(dir: &Directory, options: &DecoderOptions) -> Result<Option<Metadata>, DecodeErrors> {
    let mut metadata = Metadata::new(MetadataFormat::Tiff);

    if let Some(orientation) = dir.value(ORIENTATION)? {
        if (1..=8).contains(&orientation) {
            metadata.set_orientation(orientation as u16);
        } else {
            tolerate(options, format!("Invalid orientation {orientation}"))?;
        }
    }
    for (tag, name) in TEXT_TAGS {
        if let Some(entry) = dir.get(tag) {
            metadata.add_entry(name.to_string(), entry.ascii());
        }
    }
    Ok((!metadata.is_empty()).then_some(metadata))
}

impl<'a> DecoderPlugin<'a> for TiffDecoder<'a> {
    fn sniff(bytes: &[u8]) -> bool {
        probe_tiff(bytes)
    }

    fn create_with_options(bytes: &'a [u8], options: DecoderOptions) -> Result<Self, DecodeErrors> {
        TiffDecoder::decode_headers(bytes, options).map_err(DecodeErrors::in_header)
    }

    fn size(&self) -> (usize, usize) {
        (self.info.width, self.info.height)
    }

    fn frame_count(&self) -> usize {
        1
    }

    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors> {
        check_frame_index(index, 1)?;
        self.decode_image().map(FrameDescriptor::still)
    }

    fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    fn icc_data(&self) -> Result<Option<Vec<u8>>, DecodeErrors> {
        Ok(self.icc_profile.map(<[u8]>::to_vec))
    }
}

#[cfg(test)]
mod tests {
    use loupe_core::bit_depth::BitDepth;
    use loupe_core::bitmap::Rect;

    use crate::decoder::{probe_tiff, Layout, TiffInfo};
    use crate::enums::{Photometric, TiffCompression};

    fn info(layout: Layout) -> TiffInfo {
        TiffInfo {
            width: 5,
            height: 7,
            samples_per_pixel: 3,
            depth: BitDepth::Eight,
            compression: TiffCompression::None,
            photometric: Photometric::RGB,
            horizontal_predictor: false,
            reversed_fill_order: false,
            t4_options: 0,
            alpha: None,
            palette: None,
            layout
        }
    }

    #[test]
    fn strip_geometry() {
        let strips = info(Layout::Strips { rows_per_strip: 3 });
        assert_eq!(strips.segment_count(), 3);
        assert_eq!(strips.segment_rect(1), Rect::new(0, 3, 5, 3));
        assert_eq!(strips.segment_rect(2), Rect::new(0, 6, 5, 1));
        assert_eq!(strips.row_bytes(5).unwrap(), 15);
    }

    #[test]
    fn tile_geometry() {
        let tiles = info(Layout::Tiles {
            width:  4,
            height: 4
        });
        assert_eq!(tiles.segment_count(), 4);
        assert_eq!(tiles.segment_rect(1), Rect::new(4, 0, 4, 4));
        assert_eq!(tiles.segment_rect(2), Rect::new(0, 4, 4, 4));
        assert_eq!(tiles.segment_rect(3), Rect::new(4, 4, 4, 4));
    }

    #[test]
    fn probe() {
        assert!(probe_tiff(b"II*\0\x08\0\0\0"));
        assert!(probe_tiff(b"MM\0*"));
        assert!(!probe_tiff(b"MM*\0"));
        assert!(!probe_tiff(b"II"));
    }
}
