/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Per frame decoding, the half of compositing that knows about GIF
use alloc::vec;
use alloc::vec::Vec;

use loupe_bitstream::{LzwDecoder, LzwOptions};
use loupe_core::animation::FrameSource;
use loupe_core::bitmap::{Bitmap, Rect};
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::{Blend, Disposal, FrameInfo};
use loupe_core::log::{trace, warn};
use loupe_pixels::Palette;

/// Where a frame lives in the stream and how it is displayed
#[derive(Clone, Debug)]
pub(crate) struct GifFrame {
    pub(crate) region:      Rect,
    /// Display time in milliseconds
    pub(crate) duration:    u32,
    pub(crate) disposal:    Disposal,
    pub(crate) transparent: Option<u8>,
    pub(crate) interlaced:  bool,
    pub(crate) palette:     Option<Palette>,
    /// Position of the LZW minimum code size byte
    pub(crate) data_offset: usize
}

/// Borrowed view of a decoder's frames, handed to the compositor
pub(crate) struct GifFrames<'s> {
    pub(crate) data:           &'s [u8],
    pub(crate) frames:         &'s [GifFrame],
    pub(crate) global_palette: Option<&'s Palette>
}

impl GifFrames<'_> {
    fn get(&self, index: usize) -> Result<&GifFrame, DecodeErrors> {
        self.frames.get(index).ok_or(DecodeErrors::OutOfRange {
            index,
            count: self.frames.len()
        })
    }

    /// Decompress the palette indices of a frame, in stored row order
    fn decode_indices(&self, frame: &GifFrame) -> Result<Vec<u8>, DecodeErrors> {
        let mut stream = ByteReader::new(self.data);
        stream.set_position(frame.data_offset)?;

        let min_code_size = stream.get_u8_err()?;
        let compressed = collect_image_data(&mut stream);
        let expected = frame.region.width * frame.region.height;

        let mut decoder = LzwDecoder::new(LzwOptions::gif(min_code_size)?)?;
        let mut indices = Vec::with_capacity(expected);

        decoder.decode_limited(&compressed, &mut indices, expected)?;

        if indices.len() < expected {
            warn!("LZW data ended after {} of {expected} pixels", indices.len());
            return Err(DecodeErrors::Truncated);
        }
        indices.truncate(expected);
        Ok(indices)
    }
}

impl FrameSource for GifFrames<'_> {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        let frame = self.get(index)?;

        Ok(FrameInfo {
            region:   frame.region,
            duration: frame.duration,
            disposal: frame.disposal,
            blend:    Blend::SourceOver
        })
    }

    fn decode_region(&mut self, index: usize) -> Result<Bitmap, DecodeErrors> {
        let frame = self.get(index)?;
        let indices = self.decode_indices(frame)?;

        // a frame without any colour table still resolves its indices
        let mut palette = frame
            .palette
            .as_ref()
            .or(self.global_palette)
            .cloned()
            .unwrap_or_else(|| Palette::black(256));

        palette.pad_to(256, [0, 0, 0, 255]);

        if let Some(transparent) = frame.transparent {
            palette.set_transparent(usize::from(transparent));
        }

        let (width, height) = (frame.region.width, frame.region.height);
        let mut pixels = vec![0; width * height * 4];

        if frame.interlaced {
            trace!("Frame {index} is interlaced");

            for (stored_row, row) in indices.chunks_exact(width).enumerate() {
                let y = interlaced_row(stored_row, height);
                palette.expand(row, &mut pixels[y * width * 4..(y + 1) * width * 4])?;
            }
        } else {
            palette.expand(&indices, &mut pixels)?;
        }
        Bitmap::from_rgba(width, height, pixels)
    }
}

/// Gather the data sub-blocks of an image
///
/// Stops quietly at the end of the file, the LZW decoder decides
/// whether what arrived is enough.
fn collect_image_data(stream: &mut ByteReader) -> Vec<u8> {
    let mut out = Vec::new();

    while let Ok(size) = stream.get_u8_err() {
        if size == 0 {
            break;
        }
        match stream.get_slice(usize::from(size)) {
            Ok(block) => out.extend_from_slice(block),
            Err(_) => {
                out.extend_from_slice(stream.remaining_bytes());
                break;
            }
        }
    }
    out
}

/// Row of the image the `stored_row`th decoded row belongs to
///
/// Interlaced images store every 8th row starting at 0, then every
/// 8th starting at 4, every 4th starting at 2 and every 2nd starting at 1.
fn interlaced_row(stored_row: usize, height: usize) -> usize {
    let pass1 = height.div_ceil(8);
    let pass2 = (height + 3) / 8;
    let pass3 = (height + 1) / 4;

    if stored_row < pass1 {
        stored_row * 8
    } else if stored_row < pass1 + pass2 {
        (stored_row - pass1) * 8 + 4
    } else if stored_row < pass1 + pass2 + pass3 {
        (stored_row - pass1 - pass2) * 4 + 2
    } else {
        (stored_row - pass1 - pass2 - pass3) * 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use crate::frames::interlaced_row;

    #[test]
    fn interlace_order() {
        let rows: Vec<usize> = (0..10).map(|r| interlaced_row(r, 10)).collect();
        assert_eq!(rows, [0, 8, 4, 2, 6, 1, 3, 5, 7, 9]);
    }

    #[test]
    fn interlace_visits_every_row_once() {
        for height in 1..40 {
            let mut seen: Vec<usize> = (0..height).map(|r| interlaced_row(r, height)).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..height).collect::<Vec<_>>(), "height {height}");
        }
    }
}
