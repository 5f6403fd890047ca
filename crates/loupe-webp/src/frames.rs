/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Per frame decoding, the half of compositing that knows about WebP
use core::ops::Range;

use alloc::format;
use alloc::vec::Vec;

use loupe_core::animation::FrameSource;
use loupe_core::bitmap::{Bitmap, Rect};
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::{Blend, Disposal, FrameInfo};

use crate::alpha::decode_alpha;
use crate::lossless::decode_lossless;

/// Where the coded image of a frame sits in the file
#[derive(Clone, Debug)]
pub(crate) enum FrameImage {
    /// A VP8L chunk, alpha included
    Lossless(Range<usize>),
    /// A VP8 chunk and the ALPH chunk before it, if any
    Lossy {
        data:  Range<usize>,
        alpha: Option<Range<usize>>
    }
}

#[derive(Clone, Debug)]
pub(crate) struct WebpFrame {
    pub(crate) region:   Rect,
    /// Display time in milliseconds
    pub(crate) duration: u32,
    pub(crate) disposal: Disposal,
    pub(crate) blend:    Blend,
    pub(crate) image:    FrameImage
}

/// Borrowed view of a decoder's frames, handed to the compositor
pub(crate) struct WebpFrames<'s> {
    pub(crate) data:   &'s [u8],
    pub(crate) frames: &'s [WebpFrame]
}

impl WebpFrames<'_> {
    pub(crate) fn get(&self, index: usize) -> Result<&WebpFrame, DecodeErrors> {
        self.frames.get(index).ok_or(DecodeErrors::OutOfRange {
            index,
            count: self.frames.len()
        })
    }

    /// Decode the pixels of a frame, `region` sized
    pub(crate) fn decode(&self, frame: &WebpFrame) -> Result<Bitmap, DecodeErrors> {
        match &frame.image {
            FrameImage::Lossless(range) => {
                let bitmap = decode_lossless(&self.data[range.clone()])?;

                if bitmap.dimensions() != (frame.region.width, frame.region.height) {
                    return Err(DecodeErrors::Malformed(format!(
                        "VP8L image is {:?} but the frame is {}x{}",
                        bitmap.dimensions(),
                        frame.region.width,
                        frame.region.height
                    )));
                }
                Ok(bitmap)
            }
            FrameImage::Lossy { .. } => Err(DecodeErrors::unsupported(
                "Lossy VP8 image data is not supported"
            ))
        }
    }

    /// The ALPH plane of a lossy frame, `None` for frames without one
    pub(crate) fn alpha_plane(&self, frame: &WebpFrame) -> Result<Option<Vec<u8>>, DecodeErrors> {
        match &frame.image {
            FrameImage::Lossy {
                alpha: Some(range), ..
            } => decode_alpha(
                &self.data[range.clone()],
                frame.region.width,
                frame.region.height
            )
            .map(Some),
            _ => Ok(None)
        }
    }
}

impl FrameSource for WebpFrames<'_> {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        let frame = self.get(index)?;

        Ok(FrameInfo {
            region:   frame.region,
            duration: frame.duration,
            disposal: frame.disposal,
            blend:    frame.blend
        })
    }

    fn decode_region(&mut self, index: usize) -> Result<Bitmap, DecodeErrors> {
        let frame = self.get(index)?;
        self.decode(frame)
    }
}
