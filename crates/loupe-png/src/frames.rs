/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! APNG frames and the view handed to the compositor
use alloc::vec::Vec;

use loupe_core::animation::FrameSource;
use loupe_core::bitmap::{Bitmap, Rect};
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::{Blend, Disposal, FrameInfo};
use loupe_core::options::DecoderOptions;

use crate::decoder::PixelFormat;
use crate::scanlines::decode_image;

/// Contents of an fcTL chunk
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct FrameControl {
    pub(crate) sequence:  u32,
    pub(crate) width:     usize,
    pub(crate) height:    usize,
    pub(crate) x_offset:  usize,
    pub(crate) y_offset:  usize,
    pub(crate) delay_num: u16,
    pub(crate) delay_den: u16,
    pub(crate) dispose:   Disposal,
    pub(crate) blend:     Blend
}

impl FrameControl {
    /// Display time in milliseconds, a zero denominator means 1/100 s units
    pub(crate) fn duration(&self) -> u32 {
        let den = if self.delay_den == 0 {
            100
        } else {
            u32::from(self.delay_den)
        };
        u32::from(self.delay_num) * 1000 / den
    }

    pub(crate) const fn region(&self) -> Rect {
        Rect::new(self.x_offset, self.y_offset, self.width, self.height)
    }
}

/// One animation frame, its control chunk and compressed data
///
/// `data` holds IDAT payloads for a first frame that doubles as the
/// default image, otherwise fdAT payloads without their sequence numbers.
#[derive(Clone, Debug)]
pub(crate) struct ApngFrame<'a> {
    pub(crate) control: FrameControl,
    pub(crate) data:    Vec<&'a [u8]>
}

/// Borrowed view of a decoder's frames, handed to the compositor
pub(crate) struct ApngFrames<'s, 'a> {
    pub(crate) frames:  &'s [ApngFrame<'a>],
    pub(crate) format:  &'s PixelFormat,
    pub(crate) options: DecoderOptions
}

impl ApngFrames<'_, '_> {
    fn get(&self, index: usize) -> Result<&ApngFrame<'_>, DecodeErrors> {
        self.frames.get(index).ok_or(DecodeErrors::OutOfRange {
            index,
            count: self.frames.len()
        })
    }
}

impl FrameSource for ApngFrames<'_, '_> {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        let control = self.get(index)?.control;

        // nothing to go back to before the first frame
        let disposal = if index == 0 && control.dispose == Disposal::RestorePrevious {
            Disposal::RestoreBackground
        } else {
            control.dispose
        };

        Ok(FrameInfo {
            region: control.region(),
            duration: control.duration(),
            disposal,
            blend: control.blend
        })
    }

    fn decode_region(&mut self, index: usize) -> Result<Bitmap, DecodeErrors> {
        let frame = self.get(index)?;
        let zlib = frame.data.concat();

        decode_image(
            self.format,
            frame.control.width,
            frame.control.height,
            &zlib,
            &self.options
        )
    }
}
