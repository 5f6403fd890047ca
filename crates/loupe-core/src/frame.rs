/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Frame level information
use crate::bitmap::{Bitmap, Rect};

/// What happens to a frame's area once the next frame is about to be drawn
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Disposal {
    /// Leave the canvas as is
    #[default]
    None,
    /// Clear the frame's region to transparent
    RestoreBackground,
    /// Restore the canvas to how it looked before the frame was drawn
    RestorePrevious
}

/// How a frame's pixels combine with what is already on the canvas
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Blend {
    /// Overwrite the region outright, alpha included
    #[default]
    Source,
    /// Alpha composite over existing canvas content
    SourceOver
}

/// Structural information about one frame, known without
/// decoding its pixels
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct FrameInfo {
    /// Area of the canvas the frame covers
    pub region:   Rect,
    /// Display time in milliseconds
    pub duration: u32,
    pub disposal: Disposal,
    pub blend:    Blend
}

/// A decoded frame as handed to the caller
///
/// `bitmap` always covers the whole logical canvas, the
/// other fields describe the frame that produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FrameDescriptor {
    pub bitmap:   Bitmap,
    /// Display time in milliseconds, `0` for still images
    pub duration: u32,
    pub region:   Rect,
    pub disposal: Disposal,
    pub blend:    Blend
}

impl FrameDescriptor {
    /// Describe a still image, its only frame covers the whole canvas
    pub fn still(bitmap: Bitmap) -> FrameDescriptor {
        FrameDescriptor {
            region: bitmap.bounds(),
            bitmap,
            duration: 0,
            disposal: Disposal::None,
            blend: Blend::Source
        }
    }

    pub(crate) fn from_info(bitmap: Bitmap, info: &FrameInfo) -> FrameDescriptor {
        FrameDescriptor {
            bitmap,
            duration: info.duration,
            region: info.region,
            disposal: info.disposal,
            blend: info.blend
        }
    }
}
