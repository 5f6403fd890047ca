/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The contract every format decoder implements
use alloc::vec::Vec;

use crate::bitmap::Rect;
use crate::errors::DecodeErrors;
use crate::frame::{FrameDescriptor, FrameInfo};
use crate::metadata::Metadata;
use crate::options::DecoderOptions;

/// A decoder for one image format
///
/// A handle borrows the encoded bytes for its whole lifetime and never
/// copies them. Only [`create`](Self::create) and [`frame`](Self::frame)
/// do any decoding work, every other method is a cheap query on state
/// parsed during creation.
///
/// A handle is not meant to be shared between threads while decoding,
/// images decoded in parallel each need their own handle.
pub trait DecoderPlugin<'a> {
    /// Cheap structural check of whether `bytes` look like this format
    ///
    /// Never fails and never allocates, it only answers
    /// "plausibly this format".
    fn sniff(bytes: &[u8]) -> bool
    where
        Self: Sized;

    /// Parse enough of the header to know the image dimensions
    /// and frame count, with custom options
    ///
    /// # Errors
    /// [`DecodeErrors::Malformed`] if required structural fields are absent or contradictory
    fn create_with_options(bytes: &'a [u8], options: DecoderOptions) -> Result<Self, DecodeErrors>
    where
        Self: Sized;

    /// Parse enough of the header to know the image dimensions
    /// and frame count, using default options
    fn create(bytes: &'a [u8]) -> Result<Self, DecodeErrors>
    where
        Self: Sized
    {
        Self::create_with_options(bytes, DecoderOptions::default())
    }

    /// Logical canvas size as `(width, height)`
    fn size(&self) -> (usize, usize);

    /// Number of frames in the image
    fn frame_count(&self) -> usize;

    /// Whether the image is animated, true if it has more than one frame
    /// or the format declares animation explicitly
    fn is_animated(&self) -> bool {
        self.frame_count() > 1
    }

    /// Number of times the animation should play, `Some(0)` means forever
    /// and `None` that the format has no loop concept
    fn loop_count(&self) -> Option<u32> {
        None
    }

    /// Geometry, timing, disposal and blending of frame `index`,
    /// answered from the parsed headers without decoding pixels
    ///
    /// Still images report a single frame covering the whole canvas.
    ///
    /// # Errors
    /// [`DecodeErrors::OutOfRange`] if `index >= self.frame_count()`
    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors> {
        check_frame_index(index, self.frame_count())?;
        let (width, height) = self.size();

        Ok(FrameInfo {
            region: Rect::new(0, 0, width, height),
            ..FrameInfo::default()
        })
    }

    /// Decode and composite frame `index`
    ///
    /// # Errors
    /// - [`DecodeErrors::OutOfRange`] if `index >= self.frame_count()`
    /// - [`DecodeErrors::Malformed`], [`DecodeErrors::Truncated`], [`DecodeErrors::InvalidCode`]
    ///   for corrupt data
    /// - [`DecodeErrors::Unsupported`] for recognized but unimplemented features
    fn frame(&mut self, index: usize) -> Result<FrameDescriptor, DecodeErrors>;

    /// Metadata found while parsing the header
    fn metadata(&self) -> Option<&Metadata> {
        None
    }

    /// The embedded ICC profile, if any
    fn icc_data(&self) -> Result<Option<Vec<u8>>, DecodeErrors> {
        Ok(None)
    }
}

/// Return [`DecodeErrors::OutOfRange`] when `index` is not a valid frame
pub fn check_frame_index(index: usize, count: usize) -> Result<(), DecodeErrors> {
    if index >= count {
        return Err(DecodeErrors::OutOfRange { index, count });
    }
    Ok(())
}
