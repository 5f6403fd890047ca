/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Frame compositing for animated images
//!
//! Animated formats store frames that only cover part of the canvas and
//! that depend on what earlier frames left behind. [`AnimationState`]
//! owns the accumulation canvas and turns those partial frames into full
//! canvas bitmaps.
//!
//! Frames are composited strictly in order. Asking for a frame before the
//! last composited one resets the canvas and replays from frame 0, the cost
//! grows with the index but disposal never has to be undone.
use alloc::format;

use crate::bitmap::{Bitmap, Rect};
use crate::errors::DecodeErrors;
use crate::frame::{Disposal, FrameDescriptor, FrameInfo};
use crate::log::{debug, trace};
use crate::plugin::check_frame_index;

/// Where a decoder handle is in its life
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodeState {
    /// Nothing parsed yet
    Uninitialized,
    /// Headers parsed, no frame decoded
    HeaderParsed,
    /// Compositing the frame at this index
    Decoding(usize),
    /// The frame at this index is on the canvas
    FrameReady(usize),
    /// The last frame is on the canvas
    Exhausted,
    /// Compositing failed at this index
    Errored(usize)
}

/// The format specific half of compositing
///
/// Implementors know where frames live in the stream and how to decode
/// one frame's own pixels, [`AnimationState`] does everything else.
pub trait FrameSource {
    /// Number of frames available
    fn frame_count(&self) -> usize;

    /// Geometry, timing, disposal and blending of a frame
    fn frame_info(&self, index: usize) -> Result<FrameInfo, DecodeErrors>;

    /// Decode only the pixels of frame `index`, the returned bitmap
    /// must have the size of the frame's region
    fn decode_region(&mut self, index: usize) -> Result<Bitmap, DecodeErrors>;
}

/// Accumulation canvas and compositing state of one decoder handle
pub struct AnimationState {
    /// Allocated by the first composited frame
    canvas:    Option<Bitmap>,
    width:     usize,
    height:    usize,
    state:     DecodeState,
    /// Last composited frame and its info
    last:      Option<(usize, FrameInfo)>,
    /// Canvas before the last frame was drawn, kept when that
    /// frame asks to be disposed with `RestorePrevious`
    saved:     Option<Bitmap>,
    /// Frame index that failed and how
    error:     Option<(usize, DecodeErrors)>,
    /// Frames composited since creation, replays included
    composits: usize
}

impl AnimationState {
    /// Create the state for a canvas of the given size
    ///
    /// The canvas starts fully transparent. Nothing is allocated until
    /// the first frame is composited.
    pub fn new(width: usize, height: usize) -> AnimationState {
        AnimationState {
            canvas: None,
            width,
            height,
            state:     DecodeState::HeaderParsed,
            last:      None,
            saved:     None,
            error:     None,
            composits: 0
        }
    }

    pub const fn state(&self) -> DecodeState {
        self.state
    }

    /// Index of the frame currently on the canvas
    pub fn last_composited(&self) -> Option<usize> {
        self.last.map(|(index, _)| index)
    }

    /// Number of frames drawn onto the canvas so far, replays included
    pub const fn frames_composited(&self) -> usize {
        self.composits
    }

    /// True once a frame was composited and the canvas exists
    pub const fn has_canvas(&self) -> bool {
        self.canvas.is_some()
    }

    fn canvas_mut(&mut self) -> &mut Bitmap {
        let (width, height) = (self.width, self.height);
        self.canvas.get_or_insert_with(|| Bitmap::new(width, height))
    }

    /// Clear the canvas and forget every composited frame
    pub fn reset(&mut self) {
        if let Some(canvas) = &mut self.canvas {
            canvas.fill_rect(canvas.bounds(), [0; 4]);
        }
        self.last = None;
        self.saved = None;
        self.state = DecodeState::HeaderParsed;
    }

    /// Composite up to frame `index` and return a copy of the full canvas
    ///
    /// # Errors
    /// - [`DecodeErrors::OutOfRange`] for an index past the last frame
    /// - Whatever `source` returns while decoding a frame, an error at frame
    ///   `i` is returned again for every later request of an index `>= i`
    pub fn composite<S: FrameSource + ?Sized>(
        &mut self, source: &mut S, index: usize
    ) -> Result<FrameDescriptor, DecodeErrors> {
        let count = source.frame_count();
        check_frame_index(index, count)?;

        if let Some((failed, err)) = &self.error {
            if index >= *failed {
                return Err(err.clone());
            }
        }

        match self.last {
            Some((last, info)) if last == index => {
                return Ok(FrameDescriptor::from_info(self.canvas_mut().clone(), &info));
            }
            Some((last, _)) if index < last => {
                debug!("Replaying frames 0..={index}, canvas holds frame {last}");
                self.reset();
            }
            _ => ()
        }

        let start = self.last.map_or(0, |(last, _)| last + 1);

        for i in start..=index {
            self.state = DecodeState::Decoding(i);

            if let Err(err) = self.composite_one(source, i) {
                // the canvas is half updated, next request replays
                self.reset();
                self.state = DecodeState::Errored(i);
                self.error = Some((i, err.clone()));
                return Err(err);
            }
        }

        self.state = if index + 1 == count {
            DecodeState::Exhausted
        } else {
            DecodeState::FrameReady(index)
        };

        let info = self.last.map(|(_, info)| info).unwrap_or_default();

        Ok(FrameDescriptor::from_info(self.canvas_mut().clone(), &info))
    }

    fn composite_one<S: FrameSource + ?Sized>(
        &mut self, source: &mut S, index: usize
    ) -> Result<(), DecodeErrors> {
        let info = source.frame_info(index)?;

        if info.region.is_empty() {
            return Err(DecodeErrors::Malformed(format!(
                "Frame {index} has an empty region {:?}",
                info.region
            )));
        }
        let pixels = source.decode_region(index)?;

        if pixels.dimensions() != (info.region.width, info.region.height) {
            return Err(DecodeErrors::Malformed(format!(
                "Frame {index} decoded to {:?} but declares region {:?}",
                pixels.dimensions(),
                info.region
            )));
        }
        trace!(
            "Frame {index}: region {:?} blend {:?} disposal {:?}",
            info.region,
            info.blend,
            info.disposal
        );

        // dispose of the previous frame
        if let Some((_, previous)) = self.last {
            self.dispose(previous.region, previous.disposal);
        }

        if info.disposal == Disposal::RestorePrevious {
            self.saved = Some(self.canvas_mut().clone());
        }

        self.canvas_mut()
            .draw(&pixels, info.region.x, info.region.y, info.blend);

        self.last = Some((index, info));
        self.composits += 1;

        Ok(())
    }

    fn dispose(&mut self, region: Rect, disposal: Disposal) {
        match disposal {
            Disposal::None => (),
            Disposal::RestoreBackground => self.canvas_mut().fill_rect(region, [0; 4]),
            Disposal::RestorePrevious => match self.saved.take() {
                Some(saved) => self.canvas = Some(saved),
                None => self.canvas_mut().fill_rect(region, [0; 4])
            }
        }
    }
}
