/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Global Decoder options
use alloc::format;

use crate::errors::DecodeErrors;

/// Decoder options
///
/// Not all options are respected by all decoders
#[derive(Debug, Copy, Clone)]
pub struct DecoderOptions {
    /// Maximum width for which decoders will
    /// not try to decode images larger than
    /// the specified width.
    ///
    /// - Default value: 16384
    /// - Respected by: `all decoders`
    max_width:     usize,
    /// Maximum height for which decoders will not
    /// try to decode images larger than the
    /// specified height
    ///
    /// - Default value: 16384
    /// - Respected by: `all decoders`
    max_height:    usize,
    /// Maximum number of frames an animated image may declare
    ///
    /// - Default value: 65536
    /// - Respected by: `gif`, `png`
    max_frames:    usize,
    /// Maximum size for deflate.
    /// Respected by all decoders that use inflate/deflate
    deflate_limit: usize,
    /// Reject inputs other decoders tolerate, e.g. bad checksums
    /// or palettes larger than the bit depth allows
    strict_mode:   bool
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            max_width:     1 << 14,
            max_height:    1 << 14,
            max_frames:    1 << 16,
            deflate_limit: 1 << 30,
            strict_mode:   false
        }
    }
}

/// Global options respected by all decoders
impl DecoderOptions {
    /// Get maximum width configured for which the decoder
    /// should not try to decode images greater than this width
    pub const fn get_max_width(&self) -> usize {
        self.max_width
    }
    /// Get maximum height configured for which the decoder should
    /// not try to decode images greater than this height
    pub const fn get_max_height(&self) -> usize {
        self.max_height
    }
    /// Return true whether the decoder should be in strict mode
    /// And reject most errors
    pub const fn get_strict_mode(&self) -> bool {
        self.strict_mode
    }
    /// Get the maximum number of frames an image may declare
    pub const fn get_max_frames(&self) -> usize {
        self.max_frames
    }
    /// Set maximum width for which the decoder should not try
    /// decoding images greater than that width
    ///
    /// # Arguments
    ///
    /// * `width`:  The maximum width allowed
    #[must_use]
    pub fn set_max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }
    /// Set maximum height for which the decoder should not try
    /// decoding images greater than that height
    ///
    /// # Arguments
    ///
    /// * `height`: The maximum height allowed
    #[must_use]
    pub fn set_max_height(mut self, height: usize) -> Self {
        self.max_height = height;
        self
    }
    /// Set whether the decoder should be in standards conforming/
    /// strict mode
    ///
    /// This reduces the error tolerance level for the decoders and invalid
    /// samples will be rejected by the decoder
    #[must_use]
    pub fn set_strict_mode(mut self, yes: bool) -> Self {
        self.strict_mode = yes;
        self
    }
    /// Set the maximum number of frames an animated image may declare
    #[must_use]
    pub fn set_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = frames;
        self
    }
    /// Check that `width` x `height` is non-zero and within the configured limits
    pub fn check_dimensions(
        &self, width: usize, height: usize
    ) -> Result<(), DecodeErrors> {
        if width == 0 || height == 0 {
            return Err(DecodeErrors::Malformed(format!(
                "Zero sized image, width {width} height {height}"
            )));
        }
        if width > self.max_width {
            return Err(DecodeErrors::Malformed(format!(
                "Image width {width} greater than max configured width {}",
                self.max_width
            )));
        }
        if height > self.max_height {
            return Err(DecodeErrors::Malformed(format!(
                "Image height {height} greater than max configured height {}",
                self.max_height
            )));
        }
        Ok(())
    }
}

/// Inflate specific options
impl DecoderOptions {
    /// Whether the inflate decoder should confirm
    /// adler checksums
    pub const fn inflate_get_confirm_adler(&self) -> bool {
        self.strict_mode
    }
    /// Get default inflate limit for which the decoder
    /// will not try to decompress further
    pub const fn inflate_get_limit(&self) -> usize {
        self.deflate_limit
    }
    /// Set the default inflate limit for which decompressors
    /// relying on inflate won't surpass this limit
    #[must_use]
    pub fn inflate_set_limit(mut self, limit: usize) -> Self {
        self.deflate_limit = limit;
        self
    }
    /// Whether the png decoder should confirm crc 32 checksums
    pub const fn png_get_confirm_crc(&self) -> bool {
        self.strict_mode
    }
}
