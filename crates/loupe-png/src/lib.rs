/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! A PNG and APNG decoder
//!
//! Supports every colour type and bit depth, Adam7 interlacing and
//! animated PNGs. All images decode to 8 bit RGBA, 16 bit samples are
//! scaled down.
//!
//! Animated images composite their frames onto the full canvas, for
//! an APNG whose default image is not part of the animation
//! [`frame_count`](loupe_core::plugin::DecoderPlugin::frame_count) only
//! counts the animation frames.
//!
//! # Example
//! ```no_run
//! use loupe_core::options::DecoderOptions;
//! use loupe_core::plugin::DecoderPlugin;
//! use loupe_png::PngDecoder;
//!
//! let data = std::fs::read("image.png").unwrap();
//! // strict mode also confirms chunk checksums
//! let options = DecoderOptions::default().set_strict_mode(true);
//! let mut decoder = PngDecoder::create_with_options(&data, options).unwrap();
//!
//! let (width, height) = decoder.size();
//! let pixels = decoder.frame(0).unwrap().bitmap.into_raw();
//! assert_eq!(pixels.len(), width * height * 4);
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub use loupe_core;

pub use crate::decoder::{probe_png, PngDecoder};
pub use crate::enums::{InterlaceMethod, PngColor};

mod constants;
#[cfg(feature = "crc")]
mod crc;
mod decoder;
mod enums;
mod frames;
mod headers;
mod scanlines;
