/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! A WebP decoder
//!
//! Decodes lossless (VP8L) WebP images, still or animated, in the simple
//! and the extended (VP8X) container. Lossy VP8 image data is recognized,
//! its dimensions and alpha plane are available, but decoding its pixels
//! reports [`DecodeErrors::Unsupported`](loupe_core::errors::DecodeErrors::Unsupported).
//!
//! # Example
//! ```no_run
//! use loupe_core::plugin::DecoderPlugin;
//! use loupe_webp::WebpDecoder;
//!
//! let data = std::fs::read("animation.webp").unwrap();
//! let mut decoder = WebpDecoder::create(&data).unwrap();
//!
//! for i in 0..decoder.frame_count() {
//!     let frame = decoder.frame(i).unwrap();
//!     println!("frame {i} shows for {} ms", frame.duration);
//! }
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub use loupe_core;

pub use crate::decoder::{probe_webp, WebpDecoder};

mod alpha;
mod decoder;
mod frames;
mod lossless;
mod transform;
