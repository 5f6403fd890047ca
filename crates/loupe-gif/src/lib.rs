/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! A GIF decoder
//!
//! Decodes GIF87a and GIF89a images, animated or not. Frames are
//! composited onto a full canvas, every [`frame`](loupe_core::plugin::DecoderPlugin::frame)
//! call returns the whole image as it should be displayed at that point
//! of the animation.
//!
//! # Example
//! ```no_run
//! use loupe_core::plugin::DecoderPlugin;
//! use loupe_gif::GifDecoder;
//!
//! let data = std::fs::read("animation.gif").unwrap();
//! let mut decoder = GifDecoder::create(&data).unwrap();
//!
//! for i in 0..decoder.frame_count() {
//!     let frame = decoder.frame(i).unwrap();
//!     println!("frame {i} shows for {} ms", frame.duration);
//! }
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub use loupe_core;

pub use crate::decoder::{probe_gif, GifDecoder};

mod decoder;
mod enums;
mod frames;
