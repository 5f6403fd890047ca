/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! One entry point for every loupe decoder
//!
//! [`guess_format`] tells formats apart by their magic bytes and
//! [`ImageDecoder`] wraps the matching format decoder behind the
//! common [`DecoderPlugin`](loupe_core::plugin::DecoderPlugin) interface.
//!
//! # Example
//! ```no_run
//! use loupe_core::plugin::DecoderPlugin;
//! use loupe_image::ImageDecoder;
//!
//! let data = std::fs::read("animation.gif").unwrap();
//! let mut decoder = ImageDecoder::new(&data).unwrap();
//!
//! println!("{} image, {} frames", decoder.format(), decoder.frame_count());
//! for i in 0..decoder.frame_count() {
//!     let frame = decoder.frame(i).unwrap();
//!     println!("frame {i} shows for {} ms", frame.duration);
//! }
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub use loupe_bmp;
pub use loupe_core;
pub use loupe_gif;
pub use loupe_ico;
pub use loupe_png;
pub use loupe_qoi;
pub use loupe_tiff;
pub use loupe_webp;

pub use crate::codecs::{guess_format, ImageFormat};
pub use crate::decoder::ImageDecoder;

mod codecs;
mod decoder;
