/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Pixel reconstruction
//!
//! Routines that turn decoded samples into RGBA8 pixels
//!
//! - [`SampleBuffer`](sample::SampleBuffer), unpacking of 1 to 16 bit samples
//! - Predictor undoing, TIFF horizontal differencing and PNG row filters
//! - Colour conversion from YCbCr, CMYK and grayscale
//! - Palette expansion
//! - Alpha premultiplication
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod alpha;
pub mod color_convert;
pub mod palette;
pub mod predictor;
pub mod sample;

pub use palette::Palette;
pub use sample::SampleBuffer;
