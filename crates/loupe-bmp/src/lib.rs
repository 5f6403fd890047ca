/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! A BMP decoder
//!
//! # Supported formats
//! - OS/2 core headers and Windows info headers up to version 5
//! - Paletted images (1 bit, 2 bits, 4 bits and 8 bits)
//! - RLE (4 bit and 8 bit), including delta escapes
//! - Masked images (16 bit and 32 bit formats), with default masks or
//!   `BITFIELDS`/`ALPHABITFIELDS`
//! - 24 bit BGR
//! - Headerless bitmaps with an AND mask, as stored inside ICO and CUR files
//!
//! # Unsupported formats
//! - Embedded PNG and JPEGs
//! - OS/2 Huffman and RLE24 compression
//!
//! # Example
//! ```no_run
//! use loupe_bmp::BmpDecoder;
//! use loupe_core::plugin::DecoderPlugin;
//!
//! let data = std::fs::read("image.bmp").unwrap();
//! let mut decoder = BmpDecoder::create(&data).unwrap();
//! let frame = decoder.frame(0).unwrap();
//! println!("{:?}", frame.bitmap.dimensions());
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub use loupe_core;

pub use crate::common::BmpCompression;
pub use crate::decoder::{probe_bmp, BmpDecoder};

mod common;
mod decoder;
mod utils;
