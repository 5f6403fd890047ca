/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! A baseline TIFF decoder
//!
//! Decodes the first image of a file, stored in strips or tiles,
//! uncompressed or compressed with CCITT fax codes, LZW, deflate or
//! PackBits. Bilevel, greyscale, palette, RGB, CMYK and unsubsampled
//! YCbCr images at 1 to 16 bits per sample are supported, everything
//! decodes to 8 bit RGBA.
//!
//! Files using features outside of that, like JPEG compression or
//! planar storage, still parse, so their size and metadata can be
//! queried, but decoding pixels returns
//! [`DecodeErrors::Unsupported`](loupe_core::errors::DecodeErrors::Unsupported).
//!
//! # Example
//! ```no_run
//! use loupe_core::plugin::DecoderPlugin;
//! use loupe_tiff::TiffDecoder;
//!
//! let data = std::fs::read("scan.tiff").unwrap();
//! let mut decoder = TiffDecoder::create(&data).unwrap();
//!
//! println!("{:?} compressed", decoder.compression());
//! let pixels = decoder.frame(0).unwrap().bitmap.into_raw();
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

use alloc::string::String;

pub use loupe_core;
use loupe_core::errors::DecodeErrors;
use loupe_core::log::warn;
use loupe_core::options::DecoderOptions;

pub use crate::decoder::{probe_tiff, TiffDecoder};
pub use crate::enums::{ExtraSample, Photometric, TiffCompression};

mod convert;
mod decoder;
mod decompress;
mod enums;
mod ifd;
mod tags;

/// Reject in strict mode, warn otherwise
pub(crate) fn tolerate(options: &DecoderOptions, msg: String) -> Result<(), DecodeErrors> {
    if options.get_strict_mode() {
        return Err(DecodeErrors::Malformed(msg));
    }
    warn!("{}", msg);
    Ok(())
}
