/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Decoding the Quite Ok Image format
//!
//! [Format Specification](https://qoiformat.org/qoi-specification.pdf)
//!
//! # Example
//! ```no_run
//! use loupe_core::plugin::DecoderPlugin;
//! use loupe_qoi::QoiDecoder;
//!
//! let data = std::fs::read("image.qoi").unwrap();
//! let mut decoder = QoiDecoder::create(&data).unwrap();
//! let frame = decoder.frame(0).unwrap();
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
#![macro_use]
extern crate alloc;

pub use decoder::*;
pub use loupe_core;

mod constants;
mod decoder;
