/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
//! An ICO and CUR decoder
//!
//! Decodes the largest image of an icon or cursor file. Images stored
//! as PNG go through [`loupe_png`], bitmaps through [`loupe_bmp`] which
//! also applies their AND mask.
//!
//! # Example
//! ```no_run
//! use loupe_core::plugin::DecoderPlugin;
//! use loupe_ico::IcoDecoder;
//!
//! let data = std::fs::read("favicon.ico").unwrap();
//! let mut decoder = IcoDecoder::create(&data).unwrap();
//!
//! for entry in decoder.entries() {
//!     println!("{}x{}", entry.width, entry.height);
//! }
//! let bitmap = decoder.frame(0).unwrap().bitmap;
//! ```
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub use loupe_core;

pub use crate::decoder::{probe_ico, IconEntry, IconKind, IcoDecoder};

mod decoder;
