/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Core routines shared by all loupe decoders
//!
//! This crate provides the pieces every format plugin needs
//!
//! - A bounds checked byte reader with endian aware reads
//! - The error taxonomy returned by every decoder
//! - Decoder options
//! - The [`Bitmap`](bitmap::Bitmap) output type and frame descriptors
//! - The [`DecoderPlugin`](plugin::DecoderPlugin) contract
//! - An animation compositor shared by animated formats
//!
//! This library is `#[no_std]` with `alloc` needed for `Vec`
//!
//! # Features
//!  - `std`: Implements `std::error::Error` for the error type
//!  - `log`: Route the [`log`] macros to the `log` crate, they are no-ops otherwise
//!  - `metadata`: Parse exif payloads to expose image orientation
#![cfg_attr(not(feature = "std"), no_std)]
#![macro_use]
extern crate alloc;

pub mod animation;
pub mod bit_depth;
pub mod bitmap;
pub mod bytestream;
pub mod colorspace;
pub mod errors;
pub mod frame;
pub mod log;
pub mod metadata;
pub mod options;
pub mod plugin;
