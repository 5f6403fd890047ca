/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Bit level readers and entropy decoders
//!
//! This crate holds the primitives shared by the format decoders
//!
//! - [`BitReader`](bitreader::BitReader), a bounds checked bit reader for both bit orders
//! - [`HuffmanTable`](huffman::HuffmanTable), canonical and explicit prefix code tables
//! - [`LzwDecoder`](lzw::LzwDecoder), variable width LZW as used by GIF and TIFF
//! - [`CcittDecoder`](ccitt::CcittDecoder), one and two dimensional fax run-length decoding
//!
//! Every primitive reports a read past the end of its input as
//! [`DecodeErrors::Truncated`](loupe_core::errors::DecodeErrors::Truncated)
//! and never substitutes a default value for a corrupt code.
#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod bitreader;
pub mod ccitt;
pub mod huffman;
pub mod lzw;

pub use bitreader::{BitOrder, BitReader};
pub use huffman::HuffmanTable;
pub use lzw::{LzwDecoder, LzwOptions};

#[cfg(test)]
pub(crate) mod test_utils;
