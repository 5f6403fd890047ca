/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Errors returned by every decoder
use alloc::string::{String, ToString};
use core::fmt::{Debug, Display, Formatter};

/// Possible errors that may occur during decoding
///
/// The same type is used by the bitstream primitives and the
/// format plugins, a primitive failure travels up unchanged
/// through the `frame` call that triggered it.
#[derive(Clone, Eq, PartialEq)]
pub enum DecodeErrors {
    /// The input ended before a unit (byte, code, header field)
    /// could be read completely
    Truncated,
    /// A code lookup found no match, or an LZW code referenced
    /// an entry that was never defined
    InvalidCode(&'static str),
    /// A structural contradiction in the input,
    /// e.g. a zero dimension or a row wider than declared
    Malformed(String),
    /// A recognized feature combination the decoder does not implement
    Unsupported(String),
    /// A frame index beyond the frame count was requested
    OutOfRange { index: usize, count: usize }
}

impl DecodeErrors {
    /// Create a [`DecodeErrors::Unsupported`] from a static message
    pub fn unsupported(msg: &str) -> DecodeErrors {
        DecodeErrors::Unsupported(msg.to_string())
    }

    /// Turn a [`DecodeErrors::Truncated`] into a [`DecodeErrors::Malformed`]
    ///
    /// A header that ends early leaves the image without the structure
    /// needed to create a decoder, plugins map errors from their header
    /// parsers through this.
    pub fn in_header(self) -> DecodeErrors {
        match self {
            DecodeErrors::Truncated => DecodeErrors::Malformed("Truncated header".to_string()),
            other => other
        }
    }
}

impl Debug for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated => {
                writeln!(f, "Truncated input, no more bytes to read")
            }
            Self::InvalidCode(context) => {
                writeln!(f, "Invalid code in {context}")
            }
            Self::Malformed(reason) => {
                writeln!(f, "Malformed image: {reason}")
            }
            Self::Unsupported(feature) => {
                writeln!(f, "Unsupported feature: {feature}")
            }
            Self::OutOfRange { index, count } => {
                writeln!(
                    f,
                    "Frame index {index} out of range, image has {count} frame(s)"
                )
            }
        }
    }
}

impl Display for DecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeErrors {}

impl From<&'static str> for DecodeErrors {
    fn from(value: &'static str) -> Self {
        DecodeErrors::Malformed(value.to_string())
    }
}

impl From<String> for DecodeErrors {
    fn from(value: String) -> Self {
        DecodeErrors::Malformed(value)
    }
}
