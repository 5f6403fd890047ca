/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image metadata
//!
//! Decoders collect what they find into an opaque [`Metadata`] bag
//! tagged with the container it came from. Interpreting it is left to
//! the application, the one exception being the exif orientation which
//! can be read when the `metadata` feature is enabled.
use alloc::string::String;
use alloc::vec::Vec;

/// Where a metadata bag was read from
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MetadataFormat {
    /// A raw exif payload, e.g. a PNG `eXIf` chunk
    Exif,
    /// Tags of a TIFF image file directory
    Tiff,
    /// PNG text chunks
    Png,
    /// GIF comment or application extensions
    Gif,
    /// WebP `EXIF` and `XMP ` chunks
    Webp
}

/// Opaque, format tagged metadata
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Metadata {
    format:      MetadataFormat,
    entries:     Vec<(String, String)>,
    exif:        Option<Vec<u8>>,
    orientation: Option<u16>
}

impl Metadata {
    pub fn new(format: MetadataFormat) -> Metadata {
        Metadata {
            format,
            entries: Vec::new(),
            exif: None,
            orientation: None
        }
    }

    /// The container this metadata was read from
    pub const fn format(&self) -> MetadataFormat {
        self.format
    }

    pub fn add_entry(&mut self, key: String, value: String) {
        self.entries.push((key, value));
    }

    /// All key value pairs in the order they were found
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Store a raw exif payload
    ///
    /// Data should point to the tiff header, an `Exif\0\0`
    /// prefix is removed if present
    pub fn set_exif(&mut self, data: &[u8]) {
        let data = data.strip_prefix(b"Exif\0\0").unwrap_or(data);
        self.exif = Some(data.to_vec());
    }

    /// Raw exif bytes, if any
    pub fn exif(&self) -> Option<&[u8]> {
        self.exif.as_deref()
    }

    /// Record an orientation read directly from the container
    pub fn set_orientation(&mut self, orientation: u16) {
        self.orientation = Some(orientation);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.exif.is_none() && self.orientation.is_none()
    }

    /// The exif/tiff orientation value (1 to 8)
    ///
    /// Orientation set by the container wins over one stored in the exif
    /// payload. Parsing the payload requires the `metadata` feature,
    /// without it only the container value is reported
    pub fn orientation(&self) -> Option<u16> {
        if self.orientation.is_some() {
            return self.orientation;
        }
        #[cfg(feature = "metadata")]
        {
            if let Some(raw) = &self.exif {
                return parse_exif_orientation(raw);
            }
        }
        None
    }
}

#[cfg(feature = "metadata")]
fn parse_exif_orientation(raw: &[u8]) -> Option<u16> {
    use crate::log::warn;

    match exif::Reader::new().read_raw(raw.to_vec()) {
        Ok(fields) => fields
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .and_then(|value| u16::try_from(value).ok()),
        Err(err) => {
            warn!("Error while parsing exif chunk {:?}", err);
            None
        }
    }
}
