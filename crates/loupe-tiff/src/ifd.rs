/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Image file directories
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use loupe_core::bit_depth::ByteEndian;
use loupe_core::bytestream::ByteReader;
use loupe_core::errors::DecodeErrors;
use loupe_core::log::trace;
use loupe_core::options::DecoderOptions;

use crate::enums::FieldType;
use crate::tolerate;

/// One directory entry, with its values resolved to a slice of the file
#[derive(Copy, Clone, Debug)]
pub(crate) struct Entry<'a> {
    pub(crate) tag:   u16,
    pub(crate) kind:  FieldType,
    pub(crate) count: usize,
    pub(crate) data:  &'a [u8]
}

impl<'a> Entry<'a> {
    /// All values as unsigned integers, `None` for types that are not
    /// `BYTE`, `SHORT`, `LONG`, `UNDEFINED` or `IFD`
    pub(crate) fn values(&self, endian: ByteEndian) -> Option<Vec<u32>> {
        let values = match self.kind {
            FieldType::Byte | FieldType::Undefined => {
                self.data.iter().map(|x| u32::from(*x)).collect()
            }
            FieldType::Short => self
                .data
                .chunks_exact(2)
                .map(|x| {
                    let bytes = [x[0], x[1]];
                    u32::from(match endian {
                        ByteEndian::LE => u16::from_le_bytes(bytes),
                        ByteEndian::BE => u16::from_be_bytes(bytes)
                    })
                })
                .collect(),
            FieldType::Long | FieldType::Ifd => self
                .data
                .chunks_exact(4)
                .map(|x| {
                    let bytes = [x[0], x[1], x[2], x[3]];
                    match endian {
                        ByteEndian::LE => u32::from_le_bytes(bytes),
                        ByteEndian::BE => u32::from_be_bytes(bytes)
                    }
                })
                .collect(),
            _ => return None
        };
        Some(values)
    }

    /// Text up to the first null byte
    pub(crate) fn ascii(&self) -> String {
        self.data
            .iter()
            .take_while(|x| **x != 0)
            .map(|x| char::from(*x))
            .collect()
    }
}

/// The entries of one IFD, in file order
pub(crate) struct Directory<'a> {
    endian:  ByteEndian,
    entries: Vec<Entry<'a>>
}

impl<'a> Directory<'a> {
    /// First entry with `tag`
    pub(crate) fn get(&self, tag: u16) -> Option<&Entry<'a>> {
        self.entries.iter().find(|x| x.tag == tag)
    }

    /// Integer values of `tag`, `None` if absent
    ///
    /// # Errors
    /// A present tag of a non integer type is [`DecodeErrors::Malformed`]
    pub(crate) fn values(&self, tag: u16) -> Result<Option<Vec<u32>>, DecodeErrors> {
        let Some(entry) = self.get(tag) else {
            return Ok(None);
        };
        match entry.values(self.endian) {
            Some(values) if !values.is_empty() => Ok(Some(values)),
            Some(_) => Err(DecodeErrors::Malformed(format!("Tag {tag} has no values"))),
            None => Err(DecodeErrors::Malformed(format!(
                "Tag {tag} has type {:?}, expected an integer type",
                entry.kind
            )))
        }
    }

    /// First integer value of `tag`
    pub(crate) fn value(&self, tag: u16) -> Result<Option<u32>, DecodeErrors> {
        Ok(self.values(tag)?.and_then(|x| x.first().copied()))
    }

    /// First integer value of `tag`, `default` when absent
    pub(crate) fn value_or(&self, tag: u16, default: u32) -> Result<u32, DecodeErrors> {
        Ok(self.value(tag)?.unwrap_or(default))
    }

    /// First integer value of a tag the image cannot do without
    pub(crate) fn required(&self, tag: u16, name: &str) -> Result<u32, DecodeErrors> {
        self.value(tag)?
            .ok_or_else(|| DecodeErrors::Malformed(format!("Missing required tag {name}")))
    }
}

/// Read the directory starting at `offset`
///
/// Entries with an unknown field type, or whose values lie outside the
/// file, are skipped. The offset of a following directory is ignored.
pub(crate) fn read_directory<'a>(
    bytes: &'a [u8], offset: usize, endian: ByteEndian, options: &DecoderOptions
) -> Result<Directory<'a>, DecodeErrors> {
    let mut stream = ByteReader::new(bytes);
    stream.set_position(offset)?;

    let num_entries = usize::from(stream.get_u16_err(endian)?);
    let mut entries = Vec::with_capacity(num_entries);

    trace!("IFD at {offset} with {num_entries} entries");

    for _ in 0..num_entries {
        let tag = stream.get_u16_err(endian)?;
        let kind = stream.get_u16_err(endian)?;
        let count = stream.get_u32_err(endian)? as usize;
        let value = stream.get_slice(4)?;

        let Some(field_type) = FieldType::from_int(kind) else {
            tolerate(options, format!("Tag {tag} has invalid field type {kind}, skipping it"))?;
            continue;
        };
        let Some(size) = count.checked_mul(field_type.size()) else {
            tolerate(options, format!("Tag {tag} declares {count} values, skipping it"))?;
            continue;
        };
        let data = if size <= 4 {
            &value[..size]
        } else {
            let position = ByteReader::new(value).get_u32_err(endian)? as usize;

            match ByteReader::new(bytes).peek_at(position, size) {
                Ok(data) => data,
                Err(_) => {
                    tolerate(
                        options,
                        format!("Values of tag {tag} lie outside the file, skipping it")
                    )?;
                    continue;
                }
            }
        };
        trace!("Tag {tag}, {field_type:?} x {count}");

        entries.push(Entry {
            tag,
            kind: field_type,
            count,
            data
        });
    }
    if stream.get_u32_err(endian).is_ok_and(|next| next != 0) {
        trace!("Ignoring the directories after the first");
    }
    Ok(Directory { endian, entries })
}
