/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use std::ffi::OsStr;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;

use log::{debug, info, warn};
use loupe_core::errors::DecodeErrors;
use loupe_core::frame::FrameInfo;
use loupe_core::plugin::DecoderPlugin;
use loupe_image::{ImageDecoder, ImageFormat};
use xxhash_rust::xxh3::xxh3_64;

use crate::cmd_parsers::global_options::CmdOptions;

/// Why a file could not be probed
pub enum ProbeErrors {
    Io(std::io::Error),
    Decode(DecodeErrors)
}

impl Debug for ProbeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeErrors::Io(err) => write!(f, "Could not read file: {err:?}"),
            ProbeErrors::Decode(err) => write!(f, "{err:?}")
        }
    }
}

impl Display for ProbeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeErrors::Io(err) => write!(f, "Could not read file: {err}"),
            ProbeErrors::Decode(err) => write!(f, "{err}")
        }
    }
}

impl From<std::io::Error> for ProbeErrors {
    fn from(err: std::io::Error) -> Self {
        ProbeErrors::Io(err)
    }
}

impl From<DecodeErrors> for ProbeErrors {
    fn from(err: DecodeErrors) -> Self {
        ProbeErrors::Decode(err)
    }
}

pub struct FrameReport {
    pub index: usize,
    pub info:  FrameInfo,
    /// xxh3 of the composited canvas, present when frames were decoded
    pub hash:  Option<u64>
}

/// Everything printed about one file
pub struct ImageReport {
    pub file:        String,
    pub format:      ImageFormat,
    pub width:       usize,
    pub height:      usize,
    pub animated:    bool,
    pub loop_count:  Option<u32>,
    /// Length of the embedded ICC profile
    pub icc_size:    Option<usize>,
    pub orientation: Option<u16>,
    pub frames:      Vec<FrameReport>
}

/// Read and probe one file
pub fn probe_file(path: &Path, options: &CmdOptions) -> Result<ImageReport, ProbeErrors> {
    let data = std::fs::read(path)?;
    info!("Read {} bytes from {}", data.len(), path.display());

    let report = probe_bytes(&path.display().to_string(), &data, options)?;

    let by_extension = path
        .extension()
        .and_then(OsStr::to_str)
        .and_then(ImageFormat::from_extension);

    if let Some(expected) = by_extension {
        if expected != report.format {
            warn!(
                "{} has the extension of a {expected} file but holds a {} image",
                path.display(),
                report.format
            );
        }
    }
    Ok(report)
}

/// Probe an image already in memory
///
/// Frame information comes from the headers alone unless
/// [`CmdOptions::decode`] is set, then every frame is also decoded
/// in order and its canvas hashed.
pub fn probe_bytes(
    name: &str, data: &[u8], options: &CmdOptions
) -> Result<ImageReport, DecodeErrors> {
    let mut decoder = ImageDecoder::new_with_options(data, options.decoder)?;
    let (width, height) = decoder.size();

    debug!("{name}: {} image of {width}x{height}", decoder.format());

    let icc_size = match decoder.icc_data() {
        Ok(profile) => profile.map(|profile| profile.len()),
        Err(err) => {
            warn!("{name}: could not read ICC profile, {err}");
            None
        }
    };
    let orientation = decoder
        .metadata()
        .and_then(|metadata| metadata.orientation());

    let mut frames = Vec::with_capacity(decoder.frame_count());

    for index in 0..decoder.frame_count() {
        let info = decoder.frame_info(index)?;
        let hash = if options.decode {
            let frame = decoder.frame(index)?;
            Some(xxh3_64(frame.bitmap.pixels()))
        } else {
            None
        };
        frames.push(FrameReport { index, info, hash });
    }

    Ok(ImageReport {
        file: name.to_string(),
        format: decoder.format(),
        width,
        height,
        animated: decoder.is_animated(),
        loop_count: decoder.loop_count(),
        icc_size,
        orientation,
        frames
    })
}

impl Display for FrameReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let region = self.info.region;
        write!(
            f,
            "frame {}: {}x{} at ({}, {}), {} ms, disposal {:?}, blend {:?}",
            self.index,
            region.width,
            region.height,
            region.x,
            region.y,
            self.info.duration,
            self.info.disposal,
            self.info.blend
        )?;
        if let Some(hash) = self.hash {
            write!(f, ", xxh3 {hash:016x}")?;
        }
        Ok(())
    }
}

impl Display for ImageReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.file)?;
        writeln!(f, "  format:      {}", self.format)?;
        writeln!(f, "  size:        {}x{}", self.width, self.height)?;
        writeln!(f, "  frames:      {}", self.frames.len())?;
        writeln!(f, "  animated:    {}", self.animated)?;

        match self.loop_count {
            Some(0) => writeln!(f, "  loops:       forever")?,
            Some(loops) => writeln!(f, "  loops:       {loops}")?,
            None => writeln!(f, "  loops:       -")?
        }
        match self.icc_size {
            Some(size) => writeln!(f, "  icc profile: {size} bytes")?,
            None => writeln!(f, "  icc profile: none")?
        }
        if let Some(orientation) = self.orientation {
            writeln!(f, "  orientation: {orientation}")?;
        }
        for frame in &self.frames {
            writeln!(f, "  {frame}")?;
        }
        Ok(())
    }
}
