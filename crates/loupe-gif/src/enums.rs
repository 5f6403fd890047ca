/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */
use loupe_core::frame::Disposal;

/// Different GIF disposal methods
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum DisposalMethod {
    None = 0,
    InPlace = 1,
    Background = 2,
    Restore = 3
}

impl DisposalMethod {
    /// Read the method from the packed field of a graphic control extension
    pub fn from_flags(flags: u8) -> DisposalMethod {
        match (flags >> 2) & 7 {
            1 => DisposalMethod::InPlace,
            2 => DisposalMethod::Background,
            3 => DisposalMethod::Restore,
            _ => DisposalMethod::None
        }
    }

    pub const fn to_disposal(self) -> Disposal {
        match self {
            DisposalMethod::None | DisposalMethod::InPlace => Disposal::None,
            DisposalMethod::Background => Disposal::RestoreBackground,
            DisposalMethod::Restore => Disposal::RestorePrevious
        }
    }
}

/// Block introducers
pub(crate) const EXTENSION_INTRODUCER: u8 = 0x21;
pub(crate) const IMAGE_SEPARATOR: u8 = 0x2C;
pub(crate) const TRAILER: u8 = 0x3B;

/// Extension labels
pub(crate) const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
pub(crate) const COMMENT_LABEL: u8 = 0xFE;
pub(crate) const APPLICATION_LABEL: u8 = 0xFF;
