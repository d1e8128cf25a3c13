/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Recognizers for the application segments that carry information the decoder uses.

use byteorder::{BigEndian, ByteOrder};

use crate::helpers::buffer_prefix_matches_marker;

pub const JFIF_SIGNATURE: &[u8] = b"JFIF\0";
pub const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
pub const ICC_SIGNATURE: &[u8] = b"ICC_PROFILE\0";
pub const ADOBE_SIGNATURE: &[u8] = b"Adobe";

/// signature, version, units and both densities
pub const JFIF_MARKER_LENGTH: usize = 13;

/// signature plus chunk sequence number and chunk count
pub const ICC_HEADER_LENGTH: usize = 14;

/// signature, version, two flag words and the color transform
pub const ADOBE_MARKER_LENGTH: usize = 12;

/// Adobe color transform codes
pub const ADOBE_TRANSFORM_UNKNOWN: u8 = 0;
pub const ADOBE_TRANSFORM_YCBCR: u8 = 1;
pub const ADOBE_TRANSFORM_YCCK: u8 = 2;

/// The JFIF APP0 segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JfifMarker {
    pub major_version: u8,
    pub minor_version: u8,
    /// 0 = no units (aspect ratio only), 1 = dots per inch, 2 = dots per cm
    pub density_units: u8,
    pub x_density: u16,
    pub y_density: u16,
}

impl JfifMarker {
    /// Parses the start of an APP0 payload. A JFIF signature without the rest of the
    /// fields is still recognized, but carries no density.
    pub fn try_parse(bytes: &[u8]) -> Option<JfifMarker> {
        if !buffer_prefix_matches_marker(bytes, JFIF_SIGNATURE) {
            return None;
        }

        if bytes.len() < JFIF_MARKER_LENGTH {
            return Some(JfifMarker::default());
        }

        Some(JfifMarker {
            major_version: bytes[5],
            minor_version: bytes[6],
            density_units: bytes[7],
            x_density: BigEndian::read_u16(&bytes[8..10]),
            y_density: BigEndian::read_u16(&bytes[10..12]),
        })
    }
}

/// The Adobe APP14 segment, which tells how 3 and 4 component images are encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdobeMarker {
    pub dct_encode_version: u16,
    pub app14_flags0: u16,
    pub app14_flags1: u16,
    pub color_transform: u8,
}

impl AdobeMarker {
    pub fn try_parse(bytes: &[u8]) -> Option<AdobeMarker> {
        if bytes.len() < ADOBE_MARKER_LENGTH
            || !buffer_prefix_matches_marker(bytes, ADOBE_SIGNATURE)
        {
            return None;
        }

        Some(AdobeMarker {
            dct_encode_version: BigEndian::read_u16(&bytes[5..7]),
            app14_flags0: BigEndian::read_u16(&bytes[7..9]),
            app14_flags1: BigEndian::read_u16(&bytes[9..11]),
            color_transform: bytes[11],
        })
    }
}

pub fn is_exif(bytes: &[u8]) -> bool {
    buffer_prefix_matches_marker(bytes, EXIF_SIGNATURE)
}

pub fn is_icc(bytes: &[u8]) -> bool {
    bytes.len() >= ICC_HEADER_LENGTH && buffer_prefix_matches_marker(bytes, ICC_SIGNATURE)
}
