/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::consts::DEFAULT_RESOLUTION;

const TIFF_TAG_X_RESOLUTION: u16 = 0x011A;
const TIFF_TAG_Y_RESOLUTION: u16 = 0x011B;
const TIFF_TYPE_RATIONAL: u16 = 5;

/// Metadata carried by the JPEG next to the pixels. The EXIF and ICC blobs are kept
/// as opaque bytes, only the resolution is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    pub horizontal_resolution: f64,
    pub vertical_resolution: f64,

    /// the EXIF payload after the `Exif\0\0` signature (TIFF header onwards)
    pub exif_profile: Option<Vec<u8>>,

    /// the ICC profile, concatenated over all APP2 chunks in stream order
    pub icc_profile: Option<Vec<u8>>,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        ImageMetadata {
            horizontal_resolution: DEFAULT_RESOLUTION,
            vertical_resolution: DEFAULT_RESOLUTION,
            exif_profile: None,
            icc_profile: None,
        }
    }
}

/// Result of identifying an image without decoding the pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub bits_per_pixel: u32,
    pub width: u32,
    pub height: u32,
    pub metadata: ImageMetadata,
}

/// Reads the XResolution and YResolution rational tags from IFD0 of the TIFF structure
/// inside an EXIF blob. Returns None if the blob is malformed or either tag is missing.
pub fn read_exif_resolution(exif: &[u8]) -> Option<(f64, f64)> {
    if exif.len() < 8 {
        return None;
    }

    match &exif[0..2] {
        b"II" => read_ifd0_resolution::<LittleEndian>(exif),
        b"MM" => read_ifd0_resolution::<BigEndian>(exif),
        _ => None,
    }
}

fn read_ifd0_resolution<B: ByteOrder>(tiff: &[u8]) -> Option<(f64, f64)> {
    if B::read_u16(&tiff[2..4]) != 42 {
        return None;
    }

    let ifd_offset = B::read_u32(&tiff[4..8]) as usize;
    let entry_count = usize::from(B::read_u16(tiff.get(ifd_offset..ifd_offset + 2)?));

    let mut x_resolution = None;
    let mut y_resolution = None;

    for i in 0..entry_count {
        let start = ifd_offset + 2 + i * 12;
        let entry = tiff.get(start..start + 12)?;

        let tag = B::read_u16(&entry[0..2]);
        if tag != TIFF_TAG_X_RESOLUTION && tag != TIFF_TAG_Y_RESOLUTION {
            continue;
        }

        if B::read_u16(&entry[2..4]) != TIFF_TYPE_RATIONAL {
            continue;
        }

        let value_offset = B::read_u32(&entry[8..12]) as usize;
        let rational = tiff.get(value_offset..value_offset + 8)?;
        let numerator = B::read_u32(&rational[0..4]);
        let denominator = B::read_u32(&rational[4..8]);

        let value = if denominator == 0 {
            0.0
        } else {
            f64::from(numerator) / f64::from(denominator)
        };

        if tag == TIFF_TAG_X_RESOLUTION {
            x_resolution = Some(value);
        } else {
            y_resolution = Some(value);
        }
    }

    Some((x_resolution?, y_resolution?))
}

#[cfg(test)]
pub(crate) fn build_exif_with_resolution(x: (u32, u32), y: (u32, u32)) -> Vec<u8> {
    use byteorder::WriteBytesExt;

    // big endian TIFF header, IFD0 directly after it with two entries
    let mut v = Vec::new();
    v.extend_from_slice(b"MM");
    v.write_u16::<BigEndian>(42).unwrap();
    v.write_u32::<BigEndian>(8).unwrap();

    v.write_u16::<BigEndian>(2).unwrap();

    let values_offset = 8 + 2 + 2 * 12 + 4;
    for (i, tag) in [TIFF_TAG_X_RESOLUTION, TIFF_TAG_Y_RESOLUTION].iter().enumerate() {
        v.write_u16::<BigEndian>(*tag).unwrap();
        v.write_u16::<BigEndian>(TIFF_TYPE_RATIONAL).unwrap();
        v.write_u32::<BigEndian>(1).unwrap();
        v.write_u32::<BigEndian>((values_offset + i * 8) as u32)
            .unwrap();
    }

    // no next IFD
    v.write_u32::<BigEndian>(0).unwrap();

    for (n, d) in [x, y] {
        v.write_u32::<BigEndian>(n).unwrap();
        v.write_u32::<BigEndian>(d).unwrap();
    }

    v
}
