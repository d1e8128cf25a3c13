/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// Options that control the decoder. Passed explicitly to every decode, there
/// is no process wide configuration.
#[derive(Debug, Clone)]
pub struct EnabledFeatures {
    /// enables/disables reading of progressive images
    pub progressive: bool,

    /// reject/accept images with DQTs that contain zeros
    pub reject_dqts_with_zeros: bool,

    /// maximum jpeg width
    pub max_jpeg_width: u32,

    /// maximum jpeg height
    pub max_jpeg_height: u32,

    /// maximum number of bytes the decoder may allocate for coefficient storage
    pub max_allocation_bytes: u64,

    /// don't retain the EXIF and ICC blobs, only the image geometry and pixels
    pub ignore_metadata: bool,
}

impl Default for EnabledFeatures {
    fn default() -> Self {
        Self {
            progressive: true,
            reject_dqts_with_zeros: false,
            max_jpeg_width: 16386,
            max_jpeg_height: 16386,
            max_allocation_bytes: 1024 * 1024 * 1024,
            ignore_metadata: false,
        }
    }
}

impl EnabledFeatures {
    /// parameters that allow everything
    #[allow(dead_code)]
    pub fn all() -> Self {
        Self {
            progressive: true,
            reject_dqts_with_zeros: false,
            max_jpeg_height: u32::MAX,
            max_jpeg_width: u32::MAX,
            max_allocation_bytes: u64::MAX,
            ignore_metadata: false,
        }
    }
}
