/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

#[derive(PartialEq, Debug)]
pub enum JpegDecodeStatus {
    DecodeInProgress,
    RestartIntervalExpired,
    ScanCompleted,
}

#[derive(PartialEq, Debug, Copy, Clone)]
pub enum JpegType {
    Unknown,
    Sequential,
    Progressive,
}

/// the number of 8x8 block rows that the post processor converts in one step
pub const BLOCK_ROWS_PER_STEP: u32 = 4;

/// the number of pixel rows that the post processor converts in one step
pub const PIXEL_ROWS_PER_STEP: u32 = BLOCK_ROWS_PER_STEP * 8;

/// default resolution in dots per inch if neither JFIF nor EXIF specify one
pub const DEFAULT_RESOLUTION: f64 = 96.0;

pub const RASTER_TO_ZIGZAG: [u8; 64] = [
    0, 1, 5, 6, 14, 15, 27, 28, 2, 4, 7, 13, 16, 26, 29, 42, 3, 8, 12, 17, 25, 30, 41, 43, 9, 11,
    18, 24, 31, 40, 44, 53, 10, 19, 23, 32, 39, 45, 52, 54, 20, 22, 33, 38, 46, 51, 55, 60, 21, 34,
    37, 47, 50, 56, 59, 61, 35, 36, 48, 49, 57, 58, 62, 63,
];

pub const ZIGZAG_TO_RASTER: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

#[test]
fn zigzag_tables_are_inverse() {
    for i in 0..64 {
        assert_eq!(usize::from(RASTER_TO_ZIGZAG[usize::from(ZIGZAG_TO_RASTER[i])]), i);
    }
}
