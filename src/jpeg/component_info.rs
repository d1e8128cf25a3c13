/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// jpeg internal id, referenced by the scan headers
    pub id: u8,

    /// sample factor horizontal
    pub horizontal_factor: u32,

    /// sample factor vertical
    pub vertical_factor: u32,

    /// quantization table
    pub q_table_index: u8,

    /// no of huffman table (DC), bound by the most recent scan header
    pub huff_dc: u8,

    /// no of huffman table (AC), bound by the most recent scan header
    pub huff_ac: u8,

    /// block count horizontal (non interleaved), covers the image width only
    pub width_in_blocks: u32,

    /// block count vertical (non interleaved), covers the image height only
    pub height_in_blocks: u32,

    /// block count horizontal (interleaved), padded to whole MCUs
    pub blocks_per_line: u32,

    /// block count vertical (interleaved), padded to whole MCUs
    pub blocks_per_column: u32,
}

impl ComponentInfo {
    pub fn new(id: u8, horizontal_factor: u32, vertical_factor: u32, q_table_index: u8) -> Self {
        ComponentInfo {
            id,
            horizontal_factor,
            vertical_factor,
            q_table_index,
            huff_dc: 0,
            huff_ac: 0,
            width_in_blocks: 0,
            height_in_blocks: 0,
            blocks_per_line: 0,
            blocks_per_column: 0,
        }
    }
}
