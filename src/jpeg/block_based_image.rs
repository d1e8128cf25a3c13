/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use bytemuck::{cast_ref, Pod, Zeroable};
use wide::{i16x8, i32x8};

use crate::jpeg_error::{err_exit_code, ExitCode, Result};

/// 8x8 block of coefficients in raster order, aligned so it can be viewed as SIMD rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, align(32))]
pub struct AlignedBlock {
    raw_data: [i16; 64],
}

impl Default for AlignedBlock {
    fn default() -> Self {
        AlignedBlock::new([0; 64])
    }
}

impl AlignedBlock {
    pub const fn new(block: [i16; 64]) -> Self {
        AlignedBlock { raw_data: block }
    }

    #[inline(always)]
    pub fn get_block(&self) -> &[i16; 64] {
        &self.raw_data
    }

    #[inline(always)]
    pub fn get_block_mut(&mut self) -> &mut [i16; 64] {
        &mut self.raw_data
    }

    #[inline(always)]
    pub fn get_coefficient(&self, index: usize) -> i16 {
        self.raw_data[index]
    }

    #[inline(always)]
    pub fn set_coefficient(&mut self, index: usize, v: i16) {
        self.raw_data[index] = v;
    }

    /// Multiplies with the raster order quantization table and returns the columns
    /// widened to 32 bits, which is the layout the IDCT expects.
    pub fn dequantize_columns(&self, q: &[u16; 64]) -> [i32x8; 8] {
        let rows: &[i16x8; 8] = cast_ref(&self.raw_data);
        let q_rows: &[[u16; 8]; 8] = cast_ref(q);

        let mut product = [i32x8::splat(0); 8];
        for r in 0..8 {
            let q_row = i32x8::from(q_rows[r].map(i32::from));
            product[r] = i32x8::from_i16x8(rows[r]) * q_row;
        }

        // lane r of column k must hold the coefficient at (r, k)
        i32x8::transpose(product)
    }
}

/// Coefficient storage of one component, padded to whole MCUs.
pub struct BlockBasedImage {
    block_width: u32,
    block_height: u32,
    image: Vec<AlignedBlock>,
}

impl BlockBasedImage {
    pub fn new(block_width: u32, block_height: u32) -> Result<Self> {
        let len = usize::try_from(u64::from(block_width) * u64::from(block_height))?;

        let mut image = Vec::new();
        if image.try_reserve_exact(len).is_err() {
            return err_exit_code(
                ExitCode::OutOfMemory,
                format!("unable to allocate {0} blocks", len),
            );
        }
        image.resize(len, AlignedBlock::default());

        Ok(BlockBasedImage {
            block_width,
            block_height,
            image,
        })
    }

    pub fn get_block_width(&self) -> u32 {
        self.block_width
    }

    pub fn get_block_height(&self) -> u32 {
        self.block_height
    }

    #[inline(always)]
    pub fn get_block(&self, x: u32, y: u32) -> &AlignedBlock {
        &self.image[(y * self.block_width + x) as usize]
    }

    #[inline(always)]
    pub fn get_block_mut(&mut self, x: u32, y: u32) -> &mut AlignedBlock {
        &mut self.image[(y * self.block_width + x) as usize]
    }
}

#[test]
fn dequantize_layout() {
    let mut block = AlignedBlock::default();
    block.set_coefficient(1, 3); // row 0, column 1
    block.set_coefficient(8, 5); // row 1, column 0

    let mut q = [1u16; 64];
    q[1] = 7;

    let cols: [[i32; 8]; 8] = bytemuck::cast(block.dequantize_columns(&q));
    assert_eq!(cols[1][0], 21);
    assert_eq!(cols[0][1], 5);
    assert_eq!(cols[0][0], 0);
}

#[test]
fn new_image_starts_zeroed() {
    let mut image = BlockBasedImage::new(3, 2).unwrap();
    assert_eq!(image.get_block_width(), 3);
    assert_eq!(image.get_block_height(), 2);
    assert_eq!(*image.get_block(2, 1), AlignedBlock::default());
    assert!(image.get_block(2, 1).get_block().iter().all(|&c| c == 0));

    image.get_block_mut(2, 1).set_coefficient(63, -4);
    assert_eq!(image.get_block(2, 1).get_coefficient(63), -4);
    assert_eq!(image.get_block(1, 1).get_coefficient(63), 0);
}
