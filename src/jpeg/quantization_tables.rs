/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::consts::*;

/// Quantization table of a component re-ordered for dequantization in raster order.
#[derive(Clone, Debug)]
pub struct QuantizationTables {
    quantization_table: [u16; 64],
}

impl QuantizationTables {
    /// Creates the table from the 64 values in storage (zigzag) order as they appear in the DQT
    pub fn new_from_table(quantization_table: &[u16; 64]) -> Self {
        let mut retval = QuantizationTables {
            quantization_table: [0; 64],
        };

        for coord in 0..64 {
            retval.quantization_table[coord] =
                quantization_table[usize::from(RASTER_TO_ZIGZAG[coord])];
        }

        return retval;
    }

    /// returns the table in raster order
    pub fn get_quantization_table(&self) -> &[u16; 64] {
        &self.quantization_table
    }
}

#[test]
fn raster_order() {
    let mut storage = [0u16; 64];
    for i in 0..64 {
        storage[i] = i as u16;
    }

    let q = QuantizationTables::new_from_table(&storage);

    // second entry in zigzag order is one to the right of DC, the third is one below
    assert_eq!(q.get_quantization_table()[1], 1);
    assert_eq!(q.get_quantization_table()[8], 2);
    assert_eq!(q.get_quantization_table()[63], 63);
}
