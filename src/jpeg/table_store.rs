/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use default_boxed::DefaultBoxed;
use log::debug;

use super::huffman_table::HuffTree;
use crate::enabled_features::EnabledFeatures;
use crate::helpers::*;
use crate::jpeg_error::{err_exit_code, AddContext, ExitCode, Result};

/// number of slots for each kind of table
pub const TABLE_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanClass {
    Dc = 0,
    Ac = 1,
}

/// Quantization and Huffman tables defined so far in the stream. Slots can be
/// redefined at any point, the new definition replaces the old one.
#[derive(DefaultBoxed)]
pub struct TableStore {
    /// quantization tables in storage (zigzag) order
    q_tables: [Option<[u16; 64]>; TABLE_SLOTS],
    dc_tables: [Option<HuffTree>; TABLE_SLOTS],
    ac_tables: [Option<HuffTree>; TABLE_SLOTS],
}

impl TableStore {
    pub fn quantization_table(&self, slot: usize) -> Option<&[u16; 64]> {
        self.q_tables.get(slot)?.as_ref()
    }

    pub fn dc_table(&self, slot: usize) -> Option<&HuffTree> {
        self.dc_tables.get(slot)?.as_ref()
    }

    pub fn ac_table(&self, slot: usize) -> Option<&HuffTree> {
        self.ac_tables.get(slot)?.as_ref()
    }

    /// Decodes one quantization table from `raw`, 64 bytes for 8 bit precision
    /// (nibble 0) or 128 big-endian bytes for 16 bit precision (nibble 1).
    /// Returns the number of bytes consumed.
    pub fn set_quantization_table(
        &mut self,
        slot: usize,
        precision: u8,
        raw: &[u8],
        enabled_features: &EnabledFeatures,
    ) -> Result<usize> {
        if slot >= TABLE_SLOTS || precision > 1 {
            return err_exit_code(
                ExitCode::MalformedSegment,
                format!("DQT has invalid index {0} or precision {1}", slot, precision),
            );
        }

        let entry_size = usize::from(precision) + 1;
        let consumed = 64 * entry_size;
        ensure_space(raw, 0, consumed).context()?;

        let mut table = [0u16; 64];
        for i in 0..64 {
            table[i] = if precision == 0 {
                u16::from(raw[i])
            } else {
                b_short(raw[2 * i], raw[2 * i + 1])
            };

            if table[i] == 0 && enabled_features.reject_dqts_with_zeros {
                return err_exit_code(ExitCode::MalformedSegment, "DQT has zero value");
            }
        }

        self.q_tables[slot] = Some(table);

        Ok(consumed)
    }

    /// Parses a DQT segment payload, which can contain several tables back to back
    pub fn parse_dqt(&mut self, segment: &[u8], enabled_features: &EnabledFeatures) -> Result<()> {
        let mut hpos = 0;
        while hpos < segment.len() {
            let precision = lbits(segment[hpos], 4);
            let slot = usize::from(rbits(segment[hpos], 4));
            hpos += 1;

            hpos += self
                .set_quantization_table(slot, precision, &segment[hpos..], enabled_features)
                .context()?;

            debug!("DQT slot {0} precision {1}", slot, precision);
        }

        Ok(())
    }

    /// Builds the decoding tree for a Huffman table and stores it in the slot
    pub fn build_huffman_table(
        &mut self,
        class: HuffmanClass,
        slot: usize,
        code_lengths: &[u8; 16],
        values: &[u8],
    ) -> Result<()> {
        if slot >= TABLE_SLOTS {
            return err_exit_code(
                ExitCode::MalformedSegment,
                format!("DHT has invalid slot {0}", slot),
            );
        }

        let tree = HuffTree::from_code_lengths(code_lengths, values).context()?;

        match class {
            HuffmanClass::Dc => self.dc_tables[slot] = Some(tree),
            HuffmanClass::Ac => self.ac_tables[slot] = Some(tree),
        }

        Ok(())
    }

    /// Parses a DHT segment payload. Each table is one byte of class and slot, 16 code
    /// length counts and then as many symbols as the counts add up to.
    pub fn parse_dht(&mut self, segment: &[u8]) -> Result<()> {
        let mut hpos = 0;
        while hpos < segment.len() {
            let class = match lbits(segment[hpos], 4) {
                0 => HuffmanClass::Dc,
                1 => HuffmanClass::Ac,
                c => {
                    return err_exit_code(
                        ExitCode::MalformedSegment,
                        format!("DHT has invalid table class {0}", c),
                    );
                }
            };
            let slot = usize::from(rbits(segment[hpos], 4));
            hpos += 1;

            ensure_space(segment, hpos, 16).context()?;

            let mut code_lengths = [0u8; 16];
            code_lengths.copy_from_slice(&segment[hpos..hpos + 16]);
            hpos += 16;

            let total: usize = code_lengths.iter().map(|x| usize::from(*x)).sum();
            ensure_space(segment, hpos, total).context()?;

            self.build_huffman_table(class, slot, &code_lengths, &segment[hpos..hpos + total])
                .context()?;
            hpos += total;

            debug!("DHT {0:?} slot {1} with {2} symbols", class, slot, total);
        }

        Ok(())
    }
}

fn ensure_space(segment: &[u8], hpos: usize, amount: usize) -> Result<()> {
    if hpos + amount > segment.len() {
        return err_exit_code(
            ExitCode::BadSegmentLength,
            format!(
                "segment too short, need {0} bytes at offset {1} but only {2} available",
                amount,
                hpos,
                segment.len()
            ),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_table_round_trip() {
        let raw: Vec<u8> = (1..=64).collect();

        let mut ts = TableStore::default_boxed();
        let consumed = ts
            .set_quantization_table(2, 0, &raw, &EnabledFeatures::default())
            .unwrap();
        assert_eq!(consumed, 64);

        let table = ts.quantization_table(2).unwrap();
        for i in 0..64 {
            assert_eq!(table[i], raw[i] as u16);
        }
        assert!(ts.quantization_table(0).is_none());
    }

    #[test]
    fn sixteen_bit_quantization_table() {
        let mut segment = vec![0x11u8];
        for i in 0..64u16 {
            segment.extend_from_slice(&(i * 300).to_be_bytes());
        }

        let mut ts = TableStore::default_boxed();
        ts.parse_dqt(&segment, &EnabledFeatures::default()).unwrap();
        assert_eq!(ts.quantization_table(1).unwrap()[63], 63 * 300);
    }

    #[test]
    fn quantization_table_errors() {
        let mut ts = TableStore::default_boxed();
        let features = EnabledFeatures::default();

        assert_eq!(
            ts.set_quantization_table(4, 0, &[1; 64], &features)
                .unwrap_err()
                .exit_code(),
            ExitCode::MalformedSegment
        );
        assert_eq!(
            ts.set_quantization_table(0, 2, &[1; 64], &features)
                .unwrap_err()
                .exit_code(),
            ExitCode::MalformedSegment
        );
        assert_eq!(
            ts.set_quantization_table(0, 1, &[1; 64], &features)
                .unwrap_err()
                .exit_code(),
            ExitCode::BadSegmentLength
        );

        let strict = EnabledFeatures {
            reject_dqts_with_zeros: true,
            ..EnabledFeatures::default()
        };
        assert_eq!(
            ts.set_quantization_table(0, 0, &[0; 64], &strict)
                .unwrap_err()
                .exit_code(),
            ExitCode::MalformedSegment
        );
    }

    #[test]
    fn dht_multiple_tables() {
        // DC slot 0 with a single code of length 1, then AC slot 3 with two codes of length 2
        let segment = [
            0x00, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x05, //
            0x13, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x11,
        ];

        let mut ts = TableStore::default_boxed();
        ts.parse_dht(&segment).unwrap();

        assert_eq!(ts.dc_table(0).unwrap().peek_code[0], (5, 1));
        assert_eq!(ts.ac_table(3).unwrap().peek_code[0x40], (0x11, 2));
        assert!(ts.ac_table(0).is_none());
        assert!(ts.dc_table(3).is_none());
    }

    #[test]
    fn dht_length_invariant() {
        // lengths [1,0,...] plus one value consumes exactly 18 bytes
        let mut segment = vec![0x00u8, 1];
        segment.extend_from_slice(&[0; 15]);
        segment.push(0x07);
        assert_eq!(segment.len(), 18);

        let mut ts = TableStore::default_boxed();
        ts.parse_dht(&segment).unwrap();

        // without the value the segment is too short
        segment.pop();
        assert_eq!(
            ts.parse_dht(&segment).unwrap_err().exit_code(),
            ExitCode::BadSegmentLength
        );
    }

    #[test]
    fn dht_invalid_class_or_slot() {
        let mut segment = vec![0x20u8, 1];
        segment.extend_from_slice(&[0; 15]);
        segment.push(0x07);

        let mut ts = TableStore::default_boxed();
        assert_eq!(
            ts.parse_dht(&segment).unwrap_err().exit_code(),
            ExitCode::MalformedSegment
        );

        segment[0] = 0x04;
        assert_eq!(
            ts.parse_dht(&segment).unwrap_err().exit_code(),
            ExitCode::MalformedSegment
        );
    }

    #[test]
    fn redefinition_replaces_slot() {
        let mut ts = TableStore::default_boxed();
        let features = EnabledFeatures::default();
        ts.set_quantization_table(0, 0, &[1; 64], &features).unwrap();
        ts.set_quantization_table(0, 0, &[9; 64], &features).unwrap();
        assert_eq!(ts.quantization_table(0).unwrap()[10], 9);
    }
}
