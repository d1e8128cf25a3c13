/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::helpers::*;
use crate::jpeg_error::{err_exit_code, ExitCode, Result};

/// Canonical code assignment of a Huffman table, indexed by symbol.
#[derive(Copy, Clone, Debug)]
pub struct HuffCodes {
    pub c_val: [u16; 256],
    pub c_len: [u16; 256],
}

impl Default for HuffCodes {
    fn default() -> Self {
        HuffCodes {
            c_val: [0; 256],
            c_len: [0; 256],
        }
    }
}

impl HuffCodes {
    /// Constructs from the 16 code-length counts and the symbol values in the order
    /// they appear on the wire.
    pub fn construct(code_lengths: &[u8; 16], values: &[u8]) -> Result<Self> {
        let total: usize = code_lengths.iter().map(|x| usize::from(*x)).sum();
        if total != values.len() {
            return err_exit_code(
                ExitCode::BadSegmentLength,
                format!(
                    "huffman table announces {0} symbols but has {1}",
                    total,
                    values.len()
                ),
            );
        }

        let mut hc = HuffCodes::default();

        // creating huffman-codes
        let mut k = 0;
        let mut code: u32 = 0;

        // symbol-value of code is its position in the table
        for i in 0..16 {
            let len = (1 + i) as u16;

            for _ in 0..code_lengths[i] {
                if code >= (1u32 << len) {
                    return err_exit_code(
                        ExitCode::MalformedSegment,
                        "invalid huffman code layout, too many codes for a given length",
                    );
                }

                hc.c_len[usize::from(values[k])] = len;
                hc.c_val[usize::from(values[k])] = code as u16;

                k += 1;
                code += 1;
            }

            code = code << 1;
        }

        Ok(hc)
    }
}

/// Decoding tree of a Huffman table plus an 8 bit lookahead table for short codes.
///
/// Node values below 256 are links to other nodes, values of 256 and above are
/// leaves holding `symbol + 256`, and 0xffff marks an invalid code.
#[derive(Copy, Clone, Debug)]
pub struct HuffTree {
    pub node: [[u16; 2]; 256],
    pub peek_code: [(u8, u8); 256],
}

impl Default for HuffTree {
    fn default() -> Self {
        HuffTree {
            node: [[0; 2]; 256],
            peek_code: [(0, 0); 256],
        }
    }
}

impl HuffTree {
    /// construct the huffman tree codes from the HuffCodes as a source
    pub fn construct_hufftree(hc: &HuffCodes) -> Result<Self> {
        let mut ht = HuffTree::default();

        // work through every code creating links between the nodes (represented through ints)
        let mut nextfree = 1;
        for i in 0..256 {
            // reset current node
            let mut node = 0;

            // go through each code & store path
            if hc.c_len[i] > 0 {
                let mut j = hc.c_len[i] - 1;
                while j > 0 {
                    if node > 0xff {
                        return err_exit_code(
                            ExitCode::MalformedSegment,
                            "Huffman table out of space",
                        );
                    }

                    let branch = usize::from(bitn(hc.c_val[i], j));
                    if ht.node[node][branch] == 0 {
                        ht.node[node][branch] = nextfree;
                        nextfree += 1;
                    }

                    node = usize::from(ht.node[node][branch]);

                    j -= 1;
                }

                if node > 0xff {
                    return err_exit_code(ExitCode::MalformedSegment, "Huffman table out of space");
                }

                // last link is number of targetvalue + 256
                ht.node[node][usize::from(bitn(hc.c_val[i], 0))] = (i + 256) as u16;
            }
        }

        // for every illegal code node, store 0xffff so that decoding stops there
        for x in &mut ht.node {
            if x[0] == 0 {
                x[0] = 0xffff;
            }
            if x[1] == 0 {
                x[1] = 0xffff;
            }
        }

        // precalculate decoding peeking into the stream. This lets us quickly decode
        // small code without jumping through the node table
        for peekbyte in 0..256 {
            let mut node = 0;
            let mut len: u8 = 0;

            while node < 256 && len <= 7 {
                node = ht.node[usize::from(node)][(peekbyte >> (7 - len)) & 0x1];

                len += 1;
            }

            if node == 0xffff || node < 256 {
                // invalid code or code was too long to fit, so just say it requires 256 bits
                // so we will take the long path to decode it
                ht.peek_code[peekbyte] = (0, 0xff);
            } else {
                ht.peek_code[peekbyte] = ((node - 256) as u8, len);
            }
        }

        Ok(ht)
    }

    /// Builds the decoding tree directly from the wire representation
    pub fn from_code_lengths(code_lengths: &[u8; 16], values: &[u8]) -> Result<Self> {
        Self::construct_hufftree(&HuffCodes::construct(code_lengths, values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_codes() {
        // two codes of length 2, one of length 3
        let mut lengths = [0u8; 16];
        lengths[1] = 2;
        lengths[2] = 1;

        let hc = HuffCodes::construct(&lengths, &[5, 7, 9]).unwrap();
        assert_eq!((hc.c_len[5], hc.c_val[5]), (2, 0b00));
        assert_eq!((hc.c_len[7], hc.c_val[7]), (2, 0b01));
        assert_eq!((hc.c_len[9], hc.c_val[9]), (3, 0b100));

        let ht = HuffTree::construct_hufftree(&hc).unwrap();

        // peeking 0b01xxxxxx finds symbol 7 after 2 bits
        assert_eq!(ht.peek_code[0b0100_0000], (7, 2));
        assert_eq!(ht.peek_code[0b1001_0101], (9, 3));

        // 0b11 is not a valid prefix
        assert_eq!(ht.peek_code[0b1100_0000], (0, 0xff));
    }

    #[test]
    fn single_code_of_length_one() {
        let mut lengths = [0u8; 16];
        lengths[0] = 1;

        let ht = HuffTree::from_code_lengths(&lengths, &[0]).unwrap();
        assert_eq!(ht.peek_code[0], (0, 1));
        assert_eq!(ht.peek_code[0x80], (0, 0xff));
    }

    #[test]
    fn oversubscribed_lengths() {
        let mut lengths = [0u8; 16];
        lengths[0] = 3;

        assert_eq!(
            HuffTree::from_code_lengths(&lengths, &[0, 1, 2])
                .unwrap_err()
                .exit_code(),
            ExitCode::MalformedSegment
        );
    }

    #[test]
    fn count_mismatch() {
        let mut lengths = [0u8; 16];
        lengths[3] = 2;

        assert_eq!(
            HuffCodes::construct(&lengths, &[0]).unwrap_err().exit_code(),
            ExitCode::BadSegmentLength
        );
    }
}
