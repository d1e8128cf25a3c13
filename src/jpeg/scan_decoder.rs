/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::BufRead;

use log::warn;

use super::bit_reader::BitReader;
use super::block_based_image::AlignedBlock;
use super::frame::Frame;
use super::huffman_table::HuffTree;
use super::jpeg_code;
use super::jpeg_position_state::JpegPositionState;
use super::table_store::TableStore;
use crate::consts::*;
use crate::helpers::*;
use crate::jpeg_error::{err_exit_code, AddContext, ExitCode, Result};

/// Parameters of a single scan as declared by the SOS segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanHeader {
    /// indices into the frame components, in scan order
    pub component_indices: [usize; 4],
    pub component_count: usize,

    /// first coefficient (zigzag order) coded in this scan
    pub spectral_start: u8,

    /// last coefficient (zigzag order) coded in this scan
    pub spectral_end: u8,

    /// successive approximation bit position of the previous scan, 0 for a first scan
    pub approx_high: u8,

    /// successive approximation bit position (point transform)
    pub approx_low: u8,
}

/// The four kinds of progressive scans plus the sequential one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Sequential,
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

impl ScanHeader {
    pub fn new(
        component_indices: &[usize],
        spectral_start: u8,
        spectral_end: u8,
        approx_high: u8,
        approx_low: u8,
    ) -> Self {
        let mut indices = [0; 4];
        indices[..component_indices.len()].copy_from_slice(component_indices);

        ScanHeader {
            component_indices: indices,
            component_count: component_indices.len(),
            spectral_start,
            spectral_end,
            approx_high,
            approx_low,
        }
    }

    /// Parses the payload of an SOS segment. The Huffman table selectors are bound to
    /// the frame components named by the scan.
    pub fn parse(segment: &[u8], frame: &mut Frame) -> Result<ScanHeader> {
        let count = usize::from(*segment.first().unwrap_or(&0));

        if count == 0 || count > 4 {
            return err_exit_code(
                ExitCode::MalformedSegment,
                format!("scan with {0} components", count),
            );
        }

        if segment.len() != 4 + 2 * count {
            return err_exit_code(
                ExitCode::BadSegmentLength,
                format!(
                    "SOS with {0} components has {1} bytes",
                    count,
                    segment.len()
                ),
            );
        }

        let mut indices = [0usize; 4];
        for i in 0..count {
            let id = segment[1 + 2 * i];
            let selectors = segment[2 + 2 * i];

            let cmp = match frame.component_index(id) {
                Some(c) => c,
                None => {
                    return err_exit_code(
                        ExitCode::UnknownComponentSelector,
                        format!("scan references unknown component {0}", id),
                    )
                }
            };

            if indices[..i].contains(&cmp) {
                return err_exit_code(
                    ExitCode::MalformedSegment,
                    format!("component {0} listed twice in scan", id),
                );
            }

            let dc = lbits(selectors, 4);
            let ac = rbits(selectors, 4);
            if dc > 3 || ac > 3 {
                return err_exit_code(
                    ExitCode::MalformedSegment,
                    format!("Huffman table selector {0:x} out of range", selectors),
                );
            }

            frame.components[cmp].huff_dc = dc;
            frame.components[cmp].huff_ac = ac;
            indices[i] = cmp;
        }

        let tail = &segment[1 + 2 * count..];

        Ok(ScanHeader::new(
            &indices[..count],
            tail[0],
            tail[1],
            lbits(tail[2], 4),
            rbits(tail[2], 4),
        ))
    }

    pub fn components(&self) -> &[usize] {
        &self.component_indices[..self.component_count]
    }

    fn kind(&self, progressive: bool) -> Result<ScanKind> {
        if !progressive {
            return Ok(ScanKind::Sequential);
        }

        let ss = self.spectral_start;
        let se = self.spectral_end;

        if self.approx_low > 13 || self.approx_high > 13 {
            return err_exit_code(
                ExitCode::CorruptEntropyStream,
                format!(
                    "successive approximation {0}/{1} out of range",
                    self.approx_high, self.approx_low
                ),
            );
        }

        if ss == 0 {
            if se != 0 {
                return err_exit_code(
                    ExitCode::CorruptEntropyStream,
                    "progressive DC scan can't contain AC coefficients",
                );
            }

            return Ok(if self.approx_high == 0 {
                ScanKind::DcFirst
            } else {
                ScanKind::DcRefine
            });
        }

        if se < ss || se > 63 {
            return err_exit_code(
                ExitCode::CorruptEntropyStream,
                format!("progressive encoding range was invalid {0} to {1}", ss, se),
            );
        }

        if self.component_count != 1 {
            return err_exit_code(
                ExitCode::CorruptEntropyStream,
                "Progressive AC encoding cannot be interleaved",
            );
        }

        Ok(if self.approx_high == 0 {
            ScanKind::AcFirst
        } else {
            ScanKind::AcRefine
        })
    }
}

/// Decodes the entropy coded data of one scan into the coefficient storage of the frame.
///
/// The reader must be positioned right after the SOS header. Returns the marker that
/// terminated the entropy coded data if it was already consumed from the reader, in
/// which case the caller must dispatch it without searching for a new one.
pub fn decode_scan<R: BufRead>(
    frame: &mut Frame,
    tables: &TableStore,
    scan: &ScanHeader,
    restart_interval: u16,
    reader: R,
) -> Result<Option<u8>> {
    let kind = scan.kind(frame.is_progressive()).context()?;

    let needs_dc = matches!(kind, ScanKind::Sequential | ScanKind::DcFirst);
    let needs_ac = matches!(
        kind,
        ScanKind::Sequential | ScanKind::AcFirst | ScanKind::AcRefine
    );

    // resolve the tables up front so a missing one is reported before any data is read
    let mut dc_trees: [Option<&HuffTree>; 4] = [None; 4];
    let mut ac_trees: [Option<&HuffTree>; 4] = [None; 4];

    for &cmp in scan.components() {
        let c = &frame.components[cmp];

        if needs_dc {
            dc_trees[cmp] = tables.dc_table(usize::from(c.huff_dc));
            if dc_trees[cmp].is_none() {
                return err_exit_code(
                    ExitCode::CorruptEntropyStream,
                    format!("missing DC Huffman table {0} for component {1}", c.huff_dc, c.id),
                );
            }
        }

        if needs_ac {
            ac_trees[cmp] = tables.ac_table(usize::from(c.huff_ac));
            if ac_trees[cmp].is_none() {
                return err_exit_code(
                    ExitCode::CorruptEntropyStream,
                    format!("missing AC Huffman table {0} for component {1}", c.huff_ac, c.id),
                );
            }
        }
    }

    let mut state = JpegPositionState::new(frame, scan, restart_interval);
    if state.is_empty() {
        return Ok(None);
    }

    let mut bit_reader = BitReader::new(reader);
    let image_data = &mut frame.component_blocks;

    let ss = usize::from(scan.spectral_start);
    let se = usize::from(scan.spectral_end);
    let al = u32::from(scan.approx_low);

    let mut sta = JpegDecodeStatus::DecodeInProgress;
    while sta != JpegDecodeStatus::ScanCompleted {
        // restart wait counter, eob run and dc predictors start from scratch
        state.reset_rstw();
        let mut last_dc = [0i16; 4];

        while sta == JpegDecodeStatus::DecodeInProgress {
            let cmp = state.get_cmp();
            let current_block =
                image_data[cmp].get_block_mut(state.get_block_x(), state.get_block_y());

            let previous = *current_block;

            let decoded = match kind {
                ScanKind::Sequential => decode_block_seq(
                    &mut bit_reader,
                    resolved(&dc_trees, cmp)?,
                    resolved(&ac_trees, cmp)?,
                    &mut last_dc[cmp],
                    current_block,
                ),
                ScanKind::DcFirst => {
                    read_dc(&mut bit_reader, resolved(&dc_trees, cmp)?).map(|diff| {
                        last_dc[cmp] = last_dc[cmp].wrapping_add(diff);
                        current_block.set_coefficient(0, last_dc[cmp].wrapping_shl(al));
                    })
                }
                ScanKind::DcRefine => bit_reader.read(1).map(|bit| {
                    current_block.set_coefficient(
                        0,
                        current_block.get_coefficient(0) | ((bit as i16) << al),
                    );
                }),
                ScanKind::AcFirst => decode_ac_first(
                    &mut bit_reader,
                    resolved(&ac_trees, cmp)?,
                    current_block,
                    &mut state.eobrun,
                    ss,
                    se,
                    al,
                ),
                ScanKind::AcRefine => decode_ac_refine(
                    &mut bit_reader,
                    resolved(&ac_trees, cmp)?,
                    current_block,
                    &mut state.eobrun,
                    ss,
                    se,
                    al,
                ),
            };

            // a unit that needed bits past the end of the data isn't in the stream
            if bit_reader.overran_data() {
                *current_block = previous;
                warn!(
                    "entropy coded data ended early at unit {0}, rest of scan left as is",
                    state.get_mcu()
                );
                sta = JpegDecodeStatus::ScanCompleted;
                break;
            }

            decoded.context()?;

            sta = state.next_mcu_pos();
        }

        if sta == JpegDecodeStatus::RestartIntervalExpired {
            bit_reader.verify_reset_code().context()?;
            sta = JpegDecodeStatus::DecodeInProgress;
        }
    }

    Ok(bit_reader.take_pending_marker())
}

#[inline(always)]
fn resolved<'a>(trees: &[Option<&'a HuffTree>; 4], cmp: usize) -> Result<&'a HuffTree> {
    match trees[cmp] {
        Some(t) => Ok(t),
        None => err_exit_code(
            ExitCode::AssertionFailure,
            format!("no Huffman table resolved for component {0}", cmp),
        ),
    }
}

/// sequential block decoding routine
#[inline(never)]
fn decode_block_seq<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    dctree: &HuffTree,
    actree: &HuffTree,
    last_dc: &mut i16,
    block: &mut AlignedBlock,
) -> Result<()> {
    // fix dc
    *last_dc = last_dc.wrapping_add(read_dc(bit_reader, dctree)?);
    block.set_coefficient(0, *last_dc);

    // decode ac
    let mut bpos: usize = 1;
    while bpos < 64 {
        let hc = read_huffman_symbol(bit_reader, actree)?;

        let z = usize::from(lbits(hc, 4));
        let s = rbits(hc, 4);

        if s == 0 {
            if z == 15 {
                // run of 16 zeros
                if bpos + 16 > 64 && !bit_reader.is_exhausted() {
                    return err_exit_code(
                        ExitCode::CorruptEntropyStream,
                        "zero run is longer than the block",
                    );
                }

                bpos += 16;
                continue;
            }

            // EOB
            break;
        }

        if z + bpos >= 64 {
            // a truncated stream reads as zeros which can decode to anything, so stop there
            if bit_reader.is_exhausted() {
                break;
            }

            return err_exit_code(
                ExitCode::CorruptEntropyStream,
                "zero run is longer than the block",
            );
        }

        bpos += z;

        let value = bit_reader.read(u32::from(s))?;
        block.set_coefficient(usize::from(ZIGZAG_TO_RASTER[bpos]), devli(s, value));
        bpos += 1;
    }

    Ok(())
}

/// Reads the next Huffman symbol, first trying the 8-bit peek table and falling back
/// to walking the tree for longer codes.
#[inline(always)]
fn read_huffman_symbol<R: BufRead>(bit_reader: &mut BitReader<R>, tree: &HuffTree) -> Result<u8> {
    loop {
        let (peek_value, peek_len) = bit_reader.peek();

        let (code, code_len) = tree.peek_code[usize::from(peek_value)];

        if u32::from(code_len) <= peek_len {
            bit_reader.advance(u32::from(code_len));
            return Ok(code);
        } else if peek_len < 8 {
            // not enough bits buffered to use the peek table
            bit_reader.fill_register(8)?;
        } else {
            return next_huff_code(bit_reader, tree);
        }
    }
}

/// Reads and decodes next Huffman code from BitReader using the provided tree
fn next_huff_code<R: BufRead>(bit_reader: &mut BitReader<R>, ctree: &HuffTree) -> Result<u8> {
    let mut node: u16 = 0;

    while node < 256 {
        node = ctree.node[usize::from(node)][usize::from(bit_reader.read(1)?)];
    }

    if node == 0xffff {
        err_exit_code(ExitCode::CorruptEntropyStream, "illegal Huffman code detected")
    } else {
        Ok((node - 256) as u8)
    }
}

fn read_dc<R: BufRead>(bit_reader: &mut BitReader<R>, tree: &HuffTree) -> Result<i16> {
    let hc = read_huffman_symbol(bit_reader, tree)?;

    if lbits(hc, 4) != 0 {
        return err_exit_code(
            ExitCode::CorruptEntropyStream,
            "not expecting non-zero run in DC coefficient",
        );
    }

    let s = rbits(hc, 4);
    let value = bit_reader.read(u32::from(s))?;
    Ok(devli(s, value))
}

/// decoding for eobrun lengths. The encoding chops off the most significant
/// bit since it is always 1, so we need to add it back.
fn read_eobrun<R: BufRead>(bit_reader: &mut BitReader<R>, r: u8) -> Result<u16> {
    let n = bit_reader.read(u32::from(r))?;
    Ok(n + (1 << r))
}

/// progressive AC decoding (first pass)
fn decode_ac_first<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    actree: &HuffTree,
    block: &mut AlignedBlock,
    eobrun: &mut u16,
    ss: usize,
    se: usize,
    al: u32,
) -> Result<()> {
    if *eobrun > 0 {
        // block is part of a run of empty blocks
        *eobrun -= 1;
        return Ok(());
    }

    let mut k = ss;
    while k <= se {
        let hc = read_huffman_symbol(bit_reader, actree)?;

        let r = lbits(hc, 4);
        let s = rbits(hc, 4);

        if s != 0 {
            k += usize::from(r);
            if k > se {
                return err_exit_code(ExitCode::CorruptEntropyStream, "run is too long");
            }

            let n = bit_reader.read(u32::from(s))?;
            block.set_coefficient(usize::from(ZIGZAG_TO_RASTER[k]), devli(s, n).wrapping_shl(al));
        } else if r == 15 {
            if k + 15 > se && !bit_reader.is_exhausted() {
                return err_exit_code(ExitCode::CorruptEntropyStream, "run is too long");
            }

            k += 15;
        } else {
            // this block is the first of the run
            *eobrun = read_eobrun(bit_reader, r)? - 1;
            break;
        }

        k += 1;
    }

    Ok(())
}

/// Applies one correction bit to a coefficient that is already non-zero
#[inline(always)]
fn refine_coefficient<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    block: &mut AlignedBlock,
    pos: usize,
    p1: i16,
) -> Result<()> {
    let coef = block.get_coefficient(pos);

    if bit_reader.read(1)? != 0 && (coef & p1) == 0 {
        block.set_coefficient(pos, if coef >= 0 { coef + p1 } else { coef - p1 });
    }

    Ok(())
}

/// progressive AC successive approximation decoding routine
fn decode_ac_refine<R: BufRead>(
    bit_reader: &mut BitReader<R>,
    actree: &HuffTree,
    block: &mut AlignedBlock,
    eobrun: &mut u16,
    ss: usize,
    se: usize,
    al: u32,
) -> Result<()> {
    let p1 = 1i16 << al;

    let mut k = ss;

    if *eobrun == 0 {
        while k <= se {
            let hc = read_huffman_symbol(bit_reader, actree)?;

            let mut r = lbits(hc, 4);
            let s = rbits(hc, 4);

            let mut value = 0i16;
            if s != 0 {
                if s != 1 {
                    return err_exit_code(
                        ExitCode::CorruptEntropyStream,
                        "refinement value must have magnitude 1",
                    );
                }

                value = if bit_reader.read(1)? != 0 { p1 } else { -p1 };
            } else if r != 15 {
                // the rest of this block and r following blocks only get correction bits
                *eobrun = read_eobrun(bit_reader, r)?;
                break;
            }

            // skip r zero coefficients, correcting the non-zero ones passed on the way
            while k <= se {
                let pos = usize::from(ZIGZAG_TO_RASTER[k]);

                if block.get_coefficient(pos) != 0 {
                    refine_coefficient(bit_reader, block, pos, p1)?;
                } else {
                    if r == 0 {
                        break;
                    }
                    r -= 1;
                }

                k += 1;
            }

            if value != 0 {
                if k > se {
                    return err_exit_code(ExitCode::CorruptEntropyStream, "run is too long");
                }

                block.set_coefficient(usize::from(ZIGZAG_TO_RASTER[k]), value);
            }

            k += 1;
        }
    }

    if *eobrun > 0 {
        // only correction bits for the coefficients that are already non-zero
        while k <= se {
            let pos = usize::from(ZIGZAG_TO_RASTER[k]);
            if block.get_coefficient(pos) != 0 {
                refine_coefficient(bit_reader, block, pos, p1)?;
            }
            k += 1;
        }

        *eobrun -= 1;
    }

    Ok(())
}
