/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::consts::JpegDecodeStatus;

use super::frame::Frame;
use super::scan_decoder::ScanHeader;

/// used to keep track of the block position while decoding a scan
pub struct JpegPositionState {
    /// current component (index into the frame components)
    cmp: usize,

    /// index of the current component within the scan
    csc: usize,

    /// offset of the block within the mcu of the current component
    sub: u32,

    /// current minimum coded unit, or block for non interleaved scans
    mcu: u32,

    /// block position of the current block within the component
    block_x: u32,
    block_y: u32,

    /// number of mcus left until the restart interval is over
    rstw: u32,

    /// tracks runs of blocks with all remaining coefficients zero in progressive scans
    pub eobrun: u16,

    scan_components: [usize; 4],
    scan_component_count: usize,

    /// mcus per line in the scan (blocks per line for non interleaved scans)
    units_per_line: u32,

    /// total mcus in the scan (total blocks for non interleaved scans)
    unit_count: u32,

    /// (horizontal, vertical) sampling factor per frame component
    factors: [(u32, u32); 4],

    restart_interval: u32,
}

impl JpegPositionState {
    pub fn new(frame: &Frame, scan: &ScanHeader, restart_interval: u16) -> Self {
        let mut factors = [(1, 1); 4];
        for (i, c) in frame.components.iter().enumerate() {
            factors[i] = (c.horizontal_factor, c.vertical_factor);
        }

        let first = scan.component_indices[0];

        let (units_per_line, unit_count) = if scan.component_count == 1 {
            // a non interleaved scan only covers the blocks that intersect the image
            let c = &frame.components[first];
            (c.width_in_blocks, c.width_in_blocks * c.height_in_blocks)
        } else {
            (
                frame.mcus_per_line,
                frame.mcus_per_line * frame.mcus_per_column,
            )
        };

        let mut state = JpegPositionState {
            cmp: first,
            csc: 0,
            sub: 0,
            mcu: 0,
            block_x: 0,
            block_y: 0,
            rstw: u32::from(restart_interval),
            eobrun: 0,
            scan_components: scan.component_indices,
            scan_component_count: scan.component_count,
            units_per_line,
            unit_count,
            factors,
            restart_interval: u32::from(restart_interval),
        };

        state.update_block_position();
        state
    }

    pub fn get_mcu(&self) -> u32 {
        self.mcu
    }

    pub fn get_cmp(&self) -> usize {
        self.cmp
    }

    pub fn get_block_x(&self) -> u32 {
        self.block_x
    }

    pub fn get_block_y(&self) -> u32 {
        self.block_y
    }

    /// true if the scan has no blocks at all
    pub fn is_empty(&self) -> bool {
        self.unit_count == 0
    }

    /// called at the start of each restart interval
    pub fn reset_rstw(&mut self) {
        self.rstw = self.restart_interval;

        // eobruns don't span reset intervals
        self.eobrun = 0;
    }

    fn update_block_position(&mut self) {
        let unit_x = self.mcu % self.units_per_line;
        let unit_y = self.mcu / self.units_per_line;

        if self.scan_component_count == 1 {
            self.block_x = unit_x;
            self.block_y = unit_y;
        } else {
            let (h, v) = self.factors[self.cmp];
            self.block_x = unit_x * h + self.sub % h;
            self.block_y = unit_y * v + self.sub / h;
        }
    }

    /// counts down the restart interval after an mcu was completed
    fn finish_mcu(&mut self) -> JpegDecodeStatus {
        self.mcu += 1;

        if self.mcu >= self.unit_count {
            return JpegDecodeStatus::ScanCompleted;
        }

        if self.restart_interval > 0 {
            self.rstw -= 1;
            if self.rstw == 0 {
                self.rstw = self.restart_interval;
                return JpegDecodeStatus::RestartIntervalExpired;
            }
        }

        JpegDecodeStatus::DecodeInProgress
    }

    /// calculates next position for the block
    pub fn next_mcu_pos(&mut self) -> JpegDecodeStatus {
        let sta = if self.scan_component_count == 1 {
            self.finish_mcu()
        } else {
            let (h, v) = self.factors[self.cmp];

            self.sub += 1;
            if self.sub < h * v {
                JpegDecodeStatus::DecodeInProgress
            } else {
                self.sub = 0;
                self.csc += 1;

                if self.csc < self.scan_component_count {
                    JpegDecodeStatus::DecodeInProgress
                } else {
                    self.csc = 0;
                    self.finish_mcu()
                }
            }
        };

        if sta != JpegDecodeStatus::ScanCompleted {
            self.cmp = self.scan_components[self.csc];
            self.update_block_position();
        }

        sta
    }
}
