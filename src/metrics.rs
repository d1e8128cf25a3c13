/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::time::Duration;

#[cfg(windows)]
use cpu_time::ThreadTime;

/// platform independent threadtime measurement
pub struct CpuTimeMeasure {
    #[cfg(windows)]
    start: ThreadTime,
    #[cfg(not(windows))]
    start: std::time::Instant,
}

impl CpuTimeMeasure {
    pub fn new() -> Self {
        Self {
            #[cfg(windows)]
            start: ThreadTime::now(),
            #[cfg(not(windows))]
            start: std::time::Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// The phases of a decode that are timed separately
#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq)]
pub enum DecodePhase {
    /// walking the markers, building tables and frame geometry
    ParseSegments,
    /// entropy decoding of the scans
    DecodeScans,
    /// IDCT, upsampling and color conversion into the destination
    PostProcess,
}

/// Timings and counters collected while decoding a single image
#[derive(Default, Debug, Clone)]
pub struct Metrics {
    parse_time: Duration,
    scan_time: Duration,
    post_process_time: Duration,
    scan_count: u32,
    bytes_read: u64,
}

impl Metrics {
    pub fn record_phase_time(&mut self, phase: DecodePhase, duration: Duration) {
        match phase {
            DecodePhase::ParseSegments => self.parse_time += duration,
            DecodePhase::DecodeScans => self.scan_time += duration,
            DecodePhase::PostProcess => self.post_process_time += duration,
        }
    }

    pub fn record_scan(&mut self) {
        self.scan_count += 1;
    }

    pub fn set_bytes_read(&mut self, bytes_read: u64) {
        self.bytes_read = bytes_read;
    }

    pub fn get_phase_time(&self, phase: DecodePhase) -> Duration {
        match phase {
            DecodePhase::ParseSegments => self.parse_time,
            DecodePhase::DecodeScans => self.scan_time,
            DecodePhase::PostProcess => self.post_process_time,
        }
    }

    pub fn get_scan_count(&self) -> u32 {
        self.scan_count
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn merge_from(&mut self, source_metrics: &Metrics) {
        self.parse_time += source_metrics.parse_time;
        self.scan_time += source_metrics.scan_time;
        self.post_process_time += source_metrics.post_process_time;
        self.scan_count += source_metrics.scan_count;
        self.bytes_read += source_metrics.bytes_read;
    }

    #[allow(dead_code)]
    pub fn print_metrics(&self) {
        println!(
            "parse={0}ms scans={1}ms ({2} scans) post_process={3}ms bytes_read={4}",
            self.parse_time.as_millis(),
            self.scan_time.as_millis(),
            self.scan_count,
            self.post_process_time.as_millis(),
            self.bytes_read
        );
    }
}
