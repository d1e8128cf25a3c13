/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::BufRead;

use log::warn;

use super::jpeg_code;
use crate::helpers::has_ff;
use crate::jpeg_error::{err_exit_code, AddContext, ExitCode, Result};

/// Bit reader on top of the entropy coded data of a scan.
///
/// Stuffed 0xff 0x00 pairs are unescaped. When a real marker is found the marker
/// code is remembered for the segment parser and the register is fed zero bits from
/// then on, the same as when the stream ends.
pub struct BitReader<R> {
    inner: R,
    bits: u64,
    bits_left: u32,
    cpos: u32,
    eof: bool,
    pending_marker: Option<u8>,
    read_ahead_bytes: u32,
    zero_fill_bits: u32,
    overran: bool,
}

impl<R: BufRead> BitReader<R> {
    pub fn new(inner: R) -> Self {
        BitReader {
            inner: inner,
            bits: 0,
            bits_left: 0,
            cpos: 0,
            eof: false,
            pending_marker: None,
            read_ahead_bytes: 0,
            zero_fill_bits: 0,
            overran: false,
        }
    }

    #[inline(always)]
    pub fn read(&mut self, bits_to_read: u32) -> Result<u16> {
        if bits_to_read == 0 {
            return Ok(0);
        }

        if self.bits_left < bits_to_read {
            self.fill_register(bits_to_read)?;
        }

        let retval =
            (self.bits >> (self.bits_left - bits_to_read) & ((1 << bits_to_read) - 1)) as u16;
        self.bits_left -= bits_to_read;
        return Ok(retval);
    }

    #[inline(always)]
    pub fn peek(&self) -> (u8, u32) {
        (
            ((self.bits.wrapping_shl(64 - self.bits_left)) >> 56) as u8,
            self.bits_left,
        )
    }

    #[inline(always)]
    pub fn advance(&mut self, bits: u32) {
        self.bits_left -= bits;
    }

    #[inline(always)]
    pub fn fill_register(&mut self, bits_to_read: u32) -> Result<()> {
        // first consume the read_ahead bytes that we have now consumed
        // (otherwise we wouldn't have been called)
        self.inner.consume(self.read_ahead_bytes as usize);
        self.read_ahead_bytes = 0;

        if self.is_exhausted() {
            return self.fill_register_slow(bits_to_read);
        }

        let fb = self.inner.fill_buf().context()?;

        // if we have 8 bytes and there is no 0xff in them, then we can just read the bits directly as big endian
        let v = match fb.get(..8) {
            Some(b) => u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            None => return self.fill_register_slow(bits_to_read),
        };

        if has_ff(v) {
            return self.fill_register_slow(bits_to_read);
        }

        // only fill 63 bits not 64 to avoid having to special case
        // of self.bits << 64 which is a nop
        let bytes_to_read = (63 - self.bits_left) / 8;

        self.bits = self.bits << (bytes_to_read * 8) | v >> (64 - bytes_to_read * 8);
        self.bits_left += bytes_to_read * 8;
        self.read_ahead_bytes = (self.bits_left - bits_to_read) / 8;

        self.inner
            .consume((bytes_to_read - self.read_ahead_bytes) as usize);

        return Ok(());
    }

    #[cold]
    fn fill_register_slow(&mut self, bits_to_read: u32) -> Result<()> {
        loop {
            if self.is_exhausted() {
                // past a marker or the end of the stream everything reads as zero
                self.feed_zero_byte();
            } else {
                let fb = self.inner.fill_buf().context()?;
                if let &[b, ..] = fb {
                    self.inner.consume(1);

                    // 0xff is an escape code, if the next byte is zero, then it is just a normal 0xff
                    // otherwise we ran into a marker
                    if b == 0xff {
                        match self.read_marker_code()? {
                            Some(0) => {
                                self.bits = (self.bits << 8) | 0xff;
                                self.bits_left += 8;
                            }
                            Some(code) => {
                                self.pending_marker = Some(code);
                                self.feed_zero_byte();
                            }
                            None => {
                                // a trailing 0xff can only be the start of a marker that got cut off
                                warn!("stream ends with an unterminated 0xff");
                                self.eof = true;
                                self.feed_zero_byte();
                            }
                        }
                    } else {
                        self.bits = (self.bits << 8) | (b as u64);
                        self.bits_left += 8;
                    }
                } else {
                    // in case of a truncated file, we treat the rest of the file as zeros
                    warn!("entropy coded data truncated, padding with zeros");
                    self.eof = true;
                    self.feed_zero_byte();
                }
            }

            if self.bits_left >= bits_to_read {
                break;
            }
        }
        Ok(())
    }

    /// zero bits that don't come from the stream always sit at the bottom of the register
    fn feed_zero_byte(&mut self) {
        if self.zero_fill_bits > self.bits_left {
            self.overran = true;
        }
        self.zero_fill_bits = self.zero_fill_bits.min(self.bits_left) + 8;
        self.bits_left += 8;
        self.bits <<= 8;
    }

    /// reads the byte following a 0xff, skipping any 0xff fill bytes in between
    fn read_marker_code(&mut self) -> Result<Option<u8>> {
        loop {
            let code = match self.inner.fill_buf().context()? {
                [c, ..] => *c,
                [] => return Ok(None),
            };
            self.inner.consume(1);

            if code != 0xff {
                return Ok(Some(code));
            }
        }
    }

    pub fn is_eof(&self) -> bool {
        return self.eof;
    }

    /// true once the real entropy coded data has ended, either due to a marker or the
    /// end of the stream
    pub fn is_exhausted(&self) -> bool {
        self.eof || self.pending_marker.is_some()
    }

    /// True once bits beyond the end of the entropy coded data have been consumed,
    /// meaning whatever was decoded from them isn't part of the stream.
    pub fn overran_data(&self) -> bool {
        self.overran || self.bits_left < self.zero_fill_bits
    }

    /// the marker that ended the entropy coded data, if any
    pub fn pending_marker(&self) -> Option<u8> {
        self.pending_marker
    }

    /// Hands over the marker that terminated the entropy coded data to the caller
    pub fn take_pending_marker(&mut self) -> Option<u8> {
        self.undo_read_ahead();
        self.pending_marker.take()
    }

    /// Called at the end of each restart interval. The remaining bits in the current
    /// byte are padding and are discarded, then the next marker must be the expected
    /// RSTn code.
    pub fn verify_reset_code(&mut self) -> Result<()> {
        self.undo_read_ahead();

        let expected = jpeg_code::RST0 + (self.cpos as u8 & 7);

        let code = if let Some(m) = self.pending_marker.take() {
            Some(m)
        } else if self.eof {
            None
        } else {
            let mut h = [0u8; 1];
            let n = self.inner.read(&mut h).context()?;
            if n == 1 && h[0] == 0xff {
                self.read_marker_code()?
            } else {
                return err_exit_code(
                    ExitCode::CorruptEntropyStream,
                    format!("expected RST{0} but found data", expected - jpeg_code::RST0),
                );
            }
        };

        match code {
            Some(c) if c == expected => {}
            Some(c) => {
                return err_exit_code(
                    ExitCode::CorruptEntropyStream,
                    format!("invalid reset code {0:x} {1:x} found in stream", 0xff, c),
                );
            }
            None => {
                // truncated right at the restart boundary, the rest reads as zeros
                self.eof = true;
            }
        }

        // start from scratch after RST
        self.cpos += 1;
        self.bits = 0;
        self.bits_left = 0;
        self.zero_fill_bits = 0;
        self.overran = false;

        Ok(())
    }

    /// "puts back" read_ahead bits that were read ahead from the buffer but not consumed.
    ///
    /// After calling this method, we can be guaranteed that read_ahead_bytes is 0 and that
    /// the only bits that are left are part of the current byte.
    pub fn undo_read_ahead(&mut self) {
        while self.bits_left >= 8 && self.read_ahead_bytes > 0 {
            self.bits_left -= 8;
            self.bits >>= 8;
            self.read_ahead_bytes -= 1;
        }

        if self.read_ahead_bytes > 0 {
            self.inner.consume(self.read_ahead_bytes as usize);
            self.read_ahead_bytes = 0;
        }
    }
}
