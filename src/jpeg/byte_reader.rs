/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::{BufRead, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::jpeg_error::{err_exit_code, AddContext, ExitCode, Result};

/// Forward only byte source that keeps track of how many bytes were consumed.
///
/// Implements `BufRead` itself, so the bit reader can be layered on top of it for the
/// entropy coded data while the position stays exact for the segment parser.
pub struct ByteReader<R> {
    inner: R,
    position: u64,
    length: Option<u64>,
}

impl<R: BufRead> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        ByteReader {
            inner,
            position: 0,
            length: None,
        }
    }

    /// Creates a reader for a stream whose total length is known up front
    pub fn with_length(inner: R, length: u64) -> Self {
        ByteReader {
            inner,
            position: 0,
            length: Some(length),
        }
    }

    /// number of bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// total length of the stream if it was known when the reader was created
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Returns the next byte, or None if the stream is exhausted
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let b = match self.inner.fill_buf().context()? {
            [b, ..] => *b,
            [] => return Ok(None),
        };

        self.consume(1);
        Ok(Some(b))
    }

    /// Reads a big-endian 16 bit value, failing with Eof if the stream ends
    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(self.read_u16::<BigEndian>().context()?)
    }

    /// Skips over the given number of bytes without copying them anywhere
    pub fn skip(&mut self, mut amount: u64) -> Result<()> {
        while amount > 0 {
            let available = self.inner.fill_buf().context()?.len();
            if available == 0 {
                return err_exit_code(
                    ExitCode::Eof,
                    format!("stream ended with {0} bytes left to skip", amount),
                );
            }

            let n = available.min(usize::try_from(amount).unwrap_or(usize::MAX));
            self.consume(n);
            amount -= n as u64;
        }

        Ok(())
    }

    /// Reads exactly `len` bytes into a newly allocated buffer
    pub fn read_segment(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut segment = vec![0u8; len];
        self.read_exact(&mut segment).context()?;
        Ok(segment)
    }
}

impl<R: BufRead> Read for ByteReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for ByteReader<R> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.position += amt as u64;
    }
}
