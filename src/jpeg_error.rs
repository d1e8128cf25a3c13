/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fmt::Display;
use std::io::ErrorKind;
use std::num::TryFromIntError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
#[non_exhaustive]
/// Well-defined errors for bad things that are expected to happen while decoding a JPEG
pub enum ExitCode {
    /// Assertion failure, which probably indicates a bug in the library.
    AssertionFailure = 1,

    /// The stream does not start with the SOI marker.
    MissingSoi = 2,

    /// The reader was exhausted in the middle of a segment, or before a frame was found.
    Eof = 3,

    /// A second start-of-frame marker was found.
    DuplicateFrame = 4,

    /// The frame uses a sample precision other than 8 bits.
    UnsupportedPrecision = 5,

    /// The frame has a number of components other than 1, 3 or 4.
    UnsupportedColorMode = 6,

    /// The declared length of a segment does not agree with its content.
    BadSegmentLength = 7,

    /// A segment carries an invalid table index, precision or sampling factor.
    MalformedSegment = 8,

    /// A start-of-scan names a component that the frame doesn't have.
    UnknownComponentSelector = 9,

    /// The entropy coded data could not be decoded.
    CorruptEntropyStream = 10,

    /// The destination raster does not have the dimensions of the image.
    SizeMismatch = 11,

    /// An error was returned by an IO operation, for example if a BufRead
    /// passed in returned an error.
    OsError = 33,

    /// The JPEG uses a coding process that is not supported (lossless, arithmetic,
    /// hierarchical) or has dimensions outside the configured limits.
    UnsupportedJpeg = 42,

    /// error occured while casting an integer to a smaller type, most likely
    /// means that the JPEG contains invalid data
    IntegerCastOverflow = 1000,

    /// Caller passed in invalid parameters
    SyntaxError = 1006,

    /// The file to be read was not found (only used by utility exe)
    FileNotFound = 1007,

    /// ran out of memory trying to allocate a buffer
    OutOfMemory = 2000,
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ExitCode {
    /// Converts the error code into an integer for use as a process exit code.
    pub fn as_integer_error_code(self) -> i32 {
        self as i32
    }
}

/// Since errors are rare and stop everything, we want them to be as lightweight as possible.
#[derive(Debug, Clone)]
struct JpegErrorInternal {
    exit_code: ExitCode,
    message: String,
}

/// Standard error returned by the decoder
#[derive(Debug, Clone)]
pub struct JpegError {
    i: Box<JpegErrorInternal>,
}

pub type Result<T> = std::result::Result<T, JpegError>;

impl Display for JpegError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}: {1}", self.i.exit_code, self.i.message)
    }
}

impl JpegError {
    /// Creates a new JpegError with the specified exit code and message.
    pub fn new(exit_code: ExitCode, message: impl AsRef<str>) -> JpegError {
        JpegError {
            i: Box::new(JpegErrorInternal {
                exit_code,
                message: message.as_ref().to_owned(),
            }),
        }
    }

    /// Returns the exit code of the error to classify the error
    pub fn exit_code(&self) -> ExitCode {
        self.i.exit_code
    }

    /// Returns the message of the error, which is a human-readable description of the error.
    pub fn message(&self) -> &str {
        &self.i.message
    }

    /// Adds context to the error by appending the current location in the code. This
    /// allows for building a callstack of where the error occurred.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn add_context(&mut self) {
        self.i
            .message
            .push_str(&format!("\n at {}", std::panic::Location::caller()));
    }
}

#[cold]
#[track_caller]
pub fn err_exit_code<T>(error_code: ExitCode, message: impl AsRef<str>) -> Result<T> {
    let mut e = JpegError::new(error_code, message.as_ref());
    e.add_context();
    return Err(e);
}

pub trait AddContext<T> {
    #[track_caller]
    fn context(self) -> Result<T>;
}

impl<T, E: Into<JpegError>> AddContext<T> for core::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e = e.into();
                e.add_context();
                Err(e)
            }
        }
    }
}

impl std::error::Error for JpegError {}

fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    if e.kind() == ErrorKind::UnexpectedEof {
        ExitCode::Eof
    } else {
        ExitCode::OsError
    }
}

impl From<TryFromIntError> for JpegError {
    #[track_caller]
    fn from(e: TryFromIntError) -> Self {
        let mut e = JpegError::new(ExitCode::IntegerCastOverflow, e.to_string());
        e.add_context();
        e
    }
}

/// translates std::io::Error into JpegError
impl From<std::io::Error> for JpegError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        match e.downcast::<JpegError>() {
            Ok(je) => {
                return je;
            }
            Err(e) => {
                let mut e = JpegError::new(get_io_error_exit_code(&e), e.to_string());
                e.add_context();
                e
            }
        }
    }
}

/// translates JpegError into std::io::Error, which involves putting into a Box and using Other
impl From<JpegError> for std::io::Error {
    fn from(e: JpegError) -> Self {
        return std::io::Error::new(std::io::ErrorKind::Other, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_translation() {
        // test wrapping inside an io error
        fn my_std_error() -> core::result::Result<(), std::io::Error> {
            Err(JpegError::new(ExitCode::CorruptEntropyStream, "test error").into())
        }

        let e: JpegError = my_std_error().unwrap_err().into();
        assert_eq!(e.exit_code(), ExitCode::CorruptEntropyStream);
        assert_eq!(e.message(), "test error");

        // an IO error should be translated into an OsError
        let e: JpegError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
        assert_eq!(e.exit_code(), ExitCode::OsError);

        // running out of data is a truncated stream
        let e: JpegError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(e.exit_code(), ExitCode::Eof);
    }

    #[test]
    fn test_context_keeps_exit_code() {
        fn inner() -> Result<()> {
            err_exit_code(ExitCode::BadSegmentLength, "DRI payload")
        }

        fn outer() -> Result<()> {
            inner().context()
        }

        let e = outer().unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::BadSegmentLength);
        assert!(e.message().starts_with("DRI payload"));

        // one location for the original error and one for the context
        assert_eq!(e.message().matches("\n at ").count(), 2);
    }
}
