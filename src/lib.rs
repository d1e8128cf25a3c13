/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Decodes JPEG images (baseline, extended sequential and progressive Huffman coded) into
//! packed 32 bit BGRA rasters, together with the resolution, EXIF and ICC metadata.

#![forbid(non_ascii_idents)]
#![forbid(unused_extern_crates)]
#![forbid(unused_import_braces)]
#![forbid(macro_use_extern_crate)]

mod consts;
mod helpers;
mod jpeg;
mod metadata;
mod metrics;
mod raster;

mod enabled_features;
mod jpeg_error;

use std::io::BufRead;

pub use enabled_features::EnabledFeatures;
pub use helpers::catch_unwind_result;
pub use jpeg::block_based_image::{AlignedBlock, BlockBasedImage};
pub use jpeg::component_info::ComponentInfo;
pub use jpeg::frame::{ColorSpace, Frame};
pub use jpeg::jpeg_read::JpegDecoder;
pub use jpeg::post_processor::{PostProcessor, RawJpegData};
pub use jpeg::table_store::TableStore;
pub use jpeg_error::{ExitCode, JpegError, Result};
pub use metadata::{ImageInfo, ImageMetadata};
pub use metrics::{CpuTimeMeasure, DecodePhase, Metrics};
pub use raster::{Bgra32, ImageBgra32, PixelSink};

use crate::jpeg_error::AddContext;

static PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

static GIT_VERSION: &str = git_version::git_version!(
    args = ["--abbrev=40", "--always", "--dirty=M"],
    fallback = "0"
);

/// Returns the version string of the library, which includes the package version and the git version.
pub fn get_version_string() -> String {
    format!("{}-{}", PACKAGE_VERSION, GIT_VERSION)
}

/// Decodes a JPEG into a BGRA raster. Returns the raster together with the metadata
/// found in the stream and the metrics gathered while decoding.
///
/// Panics inside the decoder are caught and returned as `ExitCode::AssertionFailure`.
pub fn decode_jpeg<R: BufRead>(
    reader: R,
    enabled_features: &EnabledFeatures,
) -> Result<(ImageBgra32, ImageMetadata, Metrics)> {
    catch_unwind_result(|| {
        let mut decoder = JpegDecoder::new(enabled_features.clone());
        let image = decoder.decode(reader).context()?;

        Ok((image, decoder.metadata().clone(), decoder.metrics().clone()))
    })
}

/// Reads the dimensions, bit depth and metadata of a JPEG without decoding the pixels.
pub fn identify_jpeg<R: BufRead>(
    reader: R,
    enabled_features: &EnabledFeatures,
) -> Result<ImageInfo> {
    catch_unwind_result(|| {
        let mut decoder = JpegDecoder::new(enabled_features.clone());
        decoder.identify(reader).context()
    })
}
