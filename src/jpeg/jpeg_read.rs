/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::BufRead;
use std::time::Duration;

use default_boxed::DefaultBoxed;
use log::{debug, warn};

#[cfg(feature = "detailed_tracing")]
use log::info;

use super::app_markers::{
    is_exif, is_icc, AdobeMarker, JfifMarker, ADOBE_MARKER_LENGTH, EXIF_SIGNATURE,
    ICC_HEADER_LENGTH, JFIF_MARKER_LENGTH,
};
use super::block_based_image::BlockBasedImage;
use super::byte_reader::ByteReader;
use super::component_info::ComponentInfo;
use super::frame::{deduce_color_space, ColorSpace, Frame};
use super::jpeg_code::{self, Marker};
use super::post_processor::{PostProcessor, RawJpegData};
use super::scan_decoder::{decode_scan, ScanHeader};
use super::table_store::TableStore;
use crate::enabled_features::EnabledFeatures;
use crate::jpeg_error::{err_exit_code, AddContext, ExitCode, Result};
use crate::metadata::{read_exif_resolution, ImageInfo, ImageMetadata};
use crate::metrics::{CpuTimeMeasure, DecodePhase, Metrics};
use crate::raster::{ImageBgra32, PixelSink};

/// Decodes a single JPEG image.
///
/// The segment parser walks the markers of the stream, building the tables and the
/// frame geometry, and hands each scan to the scan decoder. Once the stream has been
/// parsed, the post processor turns the coefficients into pixels.
pub struct JpegDecoder {
    features: EnabledFeatures,
    frame: Option<Frame>,
    tables: Box<TableStore>,
    restart_interval: u16,
    jfif: Option<JfifMarker>,
    adobe: Option<AdobeMarker>,
    color_space: Option<ColorSpace>,
    metadata: ImageMetadata,
    metrics: Metrics,
}

impl JpegDecoder {
    pub fn new(features: EnabledFeatures) -> Self {
        JpegDecoder {
            features,
            frame: None,
            tables: TableStore::default_boxed(),
            restart_interval: 0,
            jfif: None,
            adobe: None,
            color_space: None,
            metadata: ImageMetadata::default(),
            metrics: Metrics::default(),
        }
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    /// only known after a full parse, metadata only parsing doesn't deduce it
    pub fn color_space(&self) -> Option<ColorSpace> {
        self.color_space
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn jfif(&self) -> Option<&JfifMarker> {
        self.jfif.as_ref()
    }

    pub fn adobe(&self) -> Option<&AdobeMarker> {
        self.adobe.as_ref()
    }

    /// (width, height) declared by the frame, zero if there is no frame yet
    pub fn image_size_in_pixels(&self) -> (u32, u32) {
        match &self.frame {
            Some(f) => (f.samples_per_line, f.scanlines),
            None => (0, 0),
        }
    }

    pub fn restart_interval(&self) -> u16 {
        self.restart_interval
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Parses the stream and decodes the pixels into a newly allocated image
    pub fn decode<R: BufRead>(&mut self, reader: R) -> Result<ImageBgra32> {
        self.parse_stream(reader, false).context()?;

        let (width, height) = self.image_size_in_pixels();
        let mut image = ImageBgra32::new(width, height).context()?;

        self.post_process_into(&mut image).context()?;

        Ok(image)
    }

    /// Reads the dimensions and metadata without decoding any of the image data
    pub fn identify<R: BufRead>(&mut self, reader: R) -> Result<ImageInfo> {
        self.parse_stream(reader, true).context()?;

        let frame = match &self.frame {
            Some(f) => f,
            None => return err_exit_code(ExitCode::Eof, "no frame found before end of image"),
        };

        Ok(ImageInfo {
            bits_per_pixel: frame.component_count() as u32 * 8,
            width: frame.samples_per_line,
            height: frame.scanlines,
            metadata: self.metadata.clone(),
        })
    }

    /// Runs the post processor over the decoded coefficients into the destination
    pub fn post_process_into(&mut self, destination: &mut dyn PixelSink) -> Result<()> {
        let cpu_time = CpuTimeMeasure::new();

        PostProcessor::new(&*self)
            .context()?
            .post_process(destination)
            .context()?;

        self.metrics
            .record_phase_time(DecodePhase::PostProcess, cpu_time.elapsed());
        Ok(())
    }

    /// Walks the markers of the stream. In metadata only mode, parsing stops at the first
    /// scan and no tables or coefficient storage are built.
    pub fn parse_stream<R: BufRead>(&mut self, reader: R, metadata_only: bool) -> Result<()> {
        self.parse_segments(ByteReader::new(reader), metadata_only)
    }

    /// Same as `parse_stream` for an image that is completely in memory
    pub fn parse_slice(&mut self, data: &[u8], metadata_only: bool) -> Result<()> {
        self.parse_segments(
            ByteReader::with_length(data, data.len() as u64),
            metadata_only,
        )
    }

    fn parse_segments<R: BufRead>(
        &mut self,
        mut reader: ByteReader<R>,
        metadata_only: bool,
    ) -> Result<()> {
        let cpu_time = CpuTimeMeasure::new();
        let mut scan_time = Duration::ZERO;

        if reader.read_byte()? != Some(0xff) || reader.read_byte()? != Some(jpeg_code::SOI) {
            return err_exit_code(ExitCode::MissingSoi, "Missing SOI marker");
        }

        let mut next_marker = find_next_marker(&mut reader)?;

        loop {
            let code = match next_marker {
                Some(c) => c,
                None => {
                    warn!("stream ended without EOI marker");
                    break;
                }
            };

            let marker = Marker::from_code(code);

            if marker == Marker::EndOfImage {
                break;
            }

            if marker.is_standalone() || matches!(marker, Marker::Unknown(_)) {
                debug!("ignoring marker {0:x} at {1}", code, reader.position());
                next_marker = find_next_marker(&mut reader)?;
                continue;
            }

            let length = reader.read_u16_be().context()?;
            if length < 2 {
                return err_exit_code(
                    ExitCode::BadSegmentLength,
                    format!("marker {0:x} has invalid length {1}", code, length),
                );
            }

            let remaining = usize::from(length - 2);
            let mut pending_marker = None;

            match marker {
                Marker::StartOfFrame { code } => {
                    let segment = reader.read_segment(remaining).context()?;
                    self.process_start_of_frame(code, &segment, metadata_only)
                        .context()?;
                }
                Marker::UnsupportedFrame { code } => {
                    return err_exit_code(
                        ExitCode::UnsupportedJpeg,
                        format!(
                            "frame type {0:x} (lossless, hierarchical or arithmetic coded) is not supported",
                            code
                        ),
                    );
                }
                Marker::StartOfScan => {
                    if metadata_only {
                        // everything of interest comes before the first scan
                        break;
                    }

                    let segment = reader.read_segment(remaining).context()?;

                    let scan_cpu_time = CpuTimeMeasure::new();
                    pending_marker = self.process_start_of_scan(&segment, &mut reader).context()?;
                    scan_time += scan_cpu_time.elapsed();
                }
                Marker::DefineHuffmanTable => {
                    if metadata_only {
                        reader.skip(remaining as u64).context()?;
                    } else {
                        let segment = reader.read_segment(remaining).context()?;
                        self.tables.parse_dht(&segment).context()?;
                    }
                }
                Marker::DefineQuantizationTable => {
                    if metadata_only {
                        reader.skip(remaining as u64).context()?;
                    } else {
                        let segment = reader.read_segment(remaining).context()?;
                        self.tables.parse_dqt(&segment, &self.features).context()?;
                    }
                }
                Marker::DefineRestartInterval => {
                    if remaining != 2 {
                        return err_exit_code(
                            ExitCode::BadSegmentLength,
                            format!("DRI payload has {0} bytes instead of 2", remaining),
                        );
                    }

                    self.restart_interval = reader.read_u16_be().context()?;
                }
                Marker::App(n) => {
                    self.process_application_marker(n, remaining, &mut reader)
                        .context()?;
                }
                Marker::Comment
                | Marker::DefineArithmeticConditioning
                | Marker::Restart(_)
                | Marker::StartOfImage
                | Marker::EndOfImage
                | Marker::Unknown(_) => {
                    reader.skip(remaining as u64).context()?;
                }
            }

            next_marker = match pending_marker {
                Some(m) => Some(m),
                None => find_next_marker(&mut reader)?,
            };
        }

        if self.frame.is_none() && !metadata_only {
            return err_exit_code(ExitCode::Eof, "no frame found before end of image");
        }

        if let Some(length) = reader.length() {
            if !metadata_only && length > reader.position() {
                debug!("{0} bytes after end of image", length - reader.position());
            }
        }

        self.assign_resolution();

        self.metrics.set_bytes_read(reader.position());
        self.metrics
            .record_phase_time(DecodePhase::DecodeScans, scan_time);
        self.metrics.record_phase_time(
            DecodePhase::ParseSegments,
            cpu_time.elapsed().saturating_sub(scan_time),
        );

        Ok(())
    }

    fn process_start_of_frame(
        &mut self,
        code: u8,
        segment: &[u8],
        metadata_only: bool,
    ) -> Result<()> {
        if self.frame.is_some() {
            return err_exit_code(
                ExitCode::DuplicateFrame,
                "Multiple SOF markers. Only single frame jpegs supported.",
            );
        }

        let mut frame = Frame::start(code, segment, &self.features).context()?;

        if frame.is_progressive() && !self.features.progressive {
            return err_exit_code(
                ExitCode::UnsupportedJpeg,
                "progressive JPEG decoding is disabled",
            );
        }

        if !metadata_only {
            self.color_space =
                Some(deduce_color_space(frame.component_count(), self.adobe.as_ref()).context()?);
            frame.init_components(&self.features).context()?;
        }

        self.frame = Some(frame);
        Ok(())
    }

    /// Parses the scan header and decodes the scan. Returns the marker that ended the
    /// entropy coded data if the scan decoder already consumed it.
    fn process_start_of_scan<R: BufRead>(
        &mut self,
        segment: &[u8],
        reader: &mut ByteReader<R>,
    ) -> Result<Option<u8>> {
        let frame = match self.frame.as_mut() {
            Some(f) => f,
            None => return err_exit_code(ExitCode::UnsupportedJpeg, "SOS before SOF"),
        };

        let scan = ScanHeader::parse(segment, frame).context()?;

        #[cfg(feature = "detailed_tracing")]
        info!(
            "scan components={0:?} ss={1} se={2} ah={3} al={4} restart={5}",
            scan.components(),
            scan.spectral_start,
            scan.spectral_end,
            scan.approx_high,
            scan.approx_low,
            self.restart_interval
        );

        let marker = decode_scan(frame, &self.tables, &scan, self.restart_interval, reader)
            .context()?;

        self.metrics.record_scan();
        Ok(marker)
    }

    fn process_application_marker<R: BufRead>(
        &mut self,
        n: u8,
        remaining: usize,
        reader: &mut ByteReader<R>,
    ) -> Result<()> {
        let consumed = match n {
            0 if remaining >= 5 => {
                let header = reader.read_segment(remaining.min(JFIF_MARKER_LENGTH))?;
                if let Some(jfif) = JfifMarker::try_parse(&header) {
                    self.jfif = Some(jfif);
                }
                header.len()
            }
            1 if remaining >= EXIF_SIGNATURE.len() && !self.features.ignore_metadata => {
                let profile = reader.read_segment(remaining)?;
                if is_exif(&profile) {
                    self.metadata.exif_profile = Some(profile[EXIF_SIGNATURE.len()..].to_vec());
                }
                profile.len()
            }
            2 if remaining >= ICC_HEADER_LENGTH && !self.features.ignore_metadata => {
                let header = reader.read_segment(ICC_HEADER_LENGTH)?;
                if is_icc(&header) {
                    let chunk = reader.read_segment(remaining - ICC_HEADER_LENGTH)?;
                    self.metadata
                        .icc_profile
                        .get_or_insert_with(Vec::new)
                        .extend_from_slice(&chunk);
                    remaining
                } else {
                    header.len()
                }
            }
            14 if remaining >= ADOBE_MARKER_LENGTH => {
                let header = reader.read_segment(ADOBE_MARKER_LENGTH)?;
                if let Some(adobe) = AdobeMarker::try_parse(&header) {
                    self.adobe = Some(adobe);
                }
                header.len()
            }
            _ => 0,
        };

        reader.skip((remaining - consumed) as u64)
    }

    /// JFIF density wins if both values are set, otherwise the EXIF resolution is used
    fn assign_resolution(&mut self) {
        if let Some(jfif) = &self.jfif {
            if jfif.x_density > 0 && jfif.y_density > 0 {
                self.metadata.horizontal_resolution = f64::from(jfif.x_density);
                self.metadata.vertical_resolution = f64::from(jfif.y_density);
                return;
            }
        }

        if let Some((x, y)) = self
            .metadata
            .exif_profile
            .as_deref()
            .and_then(read_exif_resolution)
        {
            if x > 0.0 && y > 0.0 {
                self.metadata.horizontal_resolution = x;
                self.metadata.vertical_resolution = y;
            }
        }
    }
}

impl RawJpegData for JpegDecoder {
    fn image_size_in_pixels(&self) -> (u32, u32) {
        JpegDecoder::image_size_in_pixels(self)
    }

    fn color_space(&self) -> ColorSpace {
        self.color_space.unwrap_or(ColorSpace::Grayscale)
    }

    fn quantization_table(&self, slot: usize) -> Option<&[u16; 64]> {
        self.tables.quantization_table(slot)
    }

    fn components(&self) -> &[ComponentInfo] {
        match &self.frame {
            Some(f) => &f.components,
            None => &[],
        }
    }

    fn component_blocks(&self, index: usize) -> Option<&BlockBasedImage> {
        self.frame.as_ref()?.component_blocks.get(index)
    }

    fn max_sampling_factors(&self) -> (u32, u32) {
        match &self.frame {
            Some(f) => (f.max_horizontal_factor, f.max_vertical_factor),
            None => (1, 1),
        }
    }

    fn mcus_per_line(&self) -> u32 {
        self.frame.as_ref().map_or(0, |f| f.mcus_per_line)
    }
}

/// Finds the next marker code. 0xff fill bytes are skipped, as are stuffed zeros and
/// any garbage between segments. Returns None at the end of the stream.
fn find_next_marker<R: BufRead>(reader: &mut ByteReader<R>) -> Result<Option<u8>> {
    let mut skipped = 0u64;

    loop {
        match reader.read_byte()? {
            None => return Ok(None),
            Some(0xff) => loop {
                match reader.read_byte()? {
                    None => return Ok(None),
                    Some(0xff) => {}
                    Some(0) => {
                        skipped += 2;
                        break;
                    }
                    Some(code) => {
                        if skipped > 0 {
                            warn!("skipped {0} bytes before marker {1:x}", skipped, code);
                        }
                        return Ok(Some(code));
                    }
                }
            },
            Some(_) => skipped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::build_exif_with_resolution;
    use std::io::Cursor;

    fn segment(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut v = vec![0xff, code];
        v.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        v.extend_from_slice(payload);
        v
    }

    fn sof(code: u8, width: u16, height: u16, components: u8) -> Vec<u8> {
        let mut payload = vec![8u8];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.push(components);
        for i in 0..components {
            payload.extend_from_slice(&[i + 1, 0x11, 0]);
        }
        segment(code, &payload)
    }

    fn stream(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut v = vec![0xff, jpeg_code::SOI];
        for p in parts {
            v.extend_from_slice(p);
        }
        v.extend_from_slice(&[0xff, jpeg_code::EOI]);
        v
    }

    fn parse(data: &[u8], metadata_only: bool) -> Result<JpegDecoder> {
        let mut decoder = JpegDecoder::new(EnabledFeatures::default());
        decoder.parse_stream(Cursor::new(data), metadata_only)?;
        Ok(decoder)
    }

    fn parse_error(data: &[u8], metadata_only: bool) -> ExitCode {
        parse(data, metadata_only).err().unwrap().exit_code()
    }

    #[test]
    fn missing_soi() {
        assert_eq!(parse_error(&[0xff, 0xd9], false), ExitCode::MissingSoi);
        assert_eq!(parse_error(&[], false), ExitCode::MissingSoi);
    }

    #[test]
    fn frame_geometry() {
        let data = stream(&[sof(jpeg_code::SOF0, 100, 50, 3)]);

        let decoder = parse(&data, false).unwrap();
        assert_eq!(decoder.image_size_in_pixels(), (100, 50));
        assert_eq!(decoder.color_space(), Some(ColorSpace::YCbCr));

        let frame = decoder.frame().unwrap();
        assert_eq!(frame.component_count(), 3);
        assert_eq!(frame.component_blocks.len(), 3);
        assert_eq!((frame.mcus_per_line, frame.mcus_per_column), (13, 7));
    }

    #[test]
    fn duplicate_frame() {
        let data = stream(&[sof(jpeg_code::SOF0, 8, 8, 1), sof(jpeg_code::SOF0, 8, 8, 1)]);
        assert_eq!(parse_error(&data, false), ExitCode::DuplicateFrame);
    }

    #[test]
    fn unsupported_frame_types() {
        for code in [0xc3u8, 0xc5, 0xc9, 0xcf] {
            let data = stream(&[sof(code, 8, 8, 1)]);
            assert_eq!(parse_error(&data, false), ExitCode::UnsupportedJpeg);
        }
    }

    #[test]
    fn progressive_can_be_disabled() {
        let data = stream(&[sof(jpeg_code::SOF2, 8, 8, 1)]);
        assert!(parse(&data, false).unwrap().frame().unwrap().is_progressive());

        let mut decoder = JpegDecoder::new(EnabledFeatures {
            progressive: false,
            ..EnabledFeatures::default()
        });
        assert_eq!(
            decoder
                .parse_stream(Cursor::new(&data), false)
                .unwrap_err()
                .exit_code(),
            ExitCode::UnsupportedJpeg
        );
    }

    #[test]
    fn no_frame_is_eof() {
        let data = stream(&[]);
        assert_eq!(parse_error(&data, false), ExitCode::Eof);

        // identify doesn't mind while parsing, but has nothing to report
        let mut decoder = JpegDecoder::new(EnabledFeatures::default());
        assert_eq!(
            decoder.identify(Cursor::new(&data)).unwrap_err().exit_code(),
            ExitCode::Eof
        );
    }

    #[test]
    fn truncated_segment_is_eof() {
        let mut data = vec![0xff, jpeg_code::SOI];
        data.extend_from_slice(&sof(jpeg_code::SOF0, 8, 8, 1)[..8]);
        assert_eq!(parse_error(&data, false), ExitCode::Eof);
    }

    #[test]
    fn restart_interval() {
        let data = stream(&[
            segment(jpeg_code::DRI, &[0, 12]),
            sof(jpeg_code::SOF0, 8, 8, 1),
        ]);
        assert_eq!(parse(&data, false).unwrap().restart_interval(), 12);

        let data = stream(&[segment(jpeg_code::DRI, &[0, 12, 0])]);
        assert_eq!(parse_error(&data, false), ExitCode::BadSegmentLength);
    }

    #[test]
    fn sos_before_sof() {
        let data = stream(&[segment(jpeg_code::SOS, &[1, 1, 0, 0, 63, 0])]);
        assert_eq!(parse_error(&data, false), ExitCode::UnsupportedJpeg);
    }

    #[test]
    fn unknown_scan_component() {
        let data = stream(&[
            sof(jpeg_code::SOF0, 8, 8, 1),
            segment(jpeg_code::SOS, &[1, 7, 0, 0, 63, 0]),
        ]);
        assert_eq!(parse_error(&data, false), ExitCode::UnknownComponentSelector);
    }

    #[test]
    fn tables_are_stored() {
        let mut dqt = vec![0x11u8];
        for i in 0..64u16 {
            dqt.extend_from_slice(&(i + 256).to_be_bytes());
        }

        let mut dht = vec![0x13u8, 1];
        dht.extend_from_slice(&[0; 15]);
        dht.push(0x00);

        let data = stream(&[
            segment(jpeg_code::DQT, &dqt),
            segment(jpeg_code::DHT, &dht),
            sof(jpeg_code::SOF0, 8, 8, 1),
        ]);

        let decoder = parse(&data, false).unwrap();
        assert_eq!(decoder.tables().quantization_table(1).unwrap()[63], 319);
        assert!(decoder.tables().ac_table(3).is_some());
        assert!(decoder.tables().dc_table(3).is_none());

        // metadata only parsing doesn't look at the tables
        let decoder = parse(&data, true).unwrap();
        assert!(decoder.tables().quantization_table(1).is_none());
        assert!(decoder.frame().unwrap().component_blocks.is_empty());
        assert_eq!(decoder.color_space(), None);
    }

    #[test]
    fn garbage_and_fill_bytes_are_skipped() {
        let mut data = vec![0xff, jpeg_code::SOI, 0x12, 0x34, 0xff, 0x00, 0xff, 0xff];
        data.extend_from_slice(&sof(jpeg_code::SOF0, 8, 8, 1)[1..]);
        data.extend_from_slice(&[0xff, jpeg_code::RST0 + 2, 0xff, jpeg_code::EOI]);

        let decoder = parse(&data, false).unwrap();
        assert_eq!(decoder.image_size_in_pixels(), (8, 8));
        assert_eq!(decoder.metrics().get_bytes_read(), data.len() as u64);
    }

    #[test]
    fn trailing_bytes_after_eoi() {
        let mut data = stream(&[sof(jpeg_code::SOF0, 8, 8, 1)]);
        let eoi_end = data.len() as u64;
        data.extend_from_slice(&[0x00, 0x11, 0x22]);

        let mut decoder = JpegDecoder::new(EnabledFeatures::default());
        decoder.parse_slice(&data, false).unwrap();
        assert_eq!(decoder.metrics().get_bytes_read(), eoi_end);
    }

    #[test]
    fn missing_eoi_is_tolerated() {
        let mut data = vec![0xff, jpeg_code::SOI];
        data.extend_from_slice(&sof(jpeg_code::SOF0, 8, 8, 1));
        assert!(parse(&data, false).is_ok());
    }

    #[test]
    fn jfif_density_wins() {
        let jfif = [b'J', b'F', b'I', b'F', 0, 1, 2, 1, 0, 72, 0, 144, 0, 0];
        let mut exif = EXIF_SIGNATURE.to_vec();
        exif.extend_from_slice(&build_exif_with_resolution((300, 1), (300, 1)));

        let data = stream(&[
            segment(jpeg_code::APP0, &jfif),
            segment(jpeg_code::APP0 + 1, &exif),
            sof(jpeg_code::SOF0, 8, 8, 1),
        ]);
        let decoder = parse(&data, true).unwrap();

        assert_eq!(decoder.jfif().unwrap().x_density, 72);
        assert_eq!(decoder.metadata().horizontal_resolution, 72.0);
        assert_eq!(decoder.metadata().vertical_resolution, 144.0);
        assert!(decoder.metadata().exif_profile.is_some());
    }

    #[test]
    fn exif_resolution_without_jfif_density() {
        let jfif = [b'J', b'F', b'I', b'F', 0, 1, 2, 0, 0, 0, 0, 0, 0, 0];
        let mut exif = EXIF_SIGNATURE.to_vec();
        exif.extend_from_slice(&build_exif_with_resolution((600, 2), (150, 1)));

        let data = stream(&[
            segment(jpeg_code::APP0, &jfif),
            segment(jpeg_code::APP0 + 1, &exif),
            sof(jpeg_code::SOF0, 8, 8, 1),
        ]);

        let decoder = parse(&data, false).unwrap();
        assert_eq!(decoder.metadata().horizontal_resolution, 300.0);
        assert_eq!(decoder.metadata().vertical_resolution, 150.0);
        assert_eq!(
            decoder.metadata().exif_profile.as_deref(),
            Some(&exif[EXIF_SIGNATURE.len()..])
        );
    }

    #[test]
    fn default_resolution() {
        let data = stream(&[sof(jpeg_code::SOF0, 8, 8, 1)]);
        let decoder = parse(&data, false).unwrap();
        assert_eq!(decoder.metadata().horizontal_resolution, 96.0);
        assert_eq!(decoder.metadata().vertical_resolution, 96.0);
    }

    #[test]
    fn icc_chunks_are_concatenated() {
        let chunk = |seq: u8, body: &[u8]| {
            let mut v = b"ICC_PROFILE\0".to_vec();
            v.extend_from_slice(&[seq, 2]);
            v.extend_from_slice(body);
            segment(jpeg_code::APP0 + 2, &v)
        };

        let data = stream(&[
            chunk(1, &[1, 2, 3]),
            segment(jpeg_code::APP0 + 2, b"SOMETHING_ELSE_ENTIRELY"),
            chunk(2, &[4, 5]),
            sof(jpeg_code::SOF0, 8, 8, 1),
        ]);

        let decoder = parse(&data, true).unwrap();
        assert_eq!(
            decoder.metadata().icc_profile.as_deref(),
            Some(&[1u8, 2, 3, 4, 5][..])
        );

        // ignored entirely when metadata is not wanted
        let mut decoder = JpegDecoder::new(EnabledFeatures {
            ignore_metadata: true,
            ..EnabledFeatures::default()
        });
        decoder.parse_stream(Cursor::new(&data), true).unwrap();
        assert_eq!(decoder.metadata().icc_profile, None);
    }

    #[test]
    fn adobe_transform_selects_color_space() {
        let adobe = |transform: u8| {
            segment(
                jpeg_code::APP0 + 14,
                &[b'A', b'd', b'o', b'b', b'e', 0, 100, 0, 0, 0, 0, transform],
            )
        };

        let data = stream(&[adobe(0), sof(jpeg_code::SOF0, 8, 8, 3)]);
        assert_eq!(parse(&data, false).unwrap().color_space(), Some(ColorSpace::Rgb));

        let data = stream(&[adobe(2), sof(jpeg_code::SOF0, 8, 8, 4)]);
        let decoder = parse(&data, false).unwrap();
        assert_eq!(decoder.color_space(), Some(ColorSpace::Ycck));
        assert_eq!(decoder.adobe().unwrap().dct_encode_version, 100);

        let data = stream(&[sof(jpeg_code::SOF0, 8, 8, 4)]);
        assert_eq!(parse(&data, false).unwrap().color_space(), Some(ColorSpace::Cmyk));

        let data = stream(&[sof(jpeg_code::SOF0, 8, 8, 2)]);
        assert_eq!(parse_error(&data, false), ExitCode::UnsupportedColorMode);
    }

    #[test]
    fn metadata_only_stops_at_scan() {
        // the scan header would be invalid, but is never looked at
        let data = stream(&[
            sof(jpeg_code::SOF0, 20, 10, 1),
            segment(jpeg_code::SOS, &[0]),
            segment(jpeg_code::APP0, b"JFIF\0\x01\x02\x01\x00\x48\x00\x48\x00\x00"),
        ]);

        let mut decoder = JpegDecoder::new(EnabledFeatures::default());
        let info = decoder.identify(Cursor::new(&data)).unwrap();

        assert_eq!((info.width, info.height, info.bits_per_pixel), (20, 10, 8));
        assert_eq!(info.metadata.horizontal_resolution, 96.0);
    }

    #[test]
    fn bad_marker_length() {
        let mut data = vec![0xff, jpeg_code::SOI, 0xff, jpeg_code::COM, 0, 1];
        data.extend_from_slice(&[0xff, jpeg_code::EOI]);
        assert_eq!(parse_error(&data, false), ExitCode::BadSegmentLength);
    }
}
