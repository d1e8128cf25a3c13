/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Turns the decoded coefficients into pixels, a fixed number of rows at a time:
//! dequantization, IDCT, upsampling, color conversion and packing into the destination.
//! Memory use only depends on the width of the image, not on its height.

#[cfg(feature = "detailed_tracing")]
use log::info;

use super::block_based_image::BlockBasedImage;
use super::color_convert::{ComponentValues, JpegColorConverter};
use super::component_info::ComponentInfo;
use super::frame::ColorSpace;
use super::idct::run_idct;
use super::quantization_tables::QuantizationTables;
use crate::consts::*;
use crate::jpeg_error::{err_exit_code, ExitCode, Result};
use crate::raster::{Bgra32, PixelSink};

/// Read-only view of a decoded JPEG as needed for producing pixels.
pub trait RawJpegData {
    /// (width, height) of the image
    fn image_size_in_pixels(&self) -> (u32, u32);

    fn color_space(&self) -> ColorSpace;

    /// quantization table of the slot in storage order
    fn quantization_table(&self, slot: usize) -> Option<&[u16; 64]>;

    fn components(&self) -> &[ComponentInfo];

    /// coefficient storage of the component with the given index
    fn component_blocks(&self, index: usize) -> Option<&BlockBasedImage>;

    /// (horizontal, vertical) maximum sampling factors of the frame
    fn max_sampling_factors(&self) -> (u32, u32);

    fn mcus_per_line(&self) -> u32;

    fn component_count(&self) -> usize {
        self.components().len()
    }
}

/// Converts the blocks of one component into rows of samples at image resolution.
struct ComponentPostProcessor {
    index: usize,
    horizontal_factor: u32,
    vertical_factor: u32,
    max_horizontal_factor: u32,
    max_vertical_factor: u32,
    quantization_table: QuantizationTables,

    /// upsampled samples for the rows of the current step
    color_buffer: Vec<f32>,
    buffer_width: usize,

    /// level shifted IDCT output for the block rows that cover the current step
    sample_rows: Vec<u8>,
}

impl ComponentPostProcessor {
    fn new(
        raw_jpeg: &dyn RawJpegData,
        index: usize,
        component: &ComponentInfo,
        buffer_width: usize,
    ) -> Result<Self> {
        let q = match raw_jpeg.quantization_table(usize::from(component.q_table_index)) {
            Some(q) => q,
            None => {
                return err_exit_code(
                    ExitCode::MalformedSegment,
                    format!(
                        "component {0} uses undefined quantization table {1}",
                        component.id, component.q_table_index
                    ),
                )
            }
        };

        let (max_horizontal_factor, max_vertical_factor) = raw_jpeg.max_sampling_factors();

        Ok(ComponentPostProcessor {
            index,
            horizontal_factor: component.horizontal_factor,
            vertical_factor: component.vertical_factor,
            max_horizontal_factor,
            max_vertical_factor,
            quantization_table: QuantizationTables::new_from_table(q),
            color_buffer: vec![0.0; buffer_width * PIXEL_ROWS_PER_STEP as usize],
            buffer_width,
            sample_rows: Vec::new(),
        })
    }

    /// row of the component sample grid that image row `y` maps to
    #[inline(always)]
    fn component_row(&self, y: u32) -> u32 {
        y * self.vertical_factor / self.max_vertical_factor
    }

    /// Runs the IDCT over the block rows that cover image rows `y0..y1` and fills the
    /// color buffer, replicating samples of subsampled components.
    fn copy_blocks_to_color_buffer(&mut self, raw_jpeg: &dyn RawJpegData, y0: u32, y1: u32) -> Result<()> {
        let blocks = match raw_jpeg.component_blocks(self.index) {
            Some(b) => b,
            None => {
                return err_exit_code(
                    ExitCode::AssertionFailure,
                    format!("no coefficients for component {0}", self.index),
                )
            }
        };

        let block_row_start = self.component_row(y0) / 8;
        let block_row_end = self.component_row(y1 - 1) / 8 + 1;

        let sample_width = blocks.get_block_width() as usize * 8;
        self.sample_rows
            .resize((block_row_end - block_row_start) as usize * 8 * sample_width, 0);

        let q = self.quantization_table.get_quantization_table();

        for by in block_row_start..block_row_end {
            let row_offset = (by - block_row_start) as usize * 8;

            for bx in 0..blocks.get_block_width() {
                let pixels = run_idct(&blocks.get_block(bx, by).dequantize_columns(q));

                for (i, v) in pixels.get_block().iter().enumerate() {
                    // output is scaled by 8 and already carries the rounding bias
                    let sample = ((i32::from(*v) >> 3) + 128).clamp(0, 255) as u8;
                    self.sample_rows
                        [(row_offset + i / 8) * sample_width + bx as usize * 8 + i % 8] = sample;
                }
            }
        }

        for y in y0..y1 {
            let source_row = (self.component_row(y) - block_row_start * 8) as usize;
            let source = &self.sample_rows[source_row * sample_width..][..sample_width];

            let dest_row = (y - y0) as usize;
            let dest = &mut self.color_buffer[dest_row * self.buffer_width..][..self.buffer_width];

            for (x, d) in dest.iter_mut().enumerate() {
                let sx = x * self.horizontal_factor as usize / self.max_horizontal_factor as usize;
                *d = f32::from(source[sx]);
            }
        }

        Ok(())
    }

    fn row(&self, row: usize) -> &[f32] {
        &self.color_buffer[row * self.buffer_width..][..self.buffer_width]
    }
}

/// Produces the pixels of a decoded JPEG in steps of `PIXEL_ROWS_PER_STEP` rows.
pub struct PostProcessor<'a> {
    raw_jpeg: &'a dyn RawJpegData,
    width: u32,
    height: u32,
    pixel_row_counter: u32,
    component_processors: Vec<ComponentPostProcessor>,
    rgba_row: Vec<[f32; 4]>,
    color_converter: JpegColorConverter,
}

impl<'a> PostProcessor<'a> {
    pub fn new(raw_jpeg: &'a dyn RawJpegData) -> Result<Self> {
        let (width, height) = raw_jpeg.image_size_in_pixels();

        if raw_jpeg.component_count() == 0 {
            return err_exit_code(ExitCode::AssertionFailure, "no frame has been decoded");
        }

        let color_converter = JpegColorConverter::new(raw_jpeg.color_space());
        if color_converter.component_count() != raw_jpeg.component_count() {
            return err_exit_code(
                ExitCode::UnsupportedColorMode,
                format!(
                    "{0:?} needs {1} components, image has {2}",
                    raw_jpeg.color_space(),
                    color_converter.component_count(),
                    raw_jpeg.component_count()
                ),
            );
        }

        let (max_horizontal_factor, _) = raw_jpeg.max_sampling_factors();
        let buffer_width = (raw_jpeg.mcus_per_line() * max_horizontal_factor * 8) as usize;

        let mut component_processors = Vec::with_capacity(raw_jpeg.component_count());
        for (index, component) in raw_jpeg.components().iter().enumerate() {
            component_processors.push(ComponentPostProcessor::new(
                raw_jpeg,
                index,
                component,
                buffer_width,
            )?);
        }

        Ok(PostProcessor {
            raw_jpeg,
            width,
            height,
            pixel_row_counter: 0,
            component_processors,
            rgba_row: vec![[0.0; 4]; width as usize],
            color_converter,
        })
    }

    /// number of image rows processed so far, grows by `PIXEL_ROWS_PER_STEP` with each step
    pub fn pixel_row_counter(&self) -> u32 {
        self.pixel_row_counter
    }

    /// Processes all rows into the destination, which must have the size of the image.
    pub fn post_process(&mut self, destination: &mut dyn PixelSink) -> Result<()> {
        self.pixel_row_counter = 0;

        if (destination.width(), destination.height()) != (self.width, self.height) {
            return err_exit_code(
                ExitCode::SizeMismatch,
                format!(
                    "destination is {0}x{1} but the image is {2}x{3}",
                    destination.width(),
                    destination.height(),
                    self.width,
                    self.height
                ),
            );
        }

        while self.pixel_row_counter < self.height {
            self.step(destination)?;
        }

        Ok(())
    }

    /// Processes the next `PIXEL_ROWS_PER_STEP` rows (fewer at the bottom of the image).
    pub fn step(&mut self, destination: &mut dyn PixelSink) -> Result<()> {
        let y0 = self.pixel_row_counter;
        let y1 = self.height.min(y0 + PIXEL_ROWS_PER_STEP);

        #[cfg(feature = "detailed_tracing")]
        info!("post processing rows {0}..{1}", y0, y1);

        if y0 < y1 {
            for cpp in self.component_processors.iter_mut() {
                cpp.copy_blocks_to_color_buffer(self.raw_jpeg, y0, y1)?;
            }

            for y in y0..y1 {
                let row = (y - y0) as usize;

                let mut rows: [&[f32]; 4] = [&[]; 4];
                for (i, cpp) in self.component_processors.iter().enumerate() {
                    rows[i] = cpp.row(row);
                }

                let values = ComponentValues::new(&rows[..self.component_processors.len()]);
                self.color_converter
                    .convert_to_rgba(&values, &mut self.rgba_row);

                for (x, v) in self.rgba_row.iter().enumerate() {
                    destination.set(y, x as u32, Bgra32::from_normalized(v[0], v[1], v[2]));
                }
            }
        }

        self.pixel_row_counter += PIXEL_ROWS_PER_STEP;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enabled_features::EnabledFeatures;
    use crate::jpeg::frame::Frame;
    use crate::jpeg::jpeg_code;
    use crate::raster::ImageBgra32;

    struct TestJpeg {
        frame: Frame,
        q: [u16; 64],
        color_space: ColorSpace,
    }

    impl TestJpeg {
        fn new(width: u16, height: u16, components: &[u8], color_space: ColorSpace) -> Self {
            let mut segment = vec![8u8];
            segment.extend_from_slice(&height.to_be_bytes());
            segment.extend_from_slice(&width.to_be_bytes());
            segment.push(components.len() as u8);
            for (i, hv) in components.iter().enumerate() {
                segment.extend_from_slice(&[i as u8 + 1, *hv, 0]);
            }

            let mut frame =
                Frame::start(jpeg_code::SOF0, &segment, &EnabledFeatures::default()).unwrap();
            frame.init_components(&EnabledFeatures::default()).unwrap();

            TestJpeg {
                frame,
                q: [1; 64],
                color_space,
            }
        }
    }

    impl RawJpegData for TestJpeg {
        fn image_size_in_pixels(&self) -> (u32, u32) {
            (self.frame.samples_per_line, self.frame.scanlines)
        }

        fn color_space(&self) -> ColorSpace {
            self.color_space
        }

        fn quantization_table(&self, slot: usize) -> Option<&[u16; 64]> {
            if slot == 0 {
                Some(&self.q)
            } else {
                None
            }
        }

        fn components(&self) -> &[ComponentInfo] {
            &self.frame.components
        }

        fn component_blocks(&self, index: usize) -> Option<&BlockBasedImage> {
            self.frame.component_blocks.get(index)
        }

        fn max_sampling_factors(&self) -> (u32, u32) {
            (
                self.frame.max_horizontal_factor,
                self.frame.max_vertical_factor,
            )
        }

        fn mcus_per_line(&self) -> u32 {
            self.frame.mcus_per_line
        }
    }

    /// remembers which rows were written
    struct RowRecorder {
        width: u32,
        height: u32,
        written: Vec<bool>,
    }

    impl PixelSink for RowRecorder {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn set(&mut self, y: u32, _x: u32, _pixel: Bgra32) {
            self.written[y as usize] = true;
        }
    }

    #[test]
    fn dc_only_grayscale() {
        let mut jpeg = TestJpeg::new(8, 40, &[0x11], ColorSpace::Grayscale);

        // block row k is uniform with level k * 10 - 20
        for by in 0..5 {
            jpeg.frame.component_blocks[0]
                .get_block_mut(0, by)
                .set_coefficient(0, (by as i16 * 10 - 20) * 8);
        }

        let mut image = ImageBgra32::new(8, 40).unwrap();
        PostProcessor::new(&jpeg)
            .unwrap()
            .post_process(&mut image)
            .unwrap();

        for y in 0..40 {
            let level = (y / 8 * 10 + 108) as u8;
            for x in 0..8 {
                assert_eq!(image.pixel(x, y), Bgra32::new(level, level, level, 255));
            }
        }
    }

    #[test]
    fn steps_write_bounded_rows() {
        let jpeg = TestJpeg::new(8, 40, &[0x11], ColorSpace::Grayscale);
        let mut recorder = RowRecorder {
            width: 8,
            height: 40,
            written: vec![false; 40],
        };

        let mut pp = PostProcessor::new(&jpeg).unwrap();
        assert_eq!(pp.pixel_row_counter(), 0);

        pp.step(&mut recorder).unwrap();
        assert_eq!(pp.pixel_row_counter(), 32);
        assert!(recorder.written[..32].iter().all(|w| *w));
        assert!(recorder.written[32..].iter().all(|w| !*w));

        pp.step(&mut recorder).unwrap();
        assert_eq!(pp.pixel_row_counter(), 64);
        assert!(recorder.written.iter().all(|w| *w));
    }

    #[test]
    fn size_mismatch() {
        let jpeg = TestJpeg::new(8, 8, &[0x11], ColorSpace::Grayscale);
        let mut image = ImageBgra32::new(8, 9).unwrap();

        let e = PostProcessor::new(&jpeg)
            .unwrap()
            .post_process(&mut image)
            .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::SizeMismatch);
    }

    #[test]
    fn subsampled_component_is_replicated() {
        // red is stored at half resolution, green and blue at full resolution
        let mut jpeg = TestJpeg::new(16, 16, &[0x11, 0x22, 0x22], ColorSpace::Rgb);

        // a horizontal cosine in the red block, darker towards the right
        jpeg.frame.component_blocks[0]
            .get_block_mut(0, 0)
            .set_coefficient(1, 80);

        let mut image = ImageBgra32::new(16, 16).unwrap();
        PostProcessor::new(&jpeg)
            .unwrap()
            .post_process(&mut image)
            .unwrap();

        for y in 0..16 {
            for x in 0..8 {
                assert_eq!(image.pixel(2 * x, y).r, image.pixel(2 * x + 1, y).r);
            }
            for x in 0..16 {
                assert_eq!(image.pixel(x, y).r, image.pixel(x, 0).r);
                assert_eq!(image.pixel(x, y).g, 128);
                assert_eq!(image.pixel(x, y).b, 128);
            }
        }

        for x in 0..7 {
            assert!(image.pixel(2 * x, 0).r > image.pixel(2 * x + 2, 0).r);
        }
    }

    #[test]
    fn color_space_must_match_components() {
        let jpeg = TestJpeg::new(8, 8, &[0x11], ColorSpace::YCbCr);
        assert_eq!(
            PostProcessor::new(&jpeg).err().unwrap().exit_code(),
            ExitCode::UnsupportedColorMode
        );
    }
}
