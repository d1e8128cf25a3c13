/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use log::info;

use super::app_markers::{AdobeMarker, ADOBE_TRANSFORM_UNKNOWN, ADOBE_TRANSFORM_YCCK};
use super::block_based_image::{AlignedBlock, BlockBasedImage};
use super::component_info::ComponentInfo;
use super::jpeg_code;
use crate::consts::JpegType;
use crate::enabled_features::EnabledFeatures;
use crate::helpers::*;
use crate::jpeg_error::{err_exit_code, AddContext, ExitCode, Result};

/// How the components of the image are to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Grayscale,
    YCbCr,
    Rgb,
    Ycck,
    Cmyk,
}

/// Picks the color space from the component count and the Adobe APP14 transform flag.
pub fn deduce_color_space(
    component_count: usize,
    adobe: Option<&AdobeMarker>,
) -> Result<ColorSpace> {
    match component_count {
        1 => Ok(ColorSpace::Grayscale),
        3 => match adobe {
            Some(a) if a.color_transform == ADOBE_TRANSFORM_UNKNOWN => Ok(ColorSpace::Rgb),
            _ => Ok(ColorSpace::YCbCr),
        },
        4 => match adobe {
            Some(a) if a.color_transform == ADOBE_TRANSFORM_YCCK => Ok(ColorSpace::Ycck),
            _ => Ok(ColorSpace::Cmyk),
        },
        _ => err_exit_code(
            ExitCode::UnsupportedColorMode,
            format!(
                "Unsupported color mode. Max components 4; found {0}",
                component_count
            ),
        ),
    }
}

/// Geometry of the image as declared by the start-of-frame segment, together with the
/// coefficient storage of each component once it has been initialized.
pub struct Frame {
    pub jpeg_type: JpegType,

    /// true for SOF1, extended sequential
    pub extended: bool,

    /// sample precision in bits, always 8
    pub precision: u8,

    /// height of the image in pixels
    pub scanlines: u32,

    /// width of the image in pixels
    pub samples_per_line: u32,

    pub components: Vec<ComponentInfo>,

    pub max_horizontal_factor: u32,
    pub max_vertical_factor: u32,

    pub mcus_per_line: u32,
    pub mcus_per_column: u32,

    /// coefficients in raster order, one entry per component after `init_components`
    pub component_blocks: Vec<BlockBasedImage>,
}

impl Frame {
    /// Parses the payload of a SOF0/SOF1/SOF2 segment.
    pub fn start(
        code: u8,
        segment: &[u8],
        enabled_features: &EnabledFeatures,
    ) -> Result<Frame> {
        if segment.len() < 6 {
            return err_exit_code(ExitCode::BadSegmentLength, "SOF segment too short");
        }

        let precision = segment[0];
        if precision != 8 {
            return err_exit_code(
                ExitCode::UnsupportedPrecision,
                format!("{0} bit samples are not supported", precision),
            );
        }

        let scanlines = u32::from(b_short(segment[1], segment[2]));
        let samples_per_line = u32::from(b_short(segment[3], segment[4]));
        let component_count = usize::from(segment[5]);

        if component_count == 0 || component_count > 4 {
            return err_exit_code(
                ExitCode::UnsupportedColorMode,
                format!(
                    "Unsupported color mode. Max components 4; found {0}",
                    component_count
                ),
            );
        }

        if segment.len() != 6 + 3 * component_count {
            return err_exit_code(
                ExitCode::BadSegmentLength,
                format!(
                    "SOF with {0} components has {1} bytes",
                    component_count,
                    segment.len()
                ),
            );
        }

        if scanlines == 0 || samples_per_line == 0 {
            return err_exit_code(
                ExitCode::UnsupportedJpeg,
                "image dimensions must be non-zero",
            );
        }

        if samples_per_line > enabled_features.max_jpeg_width
            || scanlines > enabled_features.max_jpeg_height
        {
            return err_exit_code(
                ExitCode::UnsupportedJpeg,
                format!(
                    "image of {0}x{1} exceeds the maximum of {2}x{3}",
                    samples_per_line,
                    scanlines,
                    enabled_features.max_jpeg_width,
                    enabled_features.max_jpeg_height
                ),
            );
        }

        let mut components = Vec::with_capacity(component_count);
        let mut max_horizontal_factor = 1;
        let mut max_vertical_factor = 1;

        for i in 0..component_count {
            let c = &segment[6 + 3 * i..9 + 3 * i];

            let horizontal_factor = u32::from(lbits(c[1], 4));
            let vertical_factor = u32::from(rbits(c[1], 4));
            let q_table_index = c[2];

            if !(1..=4).contains(&horizontal_factor) || !(1..=4).contains(&vertical_factor) {
                return err_exit_code(
                    ExitCode::MalformedSegment,
                    format!(
                        "sampling factors {0}x{1} of component {2} out of range",
                        horizontal_factor, vertical_factor, c[0]
                    ),
                );
            }

            if q_table_index > 3 {
                return err_exit_code(
                    ExitCode::MalformedSegment,
                    format!("quantization table {0} out of range", q_table_index),
                );
            }

            max_horizontal_factor = max_horizontal_factor.max(horizontal_factor);
            max_vertical_factor = max_vertical_factor.max(vertical_factor);

            components.push(ComponentInfo::new(
                c[0],
                horizontal_factor,
                vertical_factor,
                q_table_index,
            ));
        }

        Ok(Frame {
            jpeg_type: if code == jpeg_code::SOF2 {
                JpegType::Progressive
            } else {
                JpegType::Sequential
            },
            extended: code == jpeg_code::SOF1,
            precision,
            scanlines,
            samples_per_line,
            components,
            max_horizontal_factor,
            max_vertical_factor,
            mcus_per_line: div_ceil_u32(samples_per_line, 8 * max_horizontal_factor),
            mcus_per_column: div_ceil_u32(scanlines, 8 * max_vertical_factor),
            component_blocks: Vec::new(),
        })
    }

    pub fn is_progressive(&self) -> bool {
        self.jpeg_type == JpegType::Progressive
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Computes the block geometry of every component and allocates zeroed coefficient
    /// storage padded to whole MCUs.
    pub fn init_components(&mut self, enabled_features: &EnabledFeatures) -> Result<()> {
        let mut total_blocks: u64 = 0;

        for c in self.components.iter_mut() {
            let component_width = div_ceil_u32(
                self.samples_per_line * c.horizontal_factor,
                self.max_horizontal_factor,
            );
            let component_height =
                div_ceil_u32(self.scanlines * c.vertical_factor, self.max_vertical_factor);

            c.width_in_blocks = div_ceil_u32(component_width, 8);
            c.height_in_blocks = div_ceil_u32(component_height, 8);
            c.blocks_per_line = self.mcus_per_line * c.horizontal_factor;
            c.blocks_per_column = self.mcus_per_column * c.vertical_factor;

            total_blocks += u64::from(c.blocks_per_line) * u64::from(c.blocks_per_column);
        }

        let total_bytes = total_blocks * std::mem::size_of::<AlignedBlock>() as u64;
        if total_bytes > enabled_features.max_allocation_bytes {
            return err_exit_code(
                ExitCode::OutOfMemory,
                format!(
                    "coefficient storage of {0} bytes exceeds limit of {1}",
                    total_bytes, enabled_features.max_allocation_bytes
                ),
            );
        }

        self.component_blocks = Vec::with_capacity(self.components.len());
        for c in &self.components {
            self.component_blocks
                .push(BlockBasedImage::new(c.blocks_per_line, c.blocks_per_column).context()?);
        }

        info!(
            "frame {0}x{1} with {2} components, {3}x{4} MCUs",
            self.samples_per_line,
            self.scanlines,
            self.components.len(),
            self.mcus_per_line,
            self.mcus_per_column
        );

        Ok(())
    }

    /// Finds the index of the component with the given id
    pub fn component_index(&self, id: u8) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sof_segment(width: u16, height: u16, components: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut v = vec![8u8];
        v.extend_from_slice(&height.to_be_bytes());
        v.extend_from_slice(&width.to_be_bytes());
        v.push(components.len() as u8);
        for (id, hv, tq) in components {
            v.extend_from_slice(&[*id, *hv, *tq]);
        }
        v
    }

    #[test]
    fn mcu_grid_rounds_up() {
        let segment = sof_segment(100, 100, &[(1, 0x22, 0), (2, 0x11, 1), (3, 0x11, 1)]);
        let mut frame = Frame::start(jpeg_code::SOF0, &segment, &EnabledFeatures::default())
            .unwrap();

        assert_eq!(frame.max_horizontal_factor, 2);
        assert_eq!(frame.max_vertical_factor, 2);
        assert_eq!(frame.mcus_per_line, 7);
        assert_eq!(frame.mcus_per_column, 7);

        frame.init_components(&EnabledFeatures::default()).unwrap();

        let luma = &frame.components[0];
        assert_eq!((luma.width_in_blocks, luma.height_in_blocks), (13, 13));
        assert_eq!((luma.blocks_per_line, luma.blocks_per_column), (14, 14));

        let chroma = &frame.components[1];
        assert_eq!((chroma.width_in_blocks, chroma.height_in_blocks), (7, 7));
        assert_eq!((chroma.blocks_per_line, chroma.blocks_per_column), (7, 7));

        assert_eq!(frame.component_blocks[0].get_block_width(), 14);
        assert_eq!(frame.component_index(3), Some(2));
        assert_eq!(frame.component_index(4), None);
    }

    #[test]
    fn frame_type_from_marker() {
        let segment = sof_segment(8, 8, &[(1, 0x11, 0)]);
        let f = Frame::start(jpeg_code::SOF2, &segment, &EnabledFeatures::default()).unwrap();
        assert!(f.is_progressive());
        assert!(!f.extended);

        let f = Frame::start(jpeg_code::SOF1, &segment, &EnabledFeatures::default()).unwrap();
        assert!(!f.is_progressive());
        assert!(f.extended);
    }

    #[test]
    fn frame_errors() {
        let features = EnabledFeatures::default();

        let mut segment = sof_segment(8, 8, &[(1, 0x11, 0)]);
        segment[0] = 12;
        assert_eq!(
            Frame::start(jpeg_code::SOF1, &segment, &features)
                .err()
                .unwrap()
                .exit_code(),
            ExitCode::UnsupportedPrecision
        );

        let mut segment = sof_segment(8, 8, &[(1, 0x11, 0)]);
        segment.push(0);
        assert_eq!(
            Frame::start(jpeg_code::SOF0, &segment, &features)
                .err()
                .unwrap()
                .exit_code(),
            ExitCode::BadSegmentLength
        );

        let segment = sof_segment(8, 8, &[(1, 0x51, 0)]);
        assert_eq!(
            Frame::start(jpeg_code::SOF0, &segment, &features)
                .err()
                .unwrap()
                .exit_code(),
            ExitCode::MalformedSegment
        );

        let segment = sof_segment(0, 8, &[(1, 0x11, 0)]);
        assert_eq!(
            Frame::start(jpeg_code::SOF0, &segment, &features)
                .err()
                .unwrap()
                .exit_code(),
            ExitCode::UnsupportedJpeg
        );

        let small = EnabledFeatures {
            max_jpeg_width: 16,
            ..EnabledFeatures::default()
        };
        let segment = sof_segment(17, 8, &[(1, 0x11, 0)]);
        assert_eq!(
            Frame::start(jpeg_code::SOF0, &segment, &small)
                .err()
                .unwrap()
                .exit_code(),
            ExitCode::UnsupportedJpeg
        );
    }

    #[test]
    fn allocation_limit() {
        let segment = sof_segment(64, 64, &[(1, 0x11, 0)]);
        let mut frame =
            Frame::start(jpeg_code::SOF0, &segment, &EnabledFeatures::default()).unwrap();

        let tight = EnabledFeatures {
            max_allocation_bytes: 63 * 128,
            ..EnabledFeatures::default()
        };
        assert_eq!(
            frame.init_components(&tight).unwrap_err().exit_code(),
            ExitCode::OutOfMemory
        );
    }

    #[test]
    fn color_space_deduction() {
        let unknown = AdobeMarker {
            color_transform: ADOBE_TRANSFORM_UNKNOWN,
            ..AdobeMarker::default()
        };
        let ycck = AdobeMarker {
            color_transform: ADOBE_TRANSFORM_YCCK,
            ..AdobeMarker::default()
        };
        let ycbcr = AdobeMarker {
            color_transform: super::super::app_markers::ADOBE_TRANSFORM_YCBCR,
            ..AdobeMarker::default()
        };

        assert_eq!(deduce_color_space(1, None).unwrap(), ColorSpace::Grayscale);
        assert_eq!(deduce_color_space(3, None).unwrap(), ColorSpace::YCbCr);
        assert_eq!(deduce_color_space(3, Some(&ycbcr)).unwrap(), ColorSpace::YCbCr);
        assert_eq!(deduce_color_space(3, Some(&unknown)).unwrap(), ColorSpace::Rgb);
        assert_eq!(deduce_color_space(4, Some(&ycck)).unwrap(), ColorSpace::Ycck);
        assert_eq!(deduce_color_space(4, None).unwrap(), ColorSpace::Cmyk);
        assert_eq!(
            deduce_color_space(2, None).unwrap_err().exit_code(),
            ExitCode::UnsupportedColorMode
        );
    }
}
