/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use super::frame::ColorSpace;

/// One row of samples (0..255) of each component, all upsampled to the image resolution.
pub struct ComponentValues<'a> {
    components: [&'a [f32]; 4],
    component_count: usize,
}

impl<'a> ComponentValues<'a> {
    pub fn new(rows: &[&'a [f32]]) -> Self {
        let mut components: [&[f32]; 4] = [&[]; 4];
        components[..rows.len()].copy_from_slice(rows);

        ComponentValues {
            components,
            component_count: rows.len(),
        }
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    #[inline(always)]
    fn get(&self, component: usize, x: usize) -> f32 {
        self.components[component][x]
    }
}

const YCBCR_CR_TO_R: f32 = 1.402;
const YCBCR_CB_TO_G: f32 = 0.344136;
const YCBCR_CR_TO_G: f32 = 0.714136;
const YCBCR_CB_TO_B: f32 = 1.772;

#[inline(always)]
fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> (f32, f32, f32) {
    let cb = cb - 128.0;
    let cr = cr - 128.0;

    (
        y + YCBCR_CR_TO_R * cr,
        y - YCBCR_CB_TO_G * cb - YCBCR_CR_TO_G * cr,
        y + YCBCR_CB_TO_B * cb,
    )
}

/// Converts component samples of one color space into normalized RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegColorConverter {
    color_space: ColorSpace,
}

impl JpegColorConverter {
    pub fn new(color_space: ColorSpace) -> Self {
        JpegColorConverter { color_space }
    }

    /// number of components the converter reads from each row
    pub fn component_count(&self) -> usize {
        match self.color_space {
            ColorSpace::Grayscale => 1,
            ColorSpace::YCbCr | ColorSpace::Rgb => 3,
            ColorSpace::Ycck | ColorSpace::Cmyk => 4,
        }
    }

    /// Fills `result` with normalized RGBA values in [0,1] (the color channels may fall
    /// outside the range and are clamped when packed). Alpha is always 1.
    pub fn convert_to_rgba(&self, values: &ComponentValues, result: &mut [[f32; 4]]) {
        debug_assert!(values.component_count() >= self.component_count());

        const SCALE: f32 = 1.0 / 255.0;

        match self.color_space {
            ColorSpace::Grayscale => {
                for (x, px) in result.iter_mut().enumerate() {
                    let y = values.get(0, x) * SCALE;
                    *px = [y, y, y, 1.0];
                }
            }
            ColorSpace::YCbCr => {
                for (x, px) in result.iter_mut().enumerate() {
                    let (r, g, b) =
                        ycbcr_to_rgb(values.get(0, x), values.get(1, x), values.get(2, x));
                    *px = [r * SCALE, g * SCALE, b * SCALE, 1.0];
                }
            }
            ColorSpace::Rgb => {
                for (x, px) in result.iter_mut().enumerate() {
                    *px = [
                        values.get(0, x) * SCALE,
                        values.get(1, x) * SCALE,
                        values.get(2, x) * SCALE,
                        1.0,
                    ];
                }
            }
            ColorSpace::Cmyk => {
                for (x, px) in result.iter_mut().enumerate() {
                    let k = values.get(3, x) * SCALE;
                    *px = [
                        values.get(0, x) * k * SCALE,
                        values.get(1, x) * k * SCALE,
                        values.get(2, x) * k * SCALE,
                        1.0,
                    ];
                }
            }
            ColorSpace::Ycck => {
                for (x, px) in result.iter_mut().enumerate() {
                    let (r, g, b) =
                        ycbcr_to_rgb(values.get(0, x), values.get(1, x), values.get(2, x));
                    let k = values.get(3, x) * SCALE;

                    *px = [
                        (255.0 - r.round()) * k * SCALE,
                        (255.0 - g.round()) * k * SCALE,
                        (255.0 - b.round()) * k * SCALE,
                        1.0,
                    ];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Bgra32;

    fn convert(color_space: ColorSpace, samples: &[f32]) -> Bgra32 {
        let rows: Vec<&[f32]> = samples.iter().map(std::slice::from_ref).collect();
        let values = ComponentValues::new(&rows);

        let mut result = [[0f32; 4]; 1];
        JpegColorConverter::new(color_space).convert_to_rgba(&values, &mut result);

        assert_eq!(result[0][3], 1.0);
        Bgra32::from_normalized(result[0][0], result[0][1], result[0][2])
    }

    #[test]
    fn grayscale() {
        assert_eq!(
            convert(ColorSpace::Grayscale, &[77.0]),
            Bgra32::new(77, 77, 77, 255)
        );
    }

    #[test]
    fn ycbcr_neutral_and_primaries() {
        // no chroma means gray
        assert_eq!(
            convert(ColorSpace::YCbCr, &[100.0, 128.0, 128.0]),
            Bgra32::new(100, 100, 100, 255)
        );

        // r = 76 + 1.402 * 127 = 254.05, g = 76 + 0.344136 * 43 - 0.714136 * 127 = 0.1
        // b = 76 - 1.772 * 43 = -0.2
        assert_eq!(
            convert(ColorSpace::YCbCr, &[76.0, 85.0, 255.0]),
            Bgra32::new(254, 0, 0, 255)
        );
    }

    #[test]
    fn rgb_passthrough() {
        assert_eq!(
            convert(ColorSpace::Rgb, &[10.0, 20.0, 30.0]),
            Bgra32::new(10, 20, 30, 255)
        );
    }

    #[test]
    fn cmyk_scales_by_k() {
        assert_eq!(
            convert(ColorSpace::Cmyk, &[200.0, 100.0, 0.0, 255.0]),
            Bgra32::new(200, 100, 0, 255)
        );

        // k = 0 turns everything black
        assert_eq!(
            convert(ColorSpace::Cmyk, &[200.0, 100.0, 50.0, 0.0]),
            Bgra32::new(0, 0, 0, 255)
        );
    }

    #[test]
    fn ycck_inverts_the_ycbcr_result() {
        // gray 55 inverts to 200, full k keeps it
        assert_eq!(
            convert(ColorSpace::Ycck, &[55.0, 128.0, 128.0, 255.0]),
            Bgra32::new(200, 200, 200, 255)
        );
    }

    #[test]
    fn component_counts() {
        assert_eq!(JpegColorConverter::new(ColorSpace::Grayscale).component_count(), 1);
        assert_eq!(JpegColorConverter::new(ColorSpace::Rgb).component_count(), 3);
        assert_eq!(JpegColorConverter::new(ColorSpace::Ycck).component_count(), 4);
    }
}
