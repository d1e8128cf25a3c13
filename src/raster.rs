/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use bytemuck::{Pod, Zeroable};

use crate::jpeg_error::{err_exit_code, ExitCode, Result};

/// A packed 8-bit pixel in blue, green, red, alpha memory order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Bgra32 {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Bgra32 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Bgra32 { b, g, r, a }
    }

    /// Packs normalized [0,1] channels, rounding to the nearest 8-bit value. The alpha
    /// channel is always opaque since JPEG has no transparency.
    #[inline(always)]
    pub fn from_normalized(r: f32, g: f32, b: f32) -> Self {
        Bgra32 {
            b: to_byte(b),
            g: to_byte(g),
            r: to_byte(r),
            a: 255,
        }
    }
}

#[inline(always)]
fn to_byte(v: f32) -> u8 {
    (v * 255.0).clamp(0.0, 255.0).round() as u8
}

/// Destination for decoded pixels. Every pixel is written exactly once by the post processor.
pub trait PixelSink {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn set(&mut self, y: u32, x: u32, pixel: Bgra32);
}

/// Minimal owned raster of packed BGRA pixels, row-major with no padding.
#[derive(Clone, Debug)]
pub struct ImageBgra32 {
    width: u32,
    height: u32,
    pixels: Vec<Bgra32>,
}

impl ImageBgra32 {
    /// Allocates a transparent black image of the given size.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let len = usize::try_from(u64::from(width) * u64::from(height))?;

        let mut pixels = Vec::new();
        if pixels.try_reserve_exact(len).is_err() {
            return err_exit_code(
                ExitCode::OutOfMemory,
                format!("unable to allocate {0}x{1} raster", width, height),
            );
        }
        pixels.resize(len, Bgra32::default());

        Ok(ImageBgra32 {
            width,
            height,
            pixels,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Bgra32 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn row(&self, y: u32) -> &[Bgra32] {
        let start = (y * self.width) as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn pixels(&self) -> &[Bgra32] {
        &self.pixels
    }

    /// raw bytes of the image in B,G,R,A order
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

impl PixelSink for ImageBgra32 {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    fn set(&mut self, y: u32, x: u32, pixel: Bgra32) {
        let w = self.width;
        self.pixels[(y * w + x) as usize] = pixel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_values_round_and_clamp() {
        let p = Bgra32::from_normalized(1.5, -0.2, 0.5);
        assert_eq!(p, Bgra32::new(255, 0, 128, 255));

        let p = Bgra32::from_normalized(100.4 / 255.0, 100.6 / 255.0, 0.0);
        assert_eq!((p.r, p.g), (100, 101));
    }

    #[test]
    fn byte_layout_is_bgra() {
        let mut image = ImageBgra32::new(2, 1).unwrap();
        image.set(0, 1, Bgra32::new(1, 2, 3, 4));

        assert_eq!(image.as_bytes(), &[0, 0, 0, 0, 3, 2, 1, 4]);
        assert_eq!(image.pixel(1, 0).r, 1);
        assert_eq!(image.row(0).len(), 2);
    }
}
