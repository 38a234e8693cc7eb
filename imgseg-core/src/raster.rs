//! Displayable RGBA mask rasters

use crate::error::{Result, SegmentError};
use crate::mask::MaskBitmap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 4]", into = "[u8; 4]")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const OVERLAY_BLUE: Rgba = Rgba::new(0, 114, 189, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<[u8; 4]> for Rgba {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Rgba> for [u8; 4] {
    fn from(c: Rgba) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

/// A `width x height` RGBA overlay, row-major, 4 bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskRaster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl MaskRaster {
    /// Fully transparent raster
    pub fn transparent(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            pixels: vec![0; len],
        }
    }

    /// Wrap an existing RGBA buffer. The buffer length must be `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| SegmentError::InvalidInput("Raster dimensions overflow".to_string()))?;
        if pixels.len() != expected {
            return Err(SegmentError::InvalidInput(format!(
                "RGBA buffer of {} bytes does not match {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes
    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    /// Color at `(x, y)`, or `None` out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Rgba::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ))
    }

    /// Paint the pixel at flat index `i` (row-major)
    pub fn paint_index(&mut self, i: usize, color: Rgba) {
        let o = i * 4;
        if o + 3 < self.pixels.len() {
            self.pixels[o..o + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    /// Paint every foreground pixel of `bitmap`. Pixels outside the raster are skipped.
    pub fn paint_bitmap(&mut self, bitmap: &MaskBitmap, color: Rgba) {
        let w = bitmap.width().min(self.width);
        let h = bitmap.height().min(self.height);
        for y in 0..h {
            for x in 0..w {
                if bitmap.get(x, y) {
                    self.paint_index(y as usize * self.width as usize + x as usize, color);
                }
            }
        }
    }

    /// Number of non-transparent pixels
    pub fn painted_count(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    /// Write the raster as a PNG file
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| {
                SegmentError::Export("Raster buffer does not match its size".to_string())
            })?;
        img.save_with_format(path, image::ImageFormat::Png)?;
        tracing::debug!("Wrote {}x{} overlay to {:?}", self.width, self.height, path);
        Ok(())
    }
}
