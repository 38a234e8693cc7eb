//! Loaded source image

use crate::error::{Result, SegmentError};
use bytes::Bytes;
use std::io::Cursor;
use std::path::Path;

/// Encoded image bytes plus decoded dimensions.
///
/// The bytes are uploaded to the backend as-is; only the header is decoded
/// here to learn the size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    file_name: String,
    bytes: Bytes,
    width: u32,
    height: u32,
}

impl ImageSource {
    /// Decode dimensions from encoded bytes (PNG, JPEG, ...)
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self> {
        let file_name = file_name.into();
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SegmentError::InvalidInput(format!("Image {} is empty", file_name)));
        }

        let (width, height) = image::io::Reader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()?
            .into_dimensions()?;
        if width == 0 || height == 0 {
            return Err(SegmentError::InvalidInput(format!(
                "Image {} has zero size",
                file_name
            )));
        }

        tracing::debug!("Loaded image {} ({}x{}, {} bytes)", file_name, width, height, bytes.len());
        Ok(Self {
            file_name,
            bytes,
            width,
            height,
        })
    }

    /// Read and decode an image file
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.png")
            .to_string();
        Self::from_bytes(file_name, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Encoded bytes (cheap to clone)
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
    out.into_inner()
}
