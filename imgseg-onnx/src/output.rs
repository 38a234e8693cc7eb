//! Decoder output to raster conversion

use imgseg_core::{MaskRaster, Result, Rgba, SegmentError};

/// Convert a `(1, 1, H, W)`-style logits buffer into a `W x H` raster.
///
/// Pixel `i` gets `color` when `data[i] > 0.0`; everything else stays
/// transparent. Only the first `H * W` values (the first mask) are read.
pub fn output_to_raster(dims: &[i64], data: &[f32], color: Rgba) -> Result<MaskRaster> {
    if dims.len() < 4 {
        return Err(SegmentError::Inference(format!(
            "Expected a 4-D mask output, got {:?}",
            dims
        )));
    }
    let height = dims[2];
    let width = dims[3];
    if height <= 0 || width <= 0 || height > u32::MAX as i64 || width > u32::MAX as i64 {
        return Err(SegmentError::Inference(format!("Invalid mask size {}x{}", width, height)));
    }

    let (width, height) = (width as u32, height as u32);
    let plane = width as usize * height as usize;
    if data.len() < plane {
        return Err(SegmentError::Inference(format!(
            "Mask output has {} values, expected at least {}",
            data.len(),
            plane
        )));
    }

    let mut pixels = Vec::with_capacity(plane * 4);
    for value in &data[..plane] {
        let pixel = if *value > 0.0 { color } else { Rgba::TRANSPARENT };
        pixels.extend_from_slice(&<[u8; 4]>::from(pixel));
    }
    MaskRaster::from_rgba(width, height, pixels)
}
