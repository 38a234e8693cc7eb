//! Decoder input assembly

use imgseg_core::{EmbeddingTensor, Point, PointLabel, Result, SegmentError};
use std::sync::Arc;

/// Side length of the low-resolution `mask_input` plane
pub const MASK_INPUT_SIZE: usize = 256;

/// Label of the padding point appended when no box prompt is present
pub const PADDING_LABEL: f32 = -1.0;

/// Fixed scale descriptor handed to the decoder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelScale {
    /// Factor applied to point coordinates
    pub sam_scale: f32,
    /// Original image height in pixels
    pub height: u32,
    /// Original image width in pixels
    pub width: u32,
}

impl ModelScale {
    pub fn new(sam_scale: f32, width: u32, height: u32) -> Self {
        Self {
            sam_scale,
            height,
            width,
        }
    }
}

/// Everything one decoder run consumes
#[derive(Debug, Clone)]
pub struct DecoderInput {
    pub embedding: Arc<EmbeddingTensor>,
    /// `[N + 1, 2]` flattened, padding point last
    pub point_coords: Vec<f32>,
    /// `[N + 1]`, padding label last
    pub point_labels: Vec<f32>,
    /// `[height, width]`
    pub orig_im_size: [f32; 2],
}

impl DecoderInput {
    /// Build decoder input from clicks. At least one point is required.
    pub fn build(
        points: &[Point],
        embedding: Arc<EmbeddingTensor>,
        scale: ModelScale,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(SegmentError::InvalidInput("Decoder needs at least one point".to_string()));
        }
        if scale.width == 0 || scale.height == 0 {
            return Err(SegmentError::InvalidInput("Model scale has zero size".to_string()));
        }

        let mut point_coords = Vec::with_capacity((points.len() + 1) * 2);
        let mut point_labels = Vec::with_capacity(points.len() + 1);
        for p in points {
            p.validate()?;
            point_coords.push(p.x as f32 * scale.sam_scale);
            point_coords.push(p.y as f32 * scale.sam_scale);
            point_labels.push(match p.label {
                PointLabel::Foreground => 1.0,
                PointLabel::Background => 0.0,
            });
        }
        point_coords.extend_from_slice(&[0.0, 0.0]);
        point_labels.push(PADDING_LABEL);

        Ok(Self {
            embedding,
            point_coords,
            point_labels,
            orig_im_size: [scale.height as f32, scale.width as f32],
        })
    }

    /// Number of points including padding
    pub fn point_count(&self) -> usize {
        self.point_labels.len()
    }
}
