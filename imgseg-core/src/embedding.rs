//! Precomputed image embeddings

use crate::error::{Result, SegmentError};

/// Nested `[batch][channel][height][width]` array as decoded from JSON
pub type NestedEmbedding = Vec<Vec<Vec<Vec<f32>>>>;

/// A `[1, C, H, W]` float tensor stored contiguously in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl EmbeddingTensor {
    /// Flatten the first batch entry of a nested array.
    ///
    /// Element `[0][c][h][w]` lands at `c*H*W + h*W + w`. Ragged input is
    /// rejected rather than padded.
    pub fn from_nested(nested: &NestedEmbedding) -> Result<Self> {
        let batch = nested
            .first()
            .ok_or_else(|| {
                SegmentError::MalformedResponse("Embedding has no batch entry".to_string())
            })?;
        let channels = batch.len();
        let height = batch.first().map(Vec::len).unwrap_or(0);
        let width = batch
            .first()
            .and_then(|c| c.first())
            .map(Vec::len)
            .unwrap_or(0);
        if channels == 0 || height == 0 || width == 0 {
            return Err(SegmentError::MalformedResponse(format!(
                "Embedding has an empty dimension: {}x{}x{}",
                channels, height, width
            )));
        }

        let mut data = Vec::with_capacity(channels * height * width);
        for (c, plane) in batch.iter().enumerate() {
            if plane.len() != height {
                return Err(SegmentError::MalformedResponse(format!(
                    "Channel {} has {} rows, expected {}",
                    c,
                    plane.len(),
                    height
                )));
            }
            for (h, row) in plane.iter().enumerate() {
                if row.len() != width {
                    return Err(SegmentError::MalformedResponse(format!(
                        "Row {} of channel {} has {} values, expected {}",
                        h,
                        c,
                        row.len(),
                        width
                    )));
                }
                data.extend_from_slice(row);
            }
        }

        Ok(Self {
            shape: [1, channels, height, width],
            data,
        })
    }

    /// Build from an already flat buffer
    pub fn from_flat(shape: [usize; 4], data: Vec<f32>) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if shape[0] != 1 || data.len() != expected || expected == 0 {
            return Err(SegmentError::InvalidInput(format!(
                "Buffer of {} values does not match shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Value at `[0][c][h][w]`
    pub fn get(&self, c: usize, h: usize, w: usize) -> Option<f32> {
        let [_, channels, height, width] = self.shape;
        if c >= channels || h >= height || w >= width {
            return None;
        }
        self.data.get(c * height * width + h * width + w).copied()
    }
}
