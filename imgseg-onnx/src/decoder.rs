//! SAM-style prompt decoder backed by ONNX Runtime

use crate::input::{DecoderInput, MASK_INPUT_SIZE};
use crate::output::output_to_raster;
use imgseg_core::{MaskRaster, Result, Rgba, SegmentError};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Produces a mask raster from an embedding and clicks without a network call
pub trait MaskDecoder: Send + Sync {
    fn decode(&self, input: &DecoderInput) -> Result<MaskRaster>;
}

/// Decoder model loaded into an ONNX Runtime session
pub struct OnnxMaskDecoder {
    session: Mutex<Session>,
    color: Rgba,
}

impl OnnxMaskDecoder {
    /// Build a session from an in-memory model
    pub fn from_bytes(model: &[u8], color: Rgba) -> Result<Self> {
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_memory(model))
            .map_err(|e| SegmentError::Inference(format!("Failed to load decoder model: {}", e)))?;

        info!("Decoder model loaded ({} bytes)", model.len());
        Ok(Self {
            session: Mutex::new(session),
            color,
        })
    }

    /// Run the session and copy out the first output as `(dims, values)`
    fn run(&self, input: &DecoderInput) -> ort::Result<(Vec<i64>, Vec<f32>)> {
        let [_, channels, height, width] = input.embedding.shape();
        let points = input.point_count();

        let image_embeddings = Tensor::from_array((
            [1usize, channels, height, width],
            input.embedding.data().to_vec(),
        ))?;
        let point_coords = Tensor::from_array(([1usize, points, 2], input.point_coords.clone()))?;
        let point_labels = Tensor::from_array(([1usize, points], input.point_labels.clone()))?;
        let mask_input = Tensor::from_array((
            [1usize, 1, MASK_INPUT_SIZE, MASK_INPUT_SIZE],
            vec![0.0f32; MASK_INPUT_SIZE * MASK_INPUT_SIZE],
        ))?;
        let has_mask_input = Tensor::from_array(([1usize], vec![0.0f32]))?;
        let orig_im_size = Tensor::from_array(([2usize], input.orig_im_size.to_vec()))?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![
            "image_embeddings" => image_embeddings,
            "point_coords" => point_coords,
            "point_labels" => point_labels,
            "mask_input" => mask_input,
            "has_mask_input" => has_mask_input,
            "orig_im_size" => orig_im_size,
        ])?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let values = data.to_vec();
        Ok((dims, values))
    }
}

impl MaskDecoder for OnnxMaskDecoder {
    fn decode(&self, input: &DecoderInput) -> Result<MaskRaster> {
        let (dims, data) = self
            .run(input)
            .map_err(|e| SegmentError::Inference(format!("Decoder run failed: {}", e)))?;
        debug!("Decoder produced output with dims {:?}", dims);
        output_to_raster(&dims, &data, self.color)
    }
}
