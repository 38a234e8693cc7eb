//! One-time decoder loading

use crate::decoder::{MaskDecoder, OnnxMaskDecoder};
use async_trait::async_trait;
use imgseg_client::SegmentBackend;
use imgseg_core::{Result, Rgba, SegmentError};
use std::sync::Arc;
use tracing::info;

/// Source of the local decoder module
#[async_trait]
pub trait DecoderLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn MaskDecoder>>;
}

/// Downloads the model from the backend and builds an ONNX session
pub struct RemoteOnnxLoader {
    backend: Arc<dyn SegmentBackend>,
    color: Rgba,
}

impl RemoteOnnxLoader {
    pub fn new(backend: Arc<dyn SegmentBackend>, color: Rgba) -> Self {
        Self { backend, color }
    }
}

#[async_trait]
impl DecoderLoader for RemoteOnnxLoader {
    async fn load(&self) -> Result<Arc<dyn MaskDecoder>> {
        let model = self.backend.fetch_model().await?;
        let color = self.color;

        // Session construction parses and optimizes the graph; keep it off the runtime threads
        let decoder =
            tokio::task::spawn_blocking(move || OnnxMaskDecoder::from_bytes(&model, color))
                .await
                .map_err(|e| SegmentError::Inference(format!("Decoder load task failed: {}", e)))??;

        info!("Local decoder ready");
        Ok(Arc::new(decoder))
    }
}
