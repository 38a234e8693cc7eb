//! Segmentation backend contract

use async_trait::async_trait;
use bytes::Bytes;
use imgseg_core::{BoxPrompt, EmbeddingTensor, ImageSource, Mask, Point, Result};

/// Remote segmentation service.
///
/// Every call uploads the image with its mode-specific prompt and resolves
/// to the backend's mask array (or embedding). Dropping the returned future
/// abandons the request.
#[async_trait]
pub trait SegmentBackend: Send + Sync {
    /// `POST /api/point` with the full point sequence
    async fn segment_points(&self, image: &ImageSource, points: &[Point]) -> Result<Vec<Mask>>;

    /// `POST /api/box` with two rounded corners
    async fn segment_box(&self, image: &ImageSource, prompt: BoxPrompt) -> Result<Vec<Mask>>;

    /// `POST /api/clip` with a free-text prompt
    async fn segment_text(&self, image: &ImageSource, text: &str) -> Result<Vec<Mask>>;

    /// `POST /api/everything` with the image only
    async fn segment_everything(&self, image: &ImageSource) -> Result<Vec<Mask>>;

    /// `POST /api/embedding`, flattened into a `[1, C, H, W]` tensor
    async fn fetch_embedding(&self, image: &ImageSource) -> Result<EmbeddingTensor>;

    /// `GET` the local decoder model binary
    async fn fetch_model(&self) -> Result<Bytes>;
}
