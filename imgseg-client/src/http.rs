//! reqwest implementation of the backend contract

use crate::backend::SegmentBackend;
use crate::envelope::decode_envelope;
use async_trait::async_trait;
use bytes::Bytes;
use imgseg_core::{
    BoxPrompt, EmbeddingTensor, ImageSource, Mask, NestedEmbedding, Point, PointsPrompt, Result,
    SegmentConfig, SegmentError, TextPrompt,
};
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use tracing::{debug, info};

const POINT_PATH: &str = "/api/point";
const BOX_PATH: &str = "/api/box";
const CLIP_PATH: &str = "/api/clip";
const EVERYTHING_PATH: &str = "/api/everything";
const EMBEDDING_PATH: &str = "/api/embedding";

/// Backend reached over HTTP with multipart uploads
pub struct HttpBackend {
    client: reqwest::Client,
    config: Arc<SegmentConfig>,
}

impl HttpBackend {
    /// Create a new HTTP backend
    pub fn new(config: Arc<SegmentConfig>) -> Result<Self> {
        config.validate().map_err(SegmentError::Config)?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(transport)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Multipart `file` part carrying the image bytes under `file_name`
    fn file_part(image: &ImageSource, file_name: &str) -> Part {
        Part::bytes(image.bytes().to_vec()).file_name(file_name.to_string())
    }

    async fn post_form(&self, path: &str, form: Form) -> Result<Vec<u8>> {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(SegmentError::Transport(format!(
                "POST {} returned HTTP {}",
                path,
                response.status()
            )));
        }

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }

    async fn post_masks(&self, path: &str, form: Form) -> Result<Vec<Mask>> {
        let body = self.post_form(path, form).await?;
        let masks: Vec<Mask> = decode_envelope(&body)?;
        debug!("{} returned {} masks", path, masks.len());
        Ok(masks)
    }
}

fn transport(err: reqwest::Error) -> SegmentError {
    SegmentError::Transport(err.to_string())
}

#[async_trait]
impl SegmentBackend for HttpBackend {
    async fn segment_points(&self, image: &ImageSource, points: &[Point]) -> Result<Vec<Mask>> {
        if points.is_empty() {
            return Err(SegmentError::InvalidInput(
                "Point prompt needs at least one point".to_string(),
            ));
        }
        let prompt = serde_json::to_string(&PointsPrompt::from_points(points))?;
        let form = Form::new()
            .part("file", Self::file_part(image, image.file_name()))
            .text("points", prompt);
        self.post_masks(POINT_PATH, form).await
    }

    async fn segment_box(&self, image: &ImageSource, prompt: BoxPrompt) -> Result<Vec<Mask>> {
        let form = Form::new()
            .part("file", Self::file_part(image, image.file_name()))
            .text("box", serde_json::to_string(&prompt)?);
        self.post_masks(BOX_PATH, form).await
    }

    async fn segment_text(&self, image: &ImageSource, text: &str) -> Result<Vec<Mask>> {
        let prompt = TextPrompt {
            text: text.to_string(),
        };
        let form = Form::new()
            .part("file", Self::file_part(image, &self.config.upload_file_name))
            .text("prompt", serde_json::to_string(&prompt)?);
        self.post_masks(CLIP_PATH, form).await
    }

    async fn segment_everything(&self, image: &ImageSource) -> Result<Vec<Mask>> {
        let form = Form::new().part("file", Self::file_part(image, &self.config.upload_file_name));
        self.post_masks(EVERYTHING_PATH, form).await
    }

    async fn fetch_embedding(&self, image: &ImageSource) -> Result<EmbeddingTensor> {
        let form = Form::new().part("file", Self::file_part(image, &self.config.upload_file_name));
        let body = self.post_form(EMBEDDING_PATH, form).await?;
        let nested: NestedEmbedding = decode_envelope(&body)?;
        let tensor = EmbeddingTensor::from_nested(&nested)?;
        info!("Fetched embedding with shape {:?}", tensor.shape());
        Ok(tensor)
    }

    async fn fetch_model(&self) -> Result<Bytes> {
        let url = self.config.endpoint(&self.config.model_path);
        info!("Downloading decoder model from {}", url);

        let response = self.client.get(&url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(SegmentError::Transport(format!(
                "GET {} returned HTTP {}",
                self.config.model_path,
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(transport)?;
        if bytes.is_empty() {
            return Err(SegmentError::MalformedResponse("Model download was empty".to_string()));
        }
        info!("Downloaded {} bytes of decoder model", bytes.len());
        Ok(bytes)
    }
}
