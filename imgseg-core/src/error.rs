//! Error types for imgseg

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend reported failure code {code}")]
    Backend { code: i64 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SegmentError>;
