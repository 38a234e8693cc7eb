//! Configuration for imgseg

use crate::error::{Result, SegmentError};
use crate::raster::Rgba;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Segmentation client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Base URL of the segmentation backend (scheme + host + port)
    pub server_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Path on the backend serving the local decoder model
    pub model_path: String,
    /// File name attached to clip/everything/embedding uploads
    pub upload_file_name: String,
    /// Lifetime of transient notifications in milliseconds
    pub popup_timeout_ms: u64,
    /// File name used when exporting results to disk
    pub export_file_name: String,
    /// Color painted for foreground pixels of a mask raster
    pub overlay_color: Rgba,
    /// Coordinate scale factor fed to the local decoder
    pub sam_scale: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 120,
            model_path: "/api/model/onnx.onnx".to_string(),
            upload_file_name: "image.png".to_string(),
            popup_timeout_ms: 1000,
            export_file_name: "masks.json".to_string(),
            overlay_color: Rgba::OVERLAY_BLUE,
            sam_scale: 1.0,
        }
    }
}

impl SegmentConfig {
    /// Load configuration from a TOML file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: SegmentConfig = toml::from_str(&text)
            .map_err(|e| SegmentError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate().map_err(SegmentError::Config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        let url = self.server_url.trim();
        if url.is_empty() {
            return Err("Server URL must not be empty".to_string());
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("Server URL must be absolute http(s): {}", url));
        }

        if self.request_timeout_secs == 0 || self.request_timeout_secs > 3600 {
            return Err("Request timeout must be between 1 and 3600 seconds".to_string());
        }

        if !self.model_path.starts_with('/') {
            return Err("Model path must start with '/'".to_string());
        }

        if self.upload_file_name.trim().is_empty() {
            return Err("Upload file name must not be empty".to_string());
        }

        let export = self.export_file_name.trim();
        if export.is_empty() || export.contains('/') || export.contains('\\') {
            return Err("Export file name must be a plain file name".to_string());
        }

        if !self.sam_scale.is_finite() || self.sam_scale <= 0.0 {
            return Err("SAM scale must be a positive finite number".to_string());
        }

        Ok(())
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Popup lifetime as a `Duration`
    pub fn popup_timeout(&self) -> Duration {
        Duration::from_millis(self.popup_timeout_ms)
    }

    /// Join an API path onto the server URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
