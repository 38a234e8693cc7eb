//! Export targets for the `{masks, points}` document

use imgseg_core::{Result, SegmentError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receives exported JSON text
pub trait ResultSink: Send + Sync {
    fn deliver(&self, json: &str) -> Result<()>;
}

/// Writes the export to a file on disk
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<file_name>`
    pub fn in_dir(dir: &Path, file_name: &str) -> Self {
        Self::new(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for FileSink {
    fn deliver(&self, json: &str) -> Result<()> {
        std::fs::write(&self.path, json.as_bytes())?;
        info!("Exported {} bytes to {:?}", json.len(), self.path);
        Ok(())
    }
}

/// Places the export on the system clipboard
#[derive(Default)]
pub struct ClipboardSink;

impl ClipboardSink {
    pub fn new() -> Self {
        Self
    }
}

impl ResultSink for ClipboardSink {
    fn deliver(&self, json: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| SegmentError::Export(format!("Clipboard unavailable: {}", e)))?;
        clipboard
            .set_text(json.to_string())
            .map_err(|e| SegmentError::Export(format!("Failed to set clipboard: {}", e)))?;
        info!("Copied {} bytes to clipboard", json.len());
        Ok(())
    }
}

/// Keeps every delivery in memory
#[derive(Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.delivered.lock().last().cloned()
    }
}

impl ResultSink for MemorySink {
    fn deliver(&self, json: &str) -> Result<()> {
        self.delivered.lock().push(json.to_string());
        Ok(())
    }
}
