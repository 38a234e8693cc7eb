//! Data owned by one working session

use crate::store::MaskStore;
use imgseg_core::{EmbeddingTensor, ImageSource, MaskRaster, Mode, Point};
use std::sync::Arc;

/// Image, annotations and results of the active session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub image: Option<ImageSource>,
    pub mode: Mode,
    pub points: Vec<Point>,
    pub box_ready: bool,
    pub prompt: String,
    pub scale: f64,
    pub store: MaskStore,
    pub mask_raster: Option<MaskRaster>,
    pub embedding: Option<Arc<EmbeddingTensor>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            image: None,
            mode: Mode::Click,
            points: Vec::new(),
            box_ready: false,
            prompt: String::new(),
            scale: 1.0,
            store: MaskStore::new(),
            mask_raster: None,
            embedding: None,
        }
    }
}

impl SessionState {
    /// Drop points, masks, raster and the box arm; keep image and embedding
    pub fn clear_segment(&mut self) {
        self.points.clear();
        self.store.clear();
        self.mask_raster = None;
        self.box_ready = false;
    }

    /// Start over with no image. The prompt text box survives.
    pub fn reset(&mut self) {
        let prompt = std::mem::take(&mut self.prompt);
        *self = Self::default();
        self.prompt = prompt;
    }
}
