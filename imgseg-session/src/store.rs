//! Latest mask set

use imgseg_core::{Mask, MaskRaster, Rgba};
use tracing::debug;

/// Holds the masks of the most recent successful dispatch.
/// Each success replaces the set wholesale.
#[derive(Debug, Clone, Default)]
pub struct MaskStore {
    masks: Vec<Mask>,
}

impl MaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, masks: Vec<Mask>) {
        self.masks = masks;
    }

    pub fn clear(&mut self) {
        self.masks.clear();
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Composite every decodable mask into one RGBA overlay
    pub fn overlay(&self, width: u32, height: u32, color: Rgba) -> MaskRaster {
        let mut raster = MaskRaster::transparent(width, height);
        for (i, mask) in self.masks.iter().enumerate() {
            let Some(segmentation) = &mask.segmentation else {
                continue;
            };
            match segmentation.to_bitmap(width, height) {
                Ok(Some(bitmap)) => raster.paint_bitmap(&bitmap, color),
                Ok(None) => {}
                Err(e) => debug!("Skipping mask {} in overlay: {}", i, e),
            }
        }
        raster
    }
}
