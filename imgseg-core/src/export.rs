//! `masks.json` export document

use crate::error::Result;
use crate::mask::Mask;
use crate::point::Point;
use serde::{Deserialize, Serialize};

/// `{masks, points}` as written to file and clipboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskExport {
    pub masks: Vec<Mask>,
    pub points: Vec<Point>,
}

impl MaskExport {
    pub fn new(masks: &[Mask], points: &[Point]) -> Self {
        Self {
            masks: masks.to_vec(),
            points: points.to_vec(),
        }
    }

    /// Compact UTF-8 JSON text. Every export target uses this exact string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
