//! Backend mask descriptors
//!
//! A mask is owned by the backend. This layer keeps the segmentation payload
//! as a tagged value so it can be exported untouched, and only decodes it
//! when a raster overlay is requested.

use crate::error::{Result, SegmentError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Encoded foreground region of one mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// One list of foreground column indices per image row
    RowIndices(Vec<Vec<u32>>),
    /// Run-length string of `<count><T|F>` pairs over the flattened image
    RunLength(String),
    /// Anything else; passed through without interpretation
    Opaque(Value),
}

impl Segmentation {
    /// Decode into a `width x height` bitmap. `Opaque` payloads yield `None`.
    pub fn to_bitmap(&self, width: u32, height: u32) -> Result<Option<MaskBitmap>> {
        match self {
            Segmentation::RowIndices(rows) => {
                if rows.len() > height as usize {
                    return Err(SegmentError::InvalidInput(format!(
                        "Mask has {} rows but image height is {}",
                        rows.len(),
                        height
                    )));
                }
                let mut bitmap = MaskBitmap::empty(width, height);
                for (y, cols) in rows.iter().enumerate() {
                    for &x in cols {
                        if x >= width {
                            return Err(SegmentError::InvalidInput(format!(
                                "Column {} out of range for width {}",
                                x, width
                            )));
                        }
                        bitmap.set(x, y as u32, true);
                    }
                }
                Ok(Some(bitmap))
            }
            Segmentation::RunLength(encoded) => {
                let expected = width as usize * height as usize;
                let bits = decode_run_length(encoded, expected)?;
                if bits.len() != expected {
                    return Err(SegmentError::InvalidInput(format!(
                        "Run-length mask covers {} pixels, expected {}",
                        bits.len(),
                        expected
                    )));
                }
                Ok(Some(MaskBitmap { width, height, bits }))
            }
            Segmentation::Opaque(_) => Ok(None),
        }
    }
}

/// Expand runs into bits, failing as soon as the total passes `limit`
fn decode_run_length(encoded: &str, limit: usize) -> Result<Vec<bool>> {
    let mut bits = Vec::new();
    let mut count: Option<usize> = None;
    for ch in encoded.chars() {
        match ch {
            '0'..='9' => {
                let digit = ch as usize - '0' as usize;
                let next = count
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|n| n.checked_add(digit))
                    .ok_or_else(|| SegmentError::InvalidInput("Run length overflow".to_string()))?;
                count = Some(next);
            }
            'T' | 'F' => {
                let n = count.take().ok_or_else(|| {
                    SegmentError::InvalidInput(format!("Run value '{}' without a count", ch))
                })?;
                if n > limit - bits.len() {
                    return Err(SegmentError::InvalidInput(format!(
                        "Run-length mask covers more than {} pixels",
                        limit
                    )));
                }
                bits.extend(std::iter::repeat(ch == 'T').take(n));
            }
            other => {
                return Err(SegmentError::InvalidInput(format!(
                    "Unexpected character '{}' in run-length mask",
                    other
                )))
            }
        }
    }
    if count.is_some() {
        return Err(SegmentError::InvalidInput("Trailing run count without value".to_string()));
    }
    Ok(bits)
}

/// One segmentation result as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,
    /// Score and any other backend fields, kept verbatim
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Mask {
    pub fn new(segmentation: Segmentation) -> Self {
        Self {
            segmentation: Some(segmentation),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata field (builder style)
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn stability_score(&self) -> Option<f64> {
        self.metadata.get("stability_score").and_then(Value::as_f64)
    }

    pub fn area(&self) -> Option<u64> {
        self.metadata.get("area").and_then(Value::as_u64)
    }

    /// `[x, y, w, h]` when the backend supplies a four-number bbox
    pub fn bbox(&self) -> Option<[f64; 4]> {
        let arr = self.metadata.get("bbox")?.as_array()?;
        if arr.len() != 4 {
            return None;
        }
        let mut out = [0.0; 4];
        for (slot, v) in out.iter_mut().zip(arr) {
            *slot = v.as_f64()?;
        }
        Some(out)
    }
}

/// Decoded binary mask, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskBitmap {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl MaskBitmap {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            self.bits[y as usize * self.width as usize + x as usize] = value;
        }
    }

    /// Number of foreground pixels
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}
