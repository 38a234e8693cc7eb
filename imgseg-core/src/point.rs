//! Annotation points and prompts

use crate::error::{Result, SegmentError};
use serde::{Deserialize, Serialize};

/// Foreground/background label of a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PointLabel {
    Background,
    Foreground,
}

impl From<PointLabel> for i64 {
    fn from(label: PointLabel) -> Self {
        match label {
            PointLabel::Background => 0,
            PointLabel::Foreground => 1,
        }
    }
}

impl TryFrom<i64> for PointLabel {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(PointLabel::Background),
            1 => Ok(PointLabel::Foreground),
            other => Err(format!("invalid point label {}", other)),
        }
    }
}

/// A click on the image in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub label: PointLabel,
}

impl Point {
    pub fn new(x: f64, y: f64, label: PointLabel) -> Self {
        Self { x, y, label }
    }

    pub fn foreground(x: f64, y: f64) -> Self {
        Self::new(x, y, PointLabel::Foreground)
    }

    pub fn background(x: f64, y: f64) -> Self {
        Self::new(x, y, PointLabel::Background)
    }

    /// Reject NaN/infinite coordinates before they reach a payload
    pub fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(SegmentError::InvalidInput(format!(
                "Point coordinates must be finite: ({}, {})",
                self.x, self.y
            )));
        }
        Ok(())
    }

    /// Nearest integer pixel, halves rounding towards positive infinity
    pub fn rounded(&self) -> PixelCoord {
        PixelCoord {
            x: round_half_up(self.x),
            y: round_half_up(self.y),
        }
    }
}

fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Integer pixel coordinate as sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: i64,
    pub y: i64,
}

/// `points` form field of the point endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsPrompt {
    pub points: Vec<PixelCoord>,
    pub points_labels: Vec<i64>,
}

impl PointsPrompt {
    pub fn from_points(points: &[Point]) -> Self {
        Self {
            points: points.iter().map(Point::rounded).collect(),
            points_labels: points.iter().map(|p| i64::from(p.label)).collect(),
        }
    }
}

/// `box` form field of the box endpoint, corners rounded to pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxPrompt {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoxPrompt {
    pub fn from_corners(a: &Point, b: &Point) -> Self {
        let a = a.rounded();
        let b = b.rounded();
        Self {
            x1: a.x,
            y1: a.y,
            x2: b.x,
            y2: b.y,
        }
    }

    /// Exactly two points are required; anything else is not a box
    pub fn from_points(points: &[Point]) -> Option<Self> {
        match points {
            [a, b] => Some(Self::from_corners(a, b)),
            _ => None,
        }
    }
}

/// `prompt` form field of the clip endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPrompt {
    pub text: String,
}
