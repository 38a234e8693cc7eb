//! imgseg-core: data model for interactive image segmentation
//!
//! Types shared by the backend client, the local decoder adapter and the
//! session state machine: images, annotation points, backend masks,
//! embedding tensors, rasters, configuration and errors.

pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod mask;
pub mod mode;
pub mod point;
pub mod raster;
pub mod source;

pub use config::SegmentConfig;
pub use embedding::{EmbeddingTensor, NestedEmbedding};
pub use error::{Result, SegmentError};
pub use export::MaskExport;
pub use mask::{Mask, MaskBitmap, Segmentation};
pub use mode::Mode;
pub use point::{BoxPrompt, PixelCoord, Point, PointLabel, PointsPrompt, TextPrompt};
pub use raster::{MaskRaster, Rgba};
pub use source::ImageSource;
