//! imgseg-onnx: local embedding inference
//!
//! Turns a precomputed image embedding plus clicks into a mask raster with
//! an ONNX decoder, so embedding mode needs no network round trip per click.

pub mod decoder;
pub mod input;
pub mod loader;
pub mod output;

pub use decoder::{MaskDecoder, OnnxMaskDecoder};
pub use input::{DecoderInput, ModelScale};
pub use loader::{DecoderLoader, RemoteOnnxLoader};
pub use output::output_to_raster;
