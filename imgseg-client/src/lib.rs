//! imgseg-client: HTTP contract of the segmentation backend
//!
//! Multipart uploads for the point, box, clip, everything and embedding
//! endpoints, `{code, data}` envelope decoding, and the decoder model
//! download.

pub mod backend;
pub mod envelope;
pub mod http;

pub use backend::SegmentBackend;
pub use envelope::decode_envelope;
pub use http::HttpBackend;
