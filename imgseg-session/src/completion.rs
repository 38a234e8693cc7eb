//! Results posted back to the workspace by async work

use crate::path::DispatchPath;
use imgseg_core::{EmbeddingTensor, Mask, MaskRaster, Result};
use imgseg_onnx::MaskDecoder;
use std::sync::Arc;

/// Payload of a finished backend request
pub enum RemoteOutcome {
    Masks(Result<Vec<Mask>>),
    Embedding(Result<EmbeddingTensor>),
}

/// A settled async operation, tagged with the generation it was issued under.
/// The workspace applies it only if that generation is still current.
pub enum Completion {
    Remote {
        path: DispatchPath,
        generation: u64,
        outcome: RemoteOutcome,
    },
    ModelLoaded {
        generation: u64,
        result: Result<Arc<dyn MaskDecoder>>,
    },
    Inference {
        generation: u64,
        result: Result<MaskRaster>,
    },
}

impl Completion {
    pub fn path(&self) -> DispatchPath {
        match self {
            Completion::Remote { path, .. } => *path,
            Completion::ModelLoaded { .. } => DispatchPath::ModelLoad,
            Completion::Inference { .. } => DispatchPath::LocalInference,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            Completion::Remote { generation, .. }
            | Completion::ModelLoaded { generation, .. }
            | Completion::Inference { generation, .. } => *generation,
        }
    }
}
