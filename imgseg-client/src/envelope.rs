//! `{code, data}` response envelope

use imgseg_core::{Result, SegmentError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    data: Value,
}

/// Decode a backend response body. `code == 0` is success; any other code is
/// a backend failure, and a body that does not fit `T` is malformed.
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| SegmentError::MalformedResponse(format!("Invalid envelope: {}", e)))?;

    if envelope.code != 0 {
        return Err(SegmentError::Backend { code: envelope.code });
    }

    serde_json::from_value(envelope.data)
        .map_err(|e| SegmentError::MalformedResponse(format!("Unexpected data shape: {}", e)))
}
