// SPDX-FileCopyrightText: 2026 kvmirror Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable value codecs.
//!
//! The engine stores every value as a string column. A [`Codec`] turns a
//! mirror value into that string and back. [`JsonCodec`] is the default.

use serde_json::Value;

use crate::error::MirrorError;

/// Bijective string encoding for mirror values.
pub trait Codec: Send + Sync + 'static {
    /// Encode a value for storage.
    fn encode(&self, value: &Value) -> Result<String, MirrorError>;

    /// Decode a stored string back into a value.
    fn decode(&self, raw: &str) -> Result<Value, MirrorError>;

    /// Encode `value` and verify that decoding yields an equal value.
    ///
    /// Returns the encoded form only if the round-trip holds.
    fn encode_checked(&self, value: &Value) -> Result<String, MirrorError> {
        let encoded = self.encode(value)?;
        let decoded = self.decode(&encoded)?;
        if decoded != *value {
            return Err(MirrorError::Serialization(format!(
                "value does not survive a round-trip: {value} -> {encoded:?} -> {decoded}"
            )));
        }
        Ok(encoded)
    }
}

/// Compact JSON encoding via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, MirrorError> {
        serde_json::to_string(value).map_err(|e| MirrorError::Serialization(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Result<Value, MirrorError> {
        serde_json::from_str(raw).map_err(|e| MirrorError::Serialization(e.to_string()))
    }
}
