//! Codec registry (C11).
//!
//! `Codec` is the external contract the Framer delegates to: `encode`
//! produces bytes for a value, `decode` recovers a value from bytes. The
//! terminator byte used by `crate::framer` must never occur inside a valid
//! encoded payload -- `JsonCodec` satisfies this because `serde_json`'s
//! compact output only contains an unescaped `\n` inside string content,
//! which it always backslash-escapes.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// The only required codec entry (§9 design note: a closed, compile-time
/// registry stands in for the distilled spec's dynamically imported class).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

/// Enumerated codec selector, matched against `MESSAGE_PARSER_CLASS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Json,
}

impl CodecKind {
    /// Shared, not owned: the session reader and its writer task both hold
    /// a reference to the same stateless codec instance.
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            CodecKind::Json => Arc::new(JsonCodec),
        }
    }
}
