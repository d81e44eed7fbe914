//! Message Framer (C1): frame/unframe payloads on a byte stream using a
//! single-byte terminator, delegating encoding to a `Codec`.

use crate::codec::{Codec, CodecError};
use serde_json::Value;

/// Terminates every frame on the wire. Must never occur inside a codec's
/// encoded payload (see `crate::codec` module docs).
pub const TERMINATOR: u8 = b'\n';

/// `encode(value)` followed by the terminator byte.
pub fn encode_frame(codec: &dyn Codec, value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut bytes = codec.encode(value)?;
    bytes.push(TERMINATOR);
    Ok(bytes)
}

/// Decode a single payload with the terminator already stripped.
pub fn decode_frame(codec: &dyn Codec, payload: &[u8]) -> Result<Value, CodecError> {
    codec.decode(payload)
}

/// Append `chunk` to the residual `buffer`, then split off every complete
/// frame (terminator-delimited). Returns the terminator-stripped payloads in
/// order; `buffer` is left holding whatever remains after the last
/// terminator (empty if the chunk ended exactly on one).
pub fn split_stream(buffer: &mut Vec<u8>, chunk: &[u8]) -> Vec<Vec<u8>> {
    buffer.extend_from_slice(chunk);

    let mut payloads = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == TERMINATOR) {
        let rest = buffer.split_off(pos + 1);
        let mut frame = std::mem::replace(buffer, rest);
        frame.pop(); // drop the terminator itself
        payloads.push(frame);
    }
    payloads
}
