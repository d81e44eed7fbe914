//! Wire framing and message shapes shared between the broker core and any
//! client. This crate has no knowledge of sockets or concurrency: it is a
//! pure, synchronous contract (C1, C11).

pub mod codec;
pub mod framer;
pub mod message;

pub use codec::{Codec, CodecError, CodecKind, JsonCodec};
pub use framer::{decode_frame, encode_frame, split_stream, TERMINATOR};
pub use message::{
    parse_client_request, ClientRequest, ErrorPayload, InfoSnapshot, RequestError, ServerMessage,
    TimeEventPayload,
};
