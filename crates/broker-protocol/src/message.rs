//! Client -> server request shapes and server -> client message shapes
//! (§6). Requests are parsed by hand from a generic `Value` rather than via
//! `serde`'s tagged-enum deserialization, because an unrecognized `action`
//! must produce a distinct `UnknownAction` outcome (an `error_message`
//! reply) rather than a `CodecError` -- the two are different points in the
//! error taxonomy (§7) even though both start from the same decoded value.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    Ping,
    Subscribe { channel_name: String },
    Unsubscribe { channel_name: String },
    Info,
    Publish { channel_name: String, data: Value },
    AddTimeEvent {
        channel_name: String,
        exec_timestamp: f64,
        data: Value,
    },
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field {field} must be a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

fn required_str(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<String, RequestError> {
    obj.get(field)
        .ok_or(RequestError::MissingField(field))?
        .as_str()
        .map(str::to_owned)
        .ok_or(RequestError::WrongType { field, expected: "string" })
}

fn required_f64(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<f64, RequestError> {
    obj.get(field)
        .ok_or(RequestError::MissingField(field))?
        .as_f64()
        .ok_or(RequestError::WrongType { field, expected: "number" })
}

fn required_any(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<Value, RequestError> {
    obj.get(field).cloned().ok_or(RequestError::MissingField(field))
}

/// Parse an already-decoded JSON value into a `ClientRequest`.
///
/// A value that is not an object, or is missing `action`, is treated the
/// same as an unrecognized action: the caller replies with `error_message`
/// and keeps the session alive. This is a deliberately permissive parse --
/// malformed JSON is rejected earlier, at the codec/framer boundary.
pub fn parse_client_request(value: &Value) -> Result<ClientRequest, RequestError> {
    let obj = value.as_object().ok_or(RequestError::NotAnObject)?;
    let action = obj
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("");

    match action {
        "ping" => Ok(ClientRequest::Ping),
        "subscribe" => Ok(ClientRequest::Subscribe {
            channel_name: required_str(obj, "channel_name")?,
        }),
        "unsubscribe" => Ok(ClientRequest::Unsubscribe {
            channel_name: required_str(obj, "channel_name")?,
        }),
        "info" => Ok(ClientRequest::Info),
        "publish" => Ok(ClientRequest::Publish {
            channel_name: required_str(obj, "channel_name")?,
            data: required_any(obj, "data")?,
        }),
        "add_time_event" => Ok(ClientRequest::AddTimeEvent {
            channel_name: required_str(obj, "channel_name")?,
            exec_timestamp: required_f64(obj, "exec_timestamp")?,
            data: required_any(obj, "data")?,
        }),
        other => Err(RequestError::UnknownAction(other.to_owned())),
    }
}

/// The `info` action's reply payload (§6).
#[derive(Debug, Clone, Serialize)]
pub struct InfoSnapshot {
    pub started_time: f64,
    pub uptime: f64,
    pub clients: usize,
    pub channels_num: usize,
    pub channels: Vec<String>,
    pub time_events_num: usize,
}

/// The `time_event` message payload (§6, §4.6).
#[derive(Debug, Clone, Serialize)]
pub struct TimeEventPayload {
    pub id: Uuid,
    pub channel_name: String,
    pub timestamp: f64,
    pub exec_timestamp: f64,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Server -> client message envelope: `{"type": ..., "data": ...}`.
///
/// `Clone` because a single broadcast fans the same message out to every
/// subscriber's own outbox (C2): each gets an owned copy, not a shared
/// reference.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Message(Value),
    PublishedEvent(Value),
    TimeEvent(TimeEventPayload),
    ErrorMessage(ErrorPayload),
}

impl ServerMessage {
    pub fn pong() -> Self {
        ServerMessage::Message(Value::String("PONG".to_owned()))
    }

    pub fn info(snapshot: InfoSnapshot) -> Self {
        ServerMessage::Message(
            serde_json::to_value(snapshot).expect("InfoSnapshot is always serializable"),
        )
    }

    pub fn published_event(data: Value) -> Self {
        ServerMessage::PublishedEvent(data)
    }

    pub fn time_event(payload: TimeEventPayload) -> Self {
        ServerMessage::TimeEvent(payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::ErrorMessage(ErrorPayload { message: message.into() })
    }

    pub fn unknown_action(action: &str) -> Self {
        Self::error(format!("Unknown action: {action}"))
    }
}
