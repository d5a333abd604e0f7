//! The outer `{"msgtype": ..., "msg": ...}` wrapper around every stream frame.

use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;

/// Envelope discriminant that carries a log line.
pub const CHAT_MSGTYPE: &str = "Chat";

/// Wire shape of a frame. Both fields may be missing or `null`.
#[derive(Debug, Default, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    msgtype: Option<String>,
    #[serde(default)]
    msg: Value,
}

/// A decoded stream frame, resolved on its discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// A `"Chat"` frame; the payload is the raw pipe-delimited log line.
    Chat(String),
    /// Any other frame type. The payload is not inspected.
    Other { msgtype: String },
}

impl Envelope {
    /// Decode one frame payload.
    ///
    /// Text and binary frames are both accepted; the bytes must be a JSON
    /// object or `null`. A repeated key keeps its last value. A `"Chat"`
    /// frame whose `msg` is not a string is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        // Going through `Value` collapses repeated keys before the struct sees them.
        let raw: RawEnvelope = match serde_json::from_slice(bytes)? {
            Value::Null => RawEnvelope::default(),
            object @ Value::Object(_) => serde_json::from_value(object)?,
            other => {
                return Err(DecodeError::NotAnObject {
                    got: json_kind(&other),
                })
            }
        };

        let msgtype = raw.msgtype.unwrap_or_default();
        if msgtype != CHAT_MSGTYPE {
            return Ok(Self::Other { msgtype });
        }

        match raw.msg {
            Value::String(line) => Ok(Self::Chat(line)),
            other => Err(DecodeError::ChatPayloadNotString {
                got: json_kind(&other),
            }),
        }
    }

    /// The wire discriminant of this envelope.
    pub fn msgtype(&self) -> &str {
        match self {
            Self::Chat(_) => CHAT_MSGTYPE,
            Self::Other { msgtype } => msgtype,
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
